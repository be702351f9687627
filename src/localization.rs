//! Translation tables for the error taxonomy.
//!
//! Templates may contain `%s` placeholders which are filled, in order, by the format arguments
//! passed to [`localize`]. Placeholders left without an argument are dropped together with any
//! trailing separator, so `"Unknown error: %s"` renders as `"Unknown error"` when no detail is
//! available.

use phf::phf_map;

use crate::error::Kind;

/// Language used for user-facing error messages and the `language` request header.
#[non_exhaustive]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Tr,
}

impl Locale {
    /// Resolves an ISO 639-1 code, case-insensitively. Unknown codes fall back to English.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "tr" => Self::Tr,
            _ => Self::En,
        }
    }

    /// The ISO 639-1 code sent in the `language` header.
    #[must_use]
    pub fn code(self) -> &'static str {
        self.into()
    }

    fn table(self) -> &'static phf::Map<&'static str, &'static str> {
        match self {
            Self::En => &EN,
            Self::Tr => &TR,
        }
    }
}

static EN: phf::Map<&'static str, &'static str> = phf_map! {
    "unauthorized" => "Unauthorized access",
    "not_found" => "Resource not found",
    "server" => "Server error occurred",
    "connection" => "Unable to reach the server: %s",
    "network" => "Network error: %s",
    "unknown" => "Unknown error: %s",
};

static TR: phf::Map<&'static str, &'static str> = phf_map! {
    "unauthorized" => "Yetkisiz erişim",
    "not_found" => "Kaynak bulunamadı",
    "server" => "Sunucu hatası meydana geldi",
    "connection" => "Sunucuya ulaşılamıyor: %s",
    "network" => "Ağ hatası: %s",
    "unknown" => "Bilinmeyen hata: %s",
};

const FALLBACK: &str = "Unknown error";

/// Returns the message for `kind` in `locale`, with `%s` placeholders filled from `args`.
#[must_use]
pub fn localize(locale: Locale, kind: Kind, args: &[&str]) -> String {
    let key: &'static str = kind.into();
    let template = locale
        .table()
        .get(key)
        .or_else(|| EN.get(key))
        .copied()
        .unwrap_or(FALLBACK);

    fill(template, args)
}

fn fill(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut rest = template;

    while let Some((head, tail)) = rest.split_once("%s") {
        out.push_str(head);
        if let Some(arg) = args.next() {
            out.push_str(arg);
        }
        rest = tail;
    }
    out.push_str(rest);

    let trimmed = out.trim_end_matches(|c: char| c == ':' || c.is_whitespace());
    trimmed.to_owned()
}
