//! Maps HTTP statuses and transport failures onto the error taxonomy.

use std::error::Error as StdError;
use std::sync::{PoisonError, RwLock};

use reqwest::{Method, StatusCode};

use crate::error::{Error, Kind, Status, Validation};
use crate::localization::{Locale, localize};

/// Fragments that identify a host-resolution failure anywhere in an error's source chain.
///
/// Covers the resolver messages produced by glibc, musl, macOS, Windows and the `hyper` DNS
/// layer, plus the message used by mobile HTTP engines.
const HOST_RESOLUTION_MARKERS: &[&str] = &[
    "unable to resolve host",
    "failed to lookup address",
    "dns error",
    "name or service not known",
    "nodename nor servname provided",
    "no such host is known",
    "temporary failure in name resolution",
    "no address associated with hostname",
];

/// Converts failures into localized taxonomy [`Error`]s.
///
/// The locale is the only mutable state and is read when an error is built, so changing it
/// affects only errors raised afterwards.
#[derive(Debug, Default)]
pub struct ExceptionHandler {
    locale: RwLock<Locale>,
}

impl ExceptionHandler {
    #[must_use]
    pub fn new(locale: Locale) -> Self {
        Self {
            locale: RwLock::new(locale),
        }
    }

    #[must_use]
    pub fn locale(&self) -> Locale {
        *self.locale.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_locale(&self, locale: Locale) {
        *self.locale.write().unwrap_or_else(PoisonError::into_inner) = locale;
    }

    /// Builds an error of `kind` whose message is localized with the optional `detail`.
    #[must_use]
    pub fn error(&self, kind: Kind, detail: Option<&str>) -> Error {
        Error::new(kind, self.message(kind, detail))
    }

    /// Maps a non-successful HTTP response.
    ///
    /// 401, 404 and 500 map to their own kinds; every other status is [`Kind::Unknown`]. A
    /// non-empty `api_message` decoded from the response body replaces the localized default.
    #[must_use]
    pub fn handle_http(
        &self,
        status_code: StatusCode,
        method: Method,
        path: String,
        api_message: Option<&str>,
    ) -> Error {
        let kind = match status_code {
            StatusCode::UNAUTHORIZED => Kind::Unauthorized,
            StatusCode::NOT_FOUND => Kind::NotFound,
            StatusCode::INTERNAL_SERVER_ERROR => Kind::Server,
            _ => Kind::Unknown,
        };
        let api_message = api_message.filter(|message| !message.is_empty());
        let message = match api_message {
            Some(message) => message.to_owned(),
            None if kind == Kind::Unknown => {
                self.message(kind, Some(&status_code.to_string()))
            }
            None => self.message(kind, None),
        };

        Error::with_source(
            kind,
            message,
            Status {
                status_code,
                method,
                path,
                message: api_message.map(ToOwned::to_owned),
            },
        )
    }

    /// Maps a transport-level failure: host-resolution failures become [`Kind::Connection`],
    /// everything else [`Kind::Network`].
    #[must_use]
    pub fn handle_network<E>(&self, error: E) -> Error
    where
        E: StdError + Send + Sync + 'static,
    {
        self.handle_boxed(Box::new(error))
    }

    /// Same as [`Self::handle_network`] for errors that are already boxed, such as the ones
    /// returned by socket handlers.
    #[must_use]
    pub fn handle_boxed(&self, error: Box<dyn StdError + Send + Sync + 'static>) -> Error {
        let kind = if is_host_resolution_failure(&*error) {
            Kind::Connection
        } else {
            Kind::Network
        };
        let detail = root_cause(&*error).to_string();

        Error::with_boxed_source(kind, self.message(kind, Some(&detail)), error)
    }

    /// Maps a codec failure (malformed or mismatched JSON) to [`Kind::Unknown`].
    #[must_use]
    pub fn handle_decode(&self, error: serde_json::Error) -> Error {
        self.unknown(error)
    }

    /// Wraps any other failure as [`Kind::Unknown`], keeping it as the source.
    #[must_use]
    pub fn unknown<E>(&self, error: E) -> Error
    where
        E: StdError + Send + Sync + 'static,
    {
        let detail = error.to_string();
        Error::with_source(Kind::Unknown, self.message(Kind::Unknown, Some(&detail)), error)
    }

    /// A rejected caller argument.
    #[must_use]
    pub fn validation<S: Into<String>>(&self, reason: S) -> Error {
        self.unknown(Validation {
            reason: reason.into(),
        })
    }

    fn message(&self, kind: Kind, detail: Option<&str>) -> String {
        let locale = self.locale();
        match detail {
            Some(detail) => localize(locale, kind, &[detail]),
            None => localize(locale, kind, &[]),
        }
    }
}

/// Whether `error`, or anything in its source chain, reports a failed host lookup.
#[must_use]
pub fn is_host_resolution_failure(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(error) = current {
        let message = error.to_string().to_ascii_lowercase();
        if HOST_RESOLUTION_MARKERS
            .iter()
            .any(|marker| message.contains(marker))
        {
            return true;
        }
        current = error.source();
    }
    false
}

fn root_cause<'error>(error: &'error (dyn StdError + 'static)) -> &'error (dyn StdError + 'static) {
    let mut current = error;
    while let Some(source) = current.source() {
        current = source;
    }
    current
}
