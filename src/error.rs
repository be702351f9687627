use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

/// HTTP method type, re-exported for use with error inspection.
pub use reqwest::Method;
/// HTTP status code type, re-exported for use with error inspection.
pub use reqwest::StatusCode;

/// The user-facing error taxonomy. Every failure surfaced by this crate carries exactly one of
/// these kinds together with a message localized at construction time.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Kind {
    /// HTTP 401
    Unauthorized,
    /// HTTP 404
    NotFound,
    /// HTTP 500
    Server,
    /// The remote host could not be resolved
    Connection,
    /// Any other transport-level failure (refused, reset, timeout, TLS)
    Network,
    /// Everything else, including decode failures, unmapped HTTP statuses and rejected arguments
    Unknown,
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    message: String,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    backtrace: Backtrace,
}

impl Error {
    /// Creates an error from an already localized `message`.
    pub fn new<S: Into<String>>(kind: Kind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
            backtrace: Backtrace::capture(),
        }
    }

    pub fn with_source<M, S>(kind: Kind, message: M, source: S) -> Self
    where
        M: Into<String>,
        S: StdError + Send + Sync + 'static,
    {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
            backtrace: Backtrace::capture(),
        }
    }

    pub(crate) fn with_boxed_source(
        kind: Kind,
        message: String,
        source: Box<dyn StdError + Send + Sync + 'static>,
    ) -> Self {
        Self {
            kind,
            message,
            source: Some(source),
            backtrace: Backtrace::capture(),
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// The localized, user-facing message.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub fn inner(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        let e = self.source.as_deref()?;
        e.downcast_ref::<E>()
    }

    /// The HTTP status of the failed call, when this error came from a non-`2xx` response.
    pub fn status_code(&self) -> Option<StatusCode> {
        self.downcast_ref::<Status>().map(|status| status.status_code)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// Details of a non-successful HTTP call, attached as the source of the taxonomy error.
#[non_exhaustive]
#[derive(Debug)]
pub struct Status {
    pub status_code: StatusCode,
    pub method: Method,
    pub path: String,
    /// The `message` field of the structured error body, when one could be decoded
    pub message: Option<String>,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error({}) making {} call to {}",
            self.status_code, self.method, self.path
        )?;
        if let Some(message) = &self.message {
            write!(f, " with {message}")?;
        }
        Ok(())
    }
}

impl StdError for Status {}

/// A caller-supplied argument was rejected.
#[non_exhaustive]
#[derive(Debug)]
pub struct Validation {
    pub reason: String,
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid: {}", self.reason)
    }
}

impl StdError for Validation {}
