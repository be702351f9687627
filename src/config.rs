use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use bon::Builder;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret as _, SecretString};

use crate::localization::Locale;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_CONNECTIONS: usize = 5;

/// Header carrying the configured [`Locale`] code.
pub const LANGUAGE_HEADER: &str = "language";

/// What to send when the bearer token is empty.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthHeaderPolicy {
    /// Leave the `Authorization` header out entirely
    #[default]
    OmitWhenEmpty,
    /// Always send `Authorization: Bearer ` even with an empty token
    SendEmptyBearer,
}

/// Immutable configuration snapshot shared by REST calls and WebSocket connections.
///
/// A [`crate::Client`] never mutates a snapshot in place: every update produces a new one via
/// the `with_*` methods, so readers always observe a fully-formed configuration.
///
/// ```
/// use std::time::Duration;
///
/// use netlayer::Config;
/// use netlayer::localization::Locale;
///
/// let config = Config::builder()
///     .rest_base_url("https://api.example.com")
///     .socket_base_url("wss://ws.example.com")
///     .bearer_token("secret".to_owned())
///     .locale(Locale::Tr)
///     .request_timeout(Duration::from_secs(5))
///     .build();
///
/// assert_eq!(config.max_connections(), 5);
/// ```
#[derive(Clone, Debug, Builder)]
pub struct Config {
    /// Prefix for every REST endpoint, e.g. `https://api.example.com`.
    #[builder(into)]
    rest_base_url: String,
    /// Prefix for every WebSocket endpoint, e.g. `wss://ws.example.com`.
    #[builder(into)]
    socket_base_url: String,
    #[builder(default, into)]
    bearer_token: SecretString,
    #[builder(default)]
    auth_header: AuthHeaderPolicy,
    /// When set, sent as the `language` header on every call.
    locale: Option<Locale>,
    /// Extra headers appended to every REST call and WebSocket handshake.
    #[builder(default)]
    custom_headers: HashMap<String, String>,
    /// Whether the crate emits `tracing` events at all.
    #[builder(default = true)]
    logging_enabled: bool,
    /// Total time allowed for a REST call.
    #[builder(default = DEFAULT_REQUEST_TIMEOUT)]
    request_timeout: Duration,
    /// Time allowed to establish a TCP/TLS connection for REST calls.
    #[builder(default = DEFAULT_CONNECT_TIMEOUT)]
    connect_timeout: Duration,
    /// Time allowed for a WebSocket handshake, and for a session to shut down on close.
    #[builder(default = DEFAULT_SOCKET_TIMEOUT)]
    socket_timeout: Duration,
    /// Capacity of the WebSocket connection registry. Must be greater than zero.
    #[builder(default = DEFAULT_MAX_CONNECTIONS)]
    max_connections: usize,
    /// Reject REST endpoints whose `{name}` placeholders have no matching path parameter
    /// instead of sending them literally.
    #[builder(default)]
    strict_path_params: bool,
}

impl Config {
    #[must_use]
    pub fn rest_base_url(&self) -> &str {
        &self.rest_base_url
    }

    #[must_use]
    pub fn socket_base_url(&self) -> &str {
        &self.socket_base_url
    }

    #[must_use]
    pub fn bearer_token(&self) -> &SecretString {
        &self.bearer_token
    }

    #[must_use]
    pub fn auth_header(&self) -> AuthHeaderPolicy {
        self.auth_header
    }

    #[must_use]
    pub fn locale(&self) -> Option<Locale> {
        self.locale
    }

    #[must_use]
    pub fn custom_headers(&self) -> &HashMap<String, String> {
        &self.custom_headers
    }

    #[must_use]
    pub fn logging_enabled(&self) -> bool {
        self.logging_enabled
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    #[must_use]
    pub fn socket_timeout(&self) -> Duration {
        self.socket_timeout
    }

    #[must_use]
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    #[must_use]
    pub fn strict_path_params(&self) -> bool {
        self.strict_path_params
    }

    #[must_use]
    pub fn with_rest_base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.rest_base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_socket_base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.socket_base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_bearer_token<S: Into<String>>(mut self, token: S) -> Self {
        self.bearer_token = SecretString::from(token.into());
        self
    }

    #[must_use]
    pub fn with_locale(mut self, locale: Option<Locale>) -> Self {
        self.locale = locale;
        self
    }

    #[must_use]
    pub fn with_custom_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.custom_headers = headers;
        self
    }

    #[must_use]
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Headers sent with every REST call and WebSocket handshake, in order: authorization,
    /// language, then the custom headers.
    pub fn request_headers(&self) -> Result<HeaderMap, InvalidHeader> {
        let mut headers = HeaderMap::new();

        let token = self.bearer_token.expose_secret();
        if !token.is_empty() || self.auth_header == AuthHeaderPolicy::SendEmptyBearer {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_e| InvalidHeader::new(AUTHORIZATION.as_str()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        if let Some(locale) = self.locale {
            headers.insert(
                HeaderName::from_static(LANGUAGE_HEADER),
                HeaderValue::from_static(locale.code()),
            );
        }

        for (name, value) in &self.custom_headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|_e| InvalidHeader::new(name))?;
            let header_value = HeaderValue::from_str(value).map_err(|_e| InvalidHeader::new(name))?;
            headers.append(header_name, header_value);
        }

        Ok(headers)
    }
}

/// A configured header name or value is not valid HTTP.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct InvalidHeader {
    pub name: String,
}

impl InvalidHeader {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
        }
    }
}

impl fmt::Display for InvalidHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid header `{}`", self.name)
    }
}

impl StdError for InvalidHeader {}
