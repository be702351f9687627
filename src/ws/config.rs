#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use reqwest::header::HeaderMap;
use url::Url;

use crate::Result;
use crate::config::Config;
use crate::exception::ExceptionHandler;

/// Per-connection parameters, captured from the [`Config`] snapshot when the connection is
/// created. Later configuration changes do not affect an existing connection.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Full WebSocket URL: socket base URL followed by the endpoint
    pub url: Url,
    /// Headers sent on the upgrade request
    pub headers: HeaderMap,
    /// Handshake timeout, also the grace period for the session to shut down on close
    pub socket_timeout: Duration,
    /// Whether lifecycle events are logged
    pub logging: bool,
}

impl SessionConfig {
    #[must_use]
    pub fn new(url: Url, socket_timeout: Duration) -> Self {
        Self {
            url,
            headers: HeaderMap::new(),
            socket_timeout,
            logging: true,
        }
    }

    /// Resolves `endpoint` against the socket base URL of `config` and captures its headers.
    pub(crate) fn from_config(
        config: &Config,
        endpoint: &str,
        exceptions: &ExceptionHandler,
    ) -> Result<Self> {
        let raw = format!("{}{endpoint}", config.socket_base_url());
        let url = Url::parse(&raw)
            .map_err(|e| exceptions.validation(format!("invalid WebSocket URL `{raw}`: {e}")))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(exceptions.validation(format!(
                "WebSocket URL `{raw}` must use the ws or wss scheme"
            )));
        }
        let headers = config
            .request_headers()
            .map_err(|e| exceptions.unknown(e))?;

        Ok(Self {
            url,
            headers,
            socket_timeout: config.socket_timeout(),
            logging: config.logging_enabled(),
        })
    }
}
