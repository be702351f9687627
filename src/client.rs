//! The facade tying configuration, REST calls and WebSocket connections together.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use reqwest::{Client as ReqwestClient, Response};
use serde::de::DeserializeOwned;
use url::Url;

use crate::Result;
use crate::config::Config;
use crate::exception::ExceptionHandler;
use crate::localization::Locale;
use crate::rest::{self, ApiRequest};
#[cfg(feature = "ws")]
use crate::ws::{Connection, ConnectionHandle, Registry, SessionConfig, SocketHandler};

/// A configuration snapshot and the HTTP client built from it.
#[derive(Debug)]
struct Snapshot {
    config: Config,
    http: ReqwestClient,
}

impl Snapshot {
    fn build(config: Config, exceptions: &ExceptionHandler) -> Result<Self> {
        validate(&config, exceptions)?;
        let http = ReqwestClient::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| exceptions.unknown(e))?;

        Ok(Self { config, http })
    }

    /// Same HTTP client, new configuration. Only used for changes that leave the timeouts alone.
    fn with_config(&self, config: Config) -> Self {
        Self {
            config,
            http: self.http.clone(),
        }
    }
}

fn validate(config: &Config, exceptions: &ExceptionHandler) -> Result<()> {
    Url::parse(config.rest_base_url()).map_err(|e| {
        exceptions.validation(format!(
            "invalid REST base URL `{}`: {e}",
            config.rest_base_url()
        ))
    })?;
    Url::parse(config.socket_base_url()).map_err(|e| {
        exceptions.validation(format!(
            "invalid WebSocket base URL `{}`: {e}",
            config.socket_base_url()
        ))
    })?;
    if config.max_connections() == 0 {
        return Err(exceptions.validation("connection limit must be greater than 0"));
    }
    config
        .request_headers()
        .map_err(|e| exceptions.unknown(e))?;

    Ok(())
}

#[derive(Debug)]
struct ClientInner {
    snapshot: RwLock<Arc<Snapshot>>,
    exceptions: Arc<ExceptionHandler>,
    #[cfg(feature = "ws")]
    registry: Registry,
}

/// Entry point for REST calls and WebSocket connections.
///
/// Cloning is cheap; clones share configuration, locale and connections. Configuration updates
/// swap in a new snapshot, so calls already in flight finish with the one they started with.
///
/// ```no_run
/// use netlayer::localization::Locale;
/// use netlayer::{ApiRequest, Client, Config};
///
/// # async fn example() -> netlayer::Result<()> {
/// let client = Client::new(
///     Config::builder()
///         .rest_base_url("https://api.example.com")
///         .socket_base_url("wss://ws.example.com")
///         .build(),
/// )?;
///
/// client.set_locale(Some(Locale::Tr));
/// let user: serde_json::Value = client
///     .send_request(ApiRequest::get("/users/{id}").path_param("id", "7"))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Validates `config` and builds a client from it.
    ///
    /// # Errors
    ///
    /// Returns an error if a base URL does not parse, a configured header is not valid HTTP,
    /// `max_connections` is zero, or the HTTP client cannot be created.
    pub fn new(config: Config) -> Result<Self> {
        let exceptions = Arc::new(ExceptionHandler::new(config.locale().unwrap_or_default()));
        let snapshot = Snapshot::build(config, &exceptions)?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                #[cfg(feature = "ws")]
                registry: Registry::new(snapshot.config.max_connections(), Arc::clone(&exceptions)),
                snapshot: RwLock::new(Arc::new(snapshot)),
                exceptions,
            }),
        })
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.inner.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn update<F>(&self, f: F)
    where
        F: FnOnce(Config) -> Config,
    {
        let mut snapshot = self
            .inner
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let config = f(snapshot.config.clone());
        *snapshot = Arc::new(snapshot.with_config(config));
    }

    /// The current configuration snapshot.
    #[must_use]
    pub fn config(&self) -> Config {
        self.snapshot().config.clone()
    }

    #[must_use]
    pub fn exception_handler(&self) -> &ExceptionHandler {
        &self.inner.exceptions
    }

    /// Replaces the whole configuration.
    ///
    /// Existing WebSocket connections keep the parameters they were created with; the
    /// connection limit is applied immediately, evicting the oldest connections if needed.
    pub async fn reinitialize(&self, config: Config) -> Result<()> {
        let snapshot = Snapshot::build(config, &self.inner.exceptions)?;
        let locale = snapshot.config.locale().unwrap_or_default();
        #[cfg(feature = "ws")]
        let max_connections = snapshot.config.max_connections();

        *self
            .inner
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
        self.inner.exceptions.set_locale(locale);

        #[cfg(feature = "ws")]
        self.inner.registry.set_capacity(max_connections).await?;

        Ok(())
    }

    /// Token sent as `Authorization: Bearer <token>` from the next call on.
    pub fn set_bearer_token<S: Into<String>>(&self, token: S) {
        let token = token.into();
        self.update(|config| config.with_bearer_token(token));
    }

    /// Changes the `language` header and the language of errors raised from now on.
    pub fn set_locale(&self, locale: Option<Locale>) {
        self.update(|config| config.with_locale(locale));
        self.inner.exceptions.set_locale(locale.unwrap_or_default());
    }

    /// Replaces the custom headers. Nothing changes if a header name or value is invalid.
    pub fn set_custom_headers(&self, headers: HashMap<String, String>) -> Result<()> {
        self.config()
            .with_custom_headers(headers.clone())
            .request_headers()
            .map_err(|e| self.inner.exceptions.unknown(e))?;
        self.update(|config| config.with_custom_headers(headers));
        Ok(())
    }

    pub fn set_rest_base_url<S: Into<String>>(&self, url: S) -> Result<()> {
        let url = url.into();
        Url::parse(&url).map_err(|e| {
            self.inner
                .exceptions
                .validation(format!("invalid REST base URL `{url}`: {e}"))
        })?;
        self.update(|config| config.with_rest_base_url(url));
        Ok(())
    }

    /// Applies to connections created afterwards.
    pub fn set_socket_base_url<S: Into<String>>(&self, url: S) -> Result<()> {
        let url = url.into();
        Url::parse(&url).map_err(|e| {
            self.inner
                .exceptions
                .validation(format!("invalid WebSocket base URL `{url}`: {e}"))
        })?;
        self.update(|config| config.with_socket_base_url(url));
        Ok(())
    }

    /// Sends `request` and decodes the `2xx` response body as `Res`.
    ///
    /// An empty body decodes as JSON `null`, so `()` and `Option<_>` suit endpoints answering
    /// `204 No Content`.
    pub async fn send_request<Res: DeserializeOwned>(&self, request: ApiRequest) -> Result<Res> {
        let snapshot = self.snapshot();
        let exceptions = &self.inner.exceptions;

        let response = rest::execute(&snapshot.http, &snapshot.config, exceptions, request).await?;
        rest::decode(response, &snapshot.config, exceptions).await
    }

    /// Like [`Self::send_request`], but hands back the successful response undecoded.
    pub async fn send_request_raw(&self, request: ApiRequest) -> Result<Response> {
        let snapshot = self.snapshot();

        rest::execute(&snapshot.http, &snapshot.config, &self.inner.exceptions, request).await
    }

    /// Registers the connection for `endpoint` (appended to the socket base URL) and starts it.
    ///
    /// If the endpoint already has a connecting or connected session, that session is kept and
    /// `handler` is dropped. When a concurrent call evicts the connection before it starts, the
    /// returned handle is already cancelled and its connection stays disconnected, as if the
    /// eviction had happened right after this call.
    #[cfg(feature = "ws")]
    pub async fn connect<H: SocketHandler>(&self, endpoint: &str, handler: H) -> Result<ConnectionHandle> {
        let snapshot = self.snapshot();
        let session = SessionConfig::from_config(&snapshot.config, endpoint, &self.inner.exceptions)?;

        let connection = self.inner.registry.get_or_create(endpoint, session).await;
        let token = connection.start(Arc::new(handler)).await;

        Ok(ConnectionHandle::new(connection, token))
    }

    #[cfg(feature = "ws")]
    #[must_use]
    pub fn connection(&self, endpoint: &str) -> Option<Connection> {
        self.inner.registry.get(endpoint)
    }

    /// Closes and forgets the connection for `endpoint`. Returns whether one existed.
    #[cfg(feature = "ws")]
    pub async fn close_connection(&self, endpoint: &str) -> bool {
        self.inner.registry.close(endpoint).await
    }

    #[cfg(feature = "ws")]
    pub async fn close_all_connections(&self) {
        self.inner.registry.close_all().await;
    }

    /// Registered endpoints, oldest first.
    #[cfg(feature = "ws")]
    #[must_use]
    pub fn active_connections(&self) -> Vec<String> {
        self.inner.registry.active_keys()
    }

    #[cfg(feature = "ws")]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.registry.count()
    }

    #[cfg(feature = "ws")]
    #[must_use]
    pub fn max_connections(&self) -> usize {
        self.inner.registry.capacity()
    }

    /// Changes the connection limit, closing the oldest connections that no longer fit.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_connections` is zero.
    #[cfg(feature = "ws")]
    pub async fn set_max_connections(&self, max_connections: usize) -> Result<()> {
        self.inner.registry.set_capacity(max_connections).await?;
        self.update(|config| config.with_max_connections(max_connections));
        Ok(())
    }
}
