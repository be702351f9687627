#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use futures::stream::SplitSink;
use futures::{SinkExt as _, StreamExt as _};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest as _;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

use super::config::SessionConfig;
use super::error::WsError;
use super::handler::SocketHandler;
use crate::Result;
use crate::error::Error;
use crate::exception::ExceptionHandler;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Handshake in progress
    Connecting,
    /// Successfully connected
    Connected {
        /// When the connection was established
        since: Instant,
    },
    /// The handshake or the session failed
    Error(Arc<Error>),
}

impl ConnectionState {
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// Whether a session is starting or running.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected { .. })
    }

    /// The failure that ended the last session, if any.
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Error(error) => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Lifecycle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

#[derive(Debug)]
struct ConnectionInner {
    endpoint: String,
    config: SessionConfig,
    exceptions: Arc<ExceptionHandler>,
    state_tx: watch::Sender<ConnectionState>,
    /// Sender half feeding the current session task
    outbound: RwLock<Option<mpsc::UnboundedSender<String>>>,
    /// Bumped by every `start` and `close`; a session only touches shared state while its
    /// generation is current.
    generation: AtomicU64,
    /// Set once the connection has left its registry; it never starts again
    retired: AtomicBool,
    lifecycle: Mutex<Lifecycle>,
}

impl ConnectionInner {
    fn logging(&self) -> bool {
        self.config.logging
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Moves to `state` unless a newer `start` or `close` has happened since `generation`.
    fn transition(&self, generation: u64, state: ConnectionState) -> bool {
        let changed = self.state_tx.send_if_modified(|current| {
            if !self.is_current(generation) {
                return false;
            }
            *current = state;
            true
        });

        if changed && self.logging() {
            tracing::debug!(
                endpoint = %self.endpoint,
                state = %*self.state_tx.borrow(),
                "WebSocket state changed"
            );
        }
        changed
    }

    fn clear_outbound(&self, generation: Option<u64>) {
        let mut outbound = self.outbound.write().unwrap_or_else(PoisonError::into_inner);
        if generation.is_none_or(|generation| self.is_current(generation)) {
            *outbound = None;
        }
    }
}

/// A single logical WebSocket connection to one endpoint.
///
/// Cloning is cheap and every clone refers to the same connection. Each call to
/// [`Self::start`] opens a new session on a background task; [`Self::close`] tears it down.
///
/// ```no_run
/// use netlayer::ws::ConnectionState;
///
/// # async fn example(connection: netlayer::ws::Connection) {
/// let mut states = connection.state_receiver();
/// while states.changed().await.is_ok() {
///     if let ConnectionState::Error(error) = &*states.borrow() {
///         eprintln!("session failed: {error}");
///     }
/// }
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    #[must_use]
    pub fn new(endpoint: String, config: SessionConfig, exceptions: Arc<ExceptionHandler>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            inner: Arc::new(ConnectionInner {
                endpoint,
                config,
                exceptions,
                state_tx,
                outbound: RwLock::new(None),
                generation: AtomicU64::new(0),
                retired: AtomicBool::new(false),
                lifecycle: Mutex::new(Lifecycle {
                    token: CancellationToken::new(),
                    task: None,
                }),
            }),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    #[must_use]
    pub fn session_config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Whether `self` and `other` are handles to the same connection.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether the connection was evicted or removed from its registry.
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.inner.retired.load(Ordering::SeqCst)
    }

    /// Marks the connection as no longer registered. Later calls to [`Self::start`] do nothing.
    pub(crate) fn retire(&self) {
        self.inner.retired.store(true, Ordering::SeqCst);
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.state_tx.borrow().clone()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Opens a session and pumps its frames into `handler`.
    ///
    /// While a session is connecting or connected this does nothing and returns that session's
    /// cancellation token. Cancelling the returned token ends the session without an
    /// [`SocketHandler::on_error`] call.
    ///
    /// A retired connection is never started again: the state stays as it is and the returned
    /// token is already cancelled.
    pub async fn start(&self, handler: Arc<dyn SocketHandler>) -> CancellationToken {
        let inner = &self.inner;
        let mut lifecycle = inner.lifecycle.lock().await;

        if self.is_retired() {
            if inner.logging() {
                tracing::debug!(endpoint = %inner.endpoint, "connection retired, start ignored");
            }
            let token = CancellationToken::new();
            token.cancel();
            return token;
        }

        if inner.state_tx.borrow().is_active() {
            if inner.logging() {
                tracing::debug!(endpoint = %inner.endpoint, "session already active, start ignored");
            }
            return lifecycle.token.clone();
        }

        lifecycle.token.cancel();
        if let Some(stale) = lifecycle.task.take() {
            stale.abort();
        }

        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        *inner.outbound.write().unwrap_or_else(PoisonError::into_inner) = Some(outbound_tx);

        let previous = inner.state_tx.send_replace(ConnectionState::Connecting);
        if inner.logging() {
            tracing::debug!(
                endpoint = %inner.endpoint,
                url = %inner.config.url,
                from = %previous,
                "WebSocket connecting"
            );
        }

        let session = Session {
            inner: Arc::clone(inner),
            generation,
            handler,
            token: token.clone(),
        };
        lifecycle.task = Some(tokio::spawn(session.run(outbound_rx)));
        lifecycle.token = token.clone();

        token
    }

    /// Queues one text frame. Fails without side effects unless the connection is
    /// [`ConnectionState::Connected`].
    pub fn send_message<S: Into<String>>(&self, text: S) -> Result<()> {
        let inner = &self.inner;
        let state = self.state();
        if !state.is_connected() {
            return Err(inner
                .exceptions
                .unknown(WsError::InvalidState(state.to_string())));
        }

        let outbound = inner.outbound.read().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = outbound.as_ref() else {
            return Err(inner.exceptions.handle_network(WsError::SessionClosed));
        };
        sender
            .send(text.into())
            .map_err(|_e| inner.exceptions.handle_network(WsError::SessionClosed))
    }

    /// Encodes `message` as JSON and queues it as one text frame.
    pub fn send_json<T: Serialize + ?Sized>(&self, message: &T) -> Result<()> {
        let text = serde_json::to_string(message).map_err(|e| self.inner.exceptions.handle_decode(e))?;
        self.send_message(text)
    }

    /// Ends the current session, if any, and resets to [`ConnectionState::Disconnected`].
    ///
    /// Waits up to the socket timeout for the session to close the transport, then aborts it.
    /// Close failures are logged, never returned.
    pub async fn close(&self) {
        let inner = &self.inner;
        let mut lifecycle = inner.lifecycle.lock().await;

        inner.generation.fetch_add(1, Ordering::SeqCst);
        lifecycle.token.cancel();
        inner.clear_outbound(None);

        if let Some(mut task) = lifecycle.task.take() {
            match timeout(inner.config.socket_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if inner.logging() {
                        tracing::warn!(endpoint = %inner.endpoint, error = %e, "session task failed");
                    }
                }
                Err(_elapsed) => {
                    if inner.logging() {
                        tracing::warn!(
                            endpoint = %inner.endpoint,
                            timeout = ?inner.config.socket_timeout,
                            "session did not stop in time, aborting"
                        );
                    }
                    task.abort();
                }
            }
        }

        let changed = inner.state_tx.send_if_modified(|state| {
            if matches!(state, ConnectionState::Disconnected) {
                return false;
            }
            *state = ConnectionState::Disconnected;
            true
        });
        if changed && inner.logging() {
            tracing::debug!(endpoint = %inner.endpoint, "WebSocket closed");
        }
    }
}

/// One transport session, run on its own task.
struct Session {
    inner: Arc<ConnectionInner>,
    generation: u64,
    handler: Arc<dyn SocketHandler>,
    token: CancellationToken,
}

impl Session {
    async fn run(self, mut outbound: mpsc::UnboundedReceiver<String>) {
        let inner = &self.inner;

        let request = match handshake_request(&inner.config) {
            Ok(request) => request,
            Err(e) => {
                self.fail(inner.exceptions.handle_network(WsError::Connection(e)));
                return;
            }
        };

        let connected = tokio::select! {
            () = self.token.cancelled() => None,
            result = timeout(inner.config.socket_timeout, connect_async(request)) => Some(result),
        };
        let stream = match connected {
            None => {
                inner.transition(self.generation, ConnectionState::Disconnected);
                return;
            }
            Some(Ok(Ok((stream, _response)))) => stream,
            Some(Ok(Err(e))) => {
                self.fail(inner.exceptions.handle_network(WsError::Connection(e)));
                return;
            }
            Some(Err(_elapsed)) => {
                self.fail(inner.exceptions.handle_network(WsError::Timeout));
                return;
            }
        };

        let since = Instant::now();
        if !inner.transition(self.generation, ConnectionState::Connected { since }) {
            return;
        }
        self.handler.on_connected(&Connection {
            inner: Arc::clone(inner),
        });

        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                biased;

                () = self.token.cancelled() => {
                    self.close_transport(&mut write).await;
                    inner.transition(self.generation, ConnectionState::Disconnected);
                    break;
                }

                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if !inner.is_current(self.generation) || !inner.state_tx.borrow().is_connected() {
                            break;
                        }
                        if inner.logging() {
                            tracing::trace!(endpoint = %inner.endpoint, text = %text.as_str(), "received text frame");
                        }
                        if let Err(e) = self.handler.on_message(text.as_str().to_owned()) {
                            let error = inner.exceptions.handle_boxed(e);
                            if inner.logging() {
                                tracing::warn!(endpoint = %inner.endpoint, error = %error, "message handler failed");
                            }
                            self.handler.on_error(&error);
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        if inner.logging() {
                            tracing::debug!(endpoint = %inner.endpoint, ?frame, "server closed the session");
                        }
                        self.handler.on_close();
                        self.close_transport(&mut write).await;
                        inner.transition(self.generation, ConnectionState::Disconnected);
                        break;
                    }
                    Some(Ok(other)) => {
                        if inner.logging() {
                            tracing::debug!(endpoint = %inner.endpoint, len = other.len(), "ignoring non-text frame");
                        }
                    }
                    Some(Err(e)) => {
                        self.fail(inner.exceptions.handle_network(WsError::Connection(e)));
                        break;
                    }
                    None => {
                        self.fail(inner.exceptions.handle_network(WsError::SessionClosed));
                        break;
                    }
                },

                Some(text) = outbound.recv() => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        self.fail(inner.exceptions.handle_network(WsError::Connection(e)));
                        break;
                    }
                }
            }
        }

        inner.clear_outbound(Some(self.generation));
    }

    /// Records `error` as the session outcome and reports it, unless the session is stale.
    fn fail(&self, error: Error) {
        let inner = &self.inner;
        let error = Arc::new(error);

        if inner.transition(self.generation, ConnectionState::Error(Arc::clone(&error))) {
            if inner.logging() {
                tracing::warn!(endpoint = %inner.endpoint, error = %error, "WebSocket session failed");
            }
            self.handler.on_error(&error);
        }
    }

    async fn close_transport(&self, write: &mut WsSink) {
        let inner = &self.inner;
        match timeout(inner.config.socket_timeout, write.close()).await {
            Ok(Ok(()) | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed)) => {}
            Ok(Err(e)) => {
                if inner.logging() {
                    tracing::warn!(endpoint = %inner.endpoint, error = %e, "error closing WebSocket");
                }
            }
            Err(_elapsed) => {
                if inner.logging() {
                    tracing::warn!(endpoint = %inner.endpoint, "timed out closing WebSocket");
                }
            }
        }
    }
}

fn handshake_request(config: &SessionConfig) -> std::result::Result<Request, tungstenite::Error> {
    let mut request = config.url.as_str().into_client_request()?;
    request.headers_mut().extend(config.headers.clone());
    Ok(request)
}

/// A started connection together with the cancellation token of its session.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    connection: Connection,
    token: CancellationToken,
}

impl ConnectionHandle {
    pub(crate) fn new(connection: Connection, token: CancellationToken) -> Self {
        Self { connection, token }
    }

    /// Queues one text frame. See [`Connection::send_message`].
    pub fn send<S: Into<String>>(&self, text: S) -> Result<()> {
        self.connection.send_message(text)
    }

    pub fn send_json<T: Serialize + ?Sized>(&self, message: &T) -> Result<()> {
        self.connection.send_json(message)
    }

    /// Ends the session without reporting an error. The connection stays registered and can be
    /// started again.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.connection.endpoint()
    }

    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}
