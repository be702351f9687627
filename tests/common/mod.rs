#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]
#![allow(
    unused,
    reason = "Each integration test binary uses a different subset of these helpers"
)]

use std::net::SocketAddr;
use std::time::Duration;

use netlayer::Config;

pub const TOKEN: &str = "test-token";

/// Config pointing at the given mock servers, with short timeouts.
#[must_use]
pub fn config(rest_base_url: &str, socket_base_url: &str) -> Config {
    Config::builder()
        .rest_base_url(rest_base_url)
        .socket_base_url(socket_base_url)
        .request_timeout(Duration::from_secs(5))
        .connect_timeout(Duration::from_secs(2))
        .socket_timeout(Duration::from_secs(2))
        .build()
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

#[cfg(feature = "ws")]
pub mod ws {
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures_util::{SinkExt as _, StreamExt as _};
    use netlayer::error::Kind;
    use netlayer::ws::{ConnectionState, HandlerError, SocketHandler};
    use netlayer::{Error, ws::Connection};
    use reqwest::header::HeaderMap;
    use tokio::net::TcpListener;
    use tokio::sync::{broadcast, mpsc};
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    const WAIT: Duration = Duration::from_secs(3);

    #[derive(Debug, Clone)]
    enum Outgoing {
        Text(String),
        Close,
    }

    /// Mock WebSocket server.
    pub struct MockWsServer {
        addr: SocketAddr,
        /// Frames pushed to ALL connected clients
        outgoing_tx: broadcast::Sender<Outgoing>,
        /// Text frames received from clients
        received_rx: mpsc::UnboundedReceiver<String>,
        /// Upgrade request headers, one entry per accepted handshake
        handshake_rx: mpsc::UnboundedReceiver<HeaderMap>,
        /// One entry per client session that ended
        disconnect_rx: mpsc::UnboundedReceiver<()>,
        /// Sessions currently open
        live: Arc<AtomicUsize>,
    }

    impl MockWsServer {
        /// Start a mock WebSocket server on a random port.
        pub async fn start() -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();

            let (outgoing_tx, _) = broadcast::channel::<Outgoing>(100);
            let (received_tx, received_rx) = mpsc::unbounded_channel::<String>();
            let (handshake_tx, handshake_rx) = mpsc::unbounded_channel::<HeaderMap>();
            let (disconnect_tx, disconnect_rx) = mpsc::unbounded_channel::<()>();
            let live = Arc::new(AtomicUsize::new(0));

            let broadcast_tx = outgoing_tx.clone();
            let live_sessions = Arc::clone(&live);

            tokio::spawn(async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        break;
                    };

                    let handshake_tx = handshake_tx.clone();
                    let callback = move |request: &Request,
                                         response: Response|
                          -> Result<Response, ErrorResponse> {
                        drop(handshake_tx.send(request.headers().clone()));
                        Ok(response)
                    };
                    let Ok(ws_stream) = tokio_tungstenite::accept_hdr_async(stream, callback).await
                    else {
                        continue;
                    };

                    let (mut write, mut read) = ws_stream.split();
                    let received_tx = received_tx.clone();
                    let disconnect_tx = disconnect_tx.clone();
                    let mut outgoing_rx = broadcast_tx.subscribe();
                    let live = Arc::clone(&live_sessions);
                    live.fetch_add(1, Ordering::SeqCst);

                    tokio::spawn(async move {
                        loop {
                            tokio::select! {
                                msg = read.next() => {
                                    match msg {
                                        Some(Ok(Message::Text(text))) => {
                                            drop(received_tx.send(text.to_string()));
                                        }
                                        Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                                        Some(Ok(_)) => {}
                                    }
                                }
                                msg = outgoing_rx.recv() => {
                                    let frame = match msg {
                                        Ok(Outgoing::Text(text)) => Message::Text(text.into()),
                                        Ok(Outgoing::Close) => Message::Close(None),
                                        Err(_) => break,
                                    };
                                    if write.send(frame).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                        live.fetch_sub(1, Ordering::SeqCst);
                        drop(disconnect_tx.send(()));
                    });
                }
            });

            Self {
                addr,
                outgoing_tx,
                received_rx,
                handshake_rx,
                disconnect_rx,
                live,
            }
        }

        pub fn base_url(&self) -> String {
            format!("ws://{}", self.addr)
        }

        /// Send a text frame to all connected clients.
        pub fn send(&self, message: &str) {
            drop(self.outgoing_tx.send(Outgoing::Text(message.to_owned())));
        }

        /// Close every connected client from the server side.
        pub fn close_all(&self) {
            drop(self.outgoing_tx.send(Outgoing::Close));
        }

        /// Receive the next text frame sent by a client.
        pub async fn recv(&mut self) -> Option<String> {
            timeout(WAIT, self.received_rx.recv()).await.ok().flatten()
        }

        /// Headers of the next accepted handshake.
        pub async fn handshake(&mut self) -> Option<HeaderMap> {
            timeout(WAIT, self.handshake_rx.recv()).await.ok().flatten()
        }

        /// Waits for the next client session to end.
        pub async fn disconnected(&mut self) -> bool {
            timeout(WAIT, self.disconnect_rx.recv()).await.ok().flatten().is_some()
        }

        /// Ended sessions not yet observed through [`Self::disconnected`].
        pub fn pending_disconnects(&mut self) -> usize {
            let mut count = 0;
            while self.disconnect_rx.try_recv().is_ok() {
                count += 1;
            }
            count
        }

        /// Client sessions currently open on the server.
        pub fn live_sessions(&self) -> usize {
            self.live.load(Ordering::SeqCst)
        }

        /// Handshakes accepted but not yet inspected.
        pub fn pending_handshakes(&mut self) -> usize {
            let mut count = 0;
            while self.handshake_rx.try_recv().is_ok() {
                count += 1;
            }
            count
        }
    }

    /// Callback observed by a [`Recorder`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Event {
        Connected,
        Message(String),
        Error(Kind, String),
        Closed,
    }

    /// Handler forwarding every callback to a channel.
    pub struct Recorder {
        events: mpsc::UnboundedSender<Event>,
        /// Messages equal to this payload make `on_message` fail
        fail_on: Option<String>,
    }

    impl Recorder {
        pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
            let (events, rx) = mpsc::unbounded_channel();
            (
                Self {
                    events,
                    fail_on: None,
                },
                rx,
            )
        }

        pub fn failing_on(payload: &str) -> (Self, mpsc::UnboundedReceiver<Event>) {
            let (mut recorder, rx) = Self::new();
            recorder.fail_on = Some(payload.to_owned());
            (recorder, rx)
        }
    }

    impl SocketHandler for Recorder {
        fn on_connected(&self, _connection: &Connection) {
            drop(self.events.send(Event::Connected));
        }

        fn on_message(&self, text: String) -> Result<(), HandlerError> {
            if self.fail_on.as_deref() == Some(text.as_str()) {
                return Err(format!("cannot handle {text}").into());
            }
            drop(self.events.send(Event::Message(text)));
            Ok(())
        }

        fn on_error(&self, error: &Error) {
            drop(
                self.events
                    .send(Event::Error(error.kind(), error.message().to_owned())),
            );
        }

        fn on_close(&self) {
            drop(self.events.send(Event::Closed));
        }
    }

    /// Next recorded callback, failing the test if none arrives in time.
    pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
        timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for a handler callback")
            .expect("recorder dropped")
    }

    /// Polls `condition` until it holds or the wait runs out. Returns its last value.
    pub async fn eventually<F: FnMut() -> bool>(mut condition: F) -> bool {
        let deadline = tokio::time::Instant::now() + WAIT;
        while tokio::time::Instant::now() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        condition()
    }

    /// Waits until the state of `connection` satisfies `predicate`.
    pub async fn wait_for_state<F>(connection: &Connection, predicate: F) -> ConnectionState
    where
        F: FnMut(&ConnectionState) -> bool,
    {
        let mut states = connection.state_receiver();
        let state = timeout(WAIT, states.wait_for(predicate))
            .await
            .expect("timed out waiting for a state change")
            .expect("connection dropped");
        state.clone()
    }
}
