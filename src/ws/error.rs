#![expect(
    clippy::module_name_repetitions,
    reason = "Error types include the module name to indicate their scope"
)]

use std::error::Error as StdError;
use std::fmt;

/// WebSocket failure details, attached as the source of the taxonomy [`crate::Error`].
#[non_exhaustive]
#[derive(Debug)]
pub enum WsError {
    /// Error connecting to or communicating with the WebSocket server
    Connection(tokio_tungstenite::tungstenite::Error),
    /// The handshake did not complete within the socket timeout
    Timeout,
    /// Operation attempted in a state that does not allow it
    InvalidState(String),
    /// The session ended while it was still expected to be open
    SessionClosed,
}

impl fmt::Display for WsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "WebSocket connection error: {e}"),
            Self::Timeout => write!(f, "WebSocket operation timed out"),
            Self::InvalidState(state) => write!(f, "WebSocket is not connected (state: {state})"),
            Self::SessionClosed => write!(f, "WebSocket connection closed"),
        }
    }
}

impl StdError for WsError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Connection(e) => Some(e),
            _ => None,
        }
    }
}
