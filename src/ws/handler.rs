use std::error::Error as StdError;

use super::connection::Connection;
use crate::error::Error;

/// Error type a [`SocketHandler`] may return from [`SocketHandler::on_message`].
pub type HandlerError = Box<dyn StdError + Send + Sync + 'static>;

/// Callbacks invoked by a connection's session task.
///
/// Callbacks run on the session task, one at a time and in frame order, so a slow callback
/// delays the frames behind it. Returning an error from [`Self::on_message`] does not end the
/// session: the error is mapped onto the taxonomy and handed to [`Self::on_error`].
///
/// ```
/// use netlayer::Error;
/// use netlayer::ws::{HandlerError, SocketHandler};
///
/// struct Printer;
///
/// impl SocketHandler for Printer {
///     fn on_message(&self, text: String) -> Result<(), HandlerError> {
///         println!("{text}");
///         Ok(())
///     }
///
///     fn on_error(&self, error: &Error) {
///         eprintln!("{error}");
///     }
/// }
/// ```
pub trait SocketHandler: Send + Sync + 'static {
    /// The handshake completed. `connection` can already send.
    fn on_connected(&self, connection: &Connection) {
        _ = connection;
    }

    /// A text frame arrived. The payload is passed through untouched.
    fn on_message(&self, text: String) -> Result<(), HandlerError>;

    /// The session failed, or a previous [`Self::on_message`] call returned an error.
    fn on_error(&self, error: &Error);

    /// The server closed the session.
    fn on_close(&self) {}
}
