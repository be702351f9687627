//! WebSocket connections.
//!
//! - [`Connection`]: one logical connection per endpoint, driving a session task that feeds
//!   inbound text frames into a [`SocketHandler`]
//! - [`Registry`]: bounded, insertion-ordered pool of connections with oldest-first eviction
//!
//! Most callers go through [`crate::Client::connect`], which resolves the endpoint against the
//! configured socket base URL, registers the connection and starts it.
//!
//! # Example
//!
//! ```no_run
//! use netlayer::ws::{HandlerError, SocketHandler};
//! use netlayer::{Client, Config, Error};
//!
//! struct Chat;
//!
//! impl SocketHandler for Chat {
//!     fn on_message(&self, text: String) -> Result<(), HandlerError> {
//!         println!("{text}");
//!         Ok(())
//!     }
//!
//!     fn on_error(&self, error: &Error) {
//!         eprintln!("chat failed: {error}");
//!     }
//! }
//!
//! # async fn example() -> netlayer::Result<()> {
//! let client = Client::new(
//!     Config::builder()
//!         .rest_base_url("https://api.example.com")
//!         .socket_base_url("wss://ws.example.com")
//!         .build(),
//! )?;
//! let handle = client.connect("/chat/general", Chat).await?;
//! // ... once connected
//! handle.send(r#"{"type":"hello"}"#)?;
//! client.close_connection("/chat/general").await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod registry;

pub use config::SessionConfig;
pub use connection::{Connection, ConnectionHandle, ConnectionState};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use handler::{HandlerError, SocketHandler};
pub use registry::Registry;
