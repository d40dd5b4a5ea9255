//! Transport abstraction for the quiz game protocol.
//!
//! Two traits split the connection concern:
//!
//! - [`Transport`] is one live, bidirectional text message connection. It is
//!   used for exactly one connection epoch and then dropped.
//! - [`Connector`] opens a fresh [`Transport`] to a URL. The
//!   [`ConnectionChannel`](crate::channel::ConnectionChannel) calls it again
//!   after every unexpected closure, which is how reconnection works without
//!   any transport knowing about retries.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use quiz_sync_client::error::QuizClientError;
//! use quiz_sync_client::transport::{Connector, Transport};
//!
//! struct MyTransport { /* ... */ }
//! struct MyConnector;
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), QuizClientError> {
//!         todo!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, QuizClientError>> {
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), QuizClientError> {
//!         todo!()
//!     }
//! }
//!
//! #[async_trait]
//! impl Connector for MyConnector {
//!     type Transport = MyTransport;
//!
//!     async fn connect(&self, url: &str) -> Result<MyTransport, QuizClientError> {
//!         todo!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::QuizClientError;

/// A bidirectional text message transport carrying JSON protocol messages.
///
/// Each call to [`send`](Transport::send) transmits one complete JSON message.
/// Each call to [`recv`](Transport::recv) returns one complete JSON message.
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method **MUST** be cancel-safe because it is used
/// inside `tokio::select!`. If `recv` is cancelled before completion, calling it
/// again must not lose data. Channel-based implementations (e.g., wrapping
/// `mpsc::Receiver`) are naturally cancel-safe.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text message to the server.
    ///
    /// # Errors
    ///
    /// Returns [`QuizClientError::TransportSend`] if the message could not be sent.
    async fn send(&mut self, message: String) -> Result<(), QuizClientError>;

    /// Receive the next JSON text message from the server.
    ///
    /// Returns:
    /// - `Some(Ok(text))`: a complete message was received
    /// - `Some(Err(e))`: a transport error occurred
    /// - `None`: the connection was closed by the server
    async fn recv(&mut self) -> Option<Result<String, QuizClientError>>;

    /// Close the transport connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the graceful shutdown fails. Implementations should
    /// still release resources even if the close handshake fails.
    async fn close(&mut self) -> Result<(), QuizClientError>;
}

/// Opens a new [`Transport`] for each connection epoch.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The transport produced by a successful connection.
    type Transport: Transport;

    /// Connect to the full endpoint URL (e.g. `ws://host:8000/ws/table/3`).
    ///
    /// # Errors
    ///
    /// Any error is treated as a transport fault: the channel schedules
    /// another attempt after its reconnect delay.
    async fn connect(&self, url: &str) -> Result<Self::Transport, QuizClientError>;
}
