//! Error types for the quiz sync client.

use thiserror::Error;

/// Errors that can occur inside the quiz sync client.
///
/// Transport failures never reach the role sessions as errors: the
/// [`ConnectionChannel`](crate::channel::ConnectionChannel) turns them into a
/// reconnect cycle. These variants surface from [`Transport`](crate::Transport)
/// and [`Connector`](crate::Connector) implementations and from decoding.
#[derive(Debug, Error)]
pub enum QuizClientError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// A connection attempt to an endpoint failed.
    #[error("failed to connect to {url}: {reason}")]
    Connect {
        /// Full URL of the endpoint.
        url: String,
        /// Human-readable failure description.
        reason: String,
    },

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,
}

/// A specialized [`Result`] type for quiz client operations.
pub type Result<T> = std::result::Result<T, QuizClientError>;
