//! # Quiz Sync Client
//!
//! Real-time client engine for a server-authoritative multiplayer quiz game.
//!
//! The server drives the game through its phases (lobby, question, answer
//! reveal, results) and pushes full state snapshots to three kinds of client:
//! a device at a table (the table's *leader* acts, *observers* watch), the
//! shared public *screen*, and the operator's *admin* console. This crate keeps
//! one self-healing connection per client, folds the pushed snapshots into a
//! local view, runs a countdown reconciled against the server's remaining
//! time, and decides which local actions are legal right now.
//!
//! ## Features
//!
//! - **Self-healing connections**: fixed 3 s reconnect delay, fire-and-forget commands
//! - **Snapshot replacement**: every full-state push replaces the local state, never merges
//! - **Local countdown**: 100 ms ticks, reseeded whenever the server's timing changes
//! - **Gated interaction**: observers, expired timers and revealed answers reject locally
//! - **Transport-agnostic**: implement [`Transport`] and [`Connector`] for any backend;
//!   the default `transport-websocket` feature ships a WebSocket implementation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use quiz_sync_client::{ChannelConfig, ClientUpdate, TableClient};
//!
//! let config = ChannelConfig::new("ws://localhost:8000");
//! let mut table = TableClient::start(config.connector(), 3, config);
//!
//! while let Some(update) = table.next_update().await {
//!     if update == ClientUpdate::StateReplaced {
//!         if let Some(panel) = table.question_panel() {
//!             println!("{}", panel.prompt);
//!         }
//!     }
//! }
//! ```

pub mod channel;
pub mod client;
pub mod countdown;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod protocol;
pub mod selection;
pub mod transport;
pub mod transports;
pub mod view;

// Re-export primary types for ergonomic imports.
pub use channel::{ChannelConfig, ConnectionChannel, ConnectionState, Endpoint};
pub use client::{AdminClient, ScreenClient, TableClient};
pub use error::QuizClientError;
pub use event::{ClientUpdate, Notice};
pub use protocol::{ClientMessage, ServerMessage};
pub use selection::Rejection;
pub use transport::{Connector, Transport};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
