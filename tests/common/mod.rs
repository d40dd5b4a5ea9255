#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for quiz sync client integration tests.
//!
//! Provides an in-memory [`LoopbackConnector`] whose every connection shows up
//! on the test side as a [`ServerEnd`], plus builders for the JSON the quiz
//! server pushes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use quiz_sync_client::protocol::ClientMessage;
use quiz_sync_client::{ChannelConfig, ClientUpdate, Connector, QuizClientError, Transport};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::Instant;

pub const SERVER_URL: &str = "ws://quiz.test";

/// Config pointing at the loopback server.
pub fn config() -> ChannelConfig {
    ChannelConfig::new(SERVER_URL)
}

/// Install a tracing subscriber once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── Loopback transport ──────────────────────────────────────────────

/// Client half of an in-memory connection.
pub struct LoopbackTransport {
    incoming: mpsc::UnboundedReceiver<String>,
    outgoing: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, message: String) -> Result<(), QuizClientError> {
        self.outgoing
            .send(message)
            .map_err(|_| QuizClientError::TransportClosed)
    }

    async fn recv(&mut self) -> Option<Result<String, QuizClientError>> {
        // `None` once the server end is dropped, i.e. the server hung up.
        self.incoming.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), QuizClientError> {
        self.closed.store(true, Ordering::Release);
        self.incoming.close();
        Ok(())
    }
}

/// Server half of an in-memory connection. Dropping it closes the connection.
pub struct ServerEnd {
    /// Full URL the client connected to.
    pub url: String,
    to_client: mpsc::UnboundedSender<String>,
    from_client: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
}

impl ServerEnd {
    /// Push a JSON message to the client.
    pub fn push(&self, message: &Value) {
        self.push_raw(&message.to_string());
    }

    /// Push raw text, which need not be valid JSON.
    pub fn push_raw(&self, text: &str) {
        self.to_client.send(text.to_owned()).unwrap();
    }

    /// Next command the client sent, waiting up to five seconds.
    pub async fn next_sent(&mut self) -> ClientMessage {
        let text = tokio::time::timeout(Duration::from_secs(5), self.from_client.recv())
            .await
            .expect("timed out waiting for a client message")
            .expect("client side of the connection is gone");
        serde_json::from_str(&text).unwrap()
    }

    /// Every command sent so far, without waiting.
    pub fn drain_sent(&mut self) -> Vec<ClientMessage> {
        let mut sent = Vec::new();
        while let Ok(text) = self.from_client.try_recv() {
            sent.push(serde_json::from_str(&text).unwrap());
        }
        sent
    }

    /// `true` once the client closed its half.
    pub fn is_closed_by_client(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

// ── Loopback connector ──────────────────────────────────────────────

/// Connector handing out loopback transports, or refusing while "down".
pub struct LoopbackConnector {
    accepted: mpsc::UnboundedSender<ServerEnd>,
    down: Arc<AtomicBool>,
    attempts: Arc<StdMutex<Vec<Instant>>>,
}

#[async_trait]
impl Connector for LoopbackConnector {
    type Transport = LoopbackTransport;

    async fn connect(&self, url: &str) -> Result<LoopbackTransport, QuizClientError> {
        self.attempts.lock().unwrap().push(Instant::now());
        if self.down.load(Ordering::Acquire) {
            return Err(QuizClientError::Connect {
                url: url.to_owned(),
                reason: "connection refused".into(),
            });
        }

        let (to_client, incoming) = mpsc::unbounded_channel();
        let (outgoing, from_client) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let server_end = ServerEnd {
            url: url.to_owned(),
            to_client,
            from_client,
            closed: Arc::clone(&closed),
        };
        self.accepted
            .send(server_end)
            .map_err(|_| QuizClientError::TransportClosed)?;

        Ok(LoopbackTransport {
            incoming,
            outgoing,
            closed,
        })
    }
}

/// Test-side control of a [`LoopbackConnector`].
pub struct LoopbackServer {
    accepted: mpsc::UnboundedReceiver<ServerEnd>,
    down: Arc<AtomicBool>,
    attempts: Arc<StdMutex<Vec<Instant>>>,
}

impl LoopbackServer {
    /// Wait for the client's next successful connection.
    pub async fn accept(&mut self) -> ServerEnd {
        tokio::time::timeout(Duration::from_secs(30), self.accepted.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("connector dropped")
    }

    /// Refuse (`true`) or accept (`false`) further connection attempts.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::Release);
    }

    /// Instants of every connection attempt so far.
    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }
}

pub fn loopback() -> (LoopbackConnector, LoopbackServer) {
    let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
    let down = Arc::new(AtomicBool::new(false));
    let attempts = Arc::new(StdMutex::new(Vec::new()));
    let connector = LoopbackConnector {
        accepted: accepted_tx,
        down: Arc::clone(&down),
        attempts: Arc::clone(&attempts),
    };
    let server = LoopbackServer {
        accepted: accepted_rx,
        down,
        attempts,
    };
    (connector, server)
}

// ── Update helpers ──────────────────────────────────────────────────

/// Await an update with a generous deadline so a hang fails the test.
pub async fn within<F>(future: F) -> Option<ClientUpdate>
where
    F: std::future::Future<Output = Option<ClientUpdate>>,
{
    tokio::time::timeout(Duration::from_secs(60), future)
        .await
        .expect("timed out waiting for an update")
}

/// Is this a countdown tick? Most tests are not interested in them.
pub fn is_tick(update: &ClientUpdate) -> bool {
    matches!(update, ClientUpdate::CountdownTick { .. })
}

// ── JSON builders ───────────────────────────────────────────────────

/// A question as the server sends it.
pub fn question_json(
    id: u64,
    question_type: &str,
    answers: &[&str],
    correct: &[usize],
    timer: f64,
    time_left: Option<f64>,
) -> Value {
    json!({
        "id": id,
        "categories": ["general"],
        "question_type": question_type,
        "question": format!("Question {id}?"),
        "images": [format!("q{id}.png")],
        "answer_images": [format!("a{id}.png")],
        "answers": answers,
        "correct_answers": correct,
        "score": 1,
        "timer": timer,
        "time_left": time_left,
    })
}

/// The standard two-option single-choice question with ten seconds.
pub fn simple_question() -> Value {
    question_json(1, "single_choice", &["A", "B"], &[0], 10.0, Some(10.0))
}

/// A `table` event. Mutate the returned value for optional fields.
pub fn table_event(table_state: &str, role: &str, question: Value) -> Value {
    json!({
        "event_type": "table",
        "table_id": 3,
        "table_name": "Owls",
        "table_state": table_state,
        "clients": 2,
        "role": role,
        "question": question,
        "result": null,
    })
}

/// One entry of the screen's table list.
pub fn table_entry(table_id: u32, name: Option<&str>, table_state: &str) -> Value {
    json!({
        "table_id": table_id,
        "table_name": name,
        "table_state": table_state,
        "clients": 1,
    })
}

/// A `screen_tables_state` event.
pub fn screen_state(game_state: &str, tables: Vec<Value>, question: Value) -> Value {
    json!({
        "event_type": "screen_tables_state",
        "game_state": game_state,
        "tables": tables,
        "question": question,
        "results": null,
    })
}

pub fn error_event(error: &str) -> Value {
    json!({"event_type": "error", "error": error})
}
