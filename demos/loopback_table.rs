//! # Loopback Table Example
//!
//! Drives a [`TableClient`] against an in-process fake quiz server, showing
//! how to plug a custom [`Connector`] / [`Transport`] pair into the client.
//!
//! The fake server pushes a question, waits for the leader's answer, reveals
//! the correct option and finally drops the connection once to show the
//! reconnect notice.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example loopback_table
//! ```

use async_trait::async_trait;
use quiz_sync_client::protocol::ClientMessage;
use quiz_sync_client::view::TablePanel;
use quiz_sync_client::{
    ChannelConfig, ClientUpdate, Connector, Notice, QuizClientError, TableClient, Transport,
};
use serde_json::json;
use tokio::sync::mpsc;

// ── In-memory transport ─────────────────────────────────────────────

/// Client side of an in-memory connection.
struct ChannelTransport {
    incoming: mpsc::UnboundedReceiver<String>,
    outgoing: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&mut self, message: String) -> Result<(), QuizClientError> {
        self.outgoing
            .send(message)
            .map_err(|e| QuizClientError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, QuizClientError>> {
        self.incoming.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), QuizClientError> {
        self.incoming.close();
        Ok(())
    }
}

/// Server side of an in-memory connection.
struct Connection {
    to_client: mpsc::UnboundedSender<String>,
    from_client: mpsc::UnboundedReceiver<String>,
}

/// Hands every new connection to the fake server task.
struct ChannelConnector {
    accepted: mpsc::UnboundedSender<Connection>,
}

#[async_trait]
impl Connector for ChannelConnector {
    type Transport = ChannelTransport;

    async fn connect(&self, url: &str) -> Result<ChannelTransport, QuizClientError> {
        tracing::info!("fake server: connection to {url}");
        let (to_client, incoming) = mpsc::unbounded_channel();
        let (outgoing, from_client) = mpsc::unbounded_channel();
        self.accepted
            .send(Connection {
                to_client,
                from_client,
            })
            .map_err(|_| QuizClientError::Connect {
                url: url.to_string(),
                reason: "fake server stopped".into(),
            })?;
        Ok(ChannelTransport { incoming, outgoing })
    }
}

// ── Fake server ─────────────────────────────────────────────────────

fn table_event(state: &str, answers: Option<&[usize]>, answered: bool) -> String {
    json!({
        "event_type": "table",
        "table_id": 1,
        "table_name": "Loopback",
        "table_state": state,
        "clients": 1,
        "table_answers": answers,
        "answered": answered,
        "role": "leader",
        "question": {
            "id": 1,
            "categories": ["rust"],
            "question_type": "single_choice",
            "question": "Which keyword declares an immutable binding?",
            "answers": ["var", "let", "mut"],
            "correct_answers": [1],
            "score": 1,
            "timer": 15,
            "time_left": 15
        },
        "result": null
    })
    .to_string()
}

async fn fake_server(mut accepted: mpsc::UnboundedReceiver<Connection>) {
    // First connection: play one question, then hang up.
    let Some(mut conn) = accepted.recv().await else {
        return;
    };
    let _ = conn.to_client.send(table_event("in_question", None, false));

    let mut selection = Vec::new();
    while let Some(text) = conn.from_client.recv().await {
        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::SetTableAnswers { table_answers }) => selection = table_answers,
            Ok(ClientMessage::AnswerQuestion { table_answers }) => {
                selection = table_answers;
                break;
            }
            other => tracing::warn!("fake server: unexpected {other:?}"),
        }
    }
    let _ = conn
        .to_client
        .send(table_event("in_answers", Some(&selection), true));
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    drop(conn);

    // Second connection: the client is back; keep it open until shutdown.
    if let Some(mut conn) = accepted.recv().await {
        let _ = conn
            .to_client
            .send(table_event("in_answers", Some(&selection), true));
        while conn.from_client.recv().await.is_some() {}
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
    tokio::spawn(fake_server(accepted_rx));

    let connector = ChannelConnector {
        accepted: accepted_tx,
    };
    let config =
        ChannelConfig::new("mem://quiz").with_reconnect_delay(std::time::Duration::from_secs(1));
    let mut table = TableClient::start(connector, 1, config);

    let mut answered = false;
    let mut reconnected = false;
    while let Some(update) = table.next_update().await {
        match update {
            ClientUpdate::StateReplaced if table.panel() == TablePanel::Question => {
                let Some(panel) = table.question_panel() else {
                    continue;
                };
                println!("{}", panel.prompt);
                for option in &panel.options {
                    println!("  {}: {} {:?}", option.index, option.text, option.mark);
                }
                if reconnected {
                    println!("state restored after reconnect");
                    break;
                }
                if !answered {
                    table.select_answer(1)?;
                    table.submit_answer()?;
                    answered = true;
                    println!("answered option 1");
                }
            }
            ClientUpdate::Notice(Notice::Reconnecting) => {
                println!("connection lost, reconnecting...");
            }
            ClientUpdate::Connected { epoch } if epoch > 1 => {
                println!("reconnected (epoch {epoch})");
                reconnected = true;
            }
            _ => {}
        }
    }

    table.close().await;
    Ok(())
}
