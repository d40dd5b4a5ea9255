//! # Table Console Example
//!
//! A terminal table device for the quiz game:
//!
//! 1. Connect to the table endpoint over WebSocket (reconnecting on loss)
//! 2. Print every panel change, notice and countdown milestone
//! 3. Read commands from stdin: a number toggles that option, `submit` sends
//!    the answer, `name <text>` names the table
//! 4. Shut down gracefully on Ctrl+C
//!
//! ## Running
//!
//! ```sh
//! # Start a quiz server on localhost:8000, then:
//! cargo run --example table_console -- 3
//!
//! # Override the server URL:
//! QUIZ_SERVER_URL=ws://quiz.local:8000 cargo run --example table_console -- 3
//! ```

use quiz_sync_client::view::{QuestionPanel, TablePanel};
use quiz_sync_client::{ChannelConfig, ClientUpdate, TableClient};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Default server URL when `QUIZ_SERVER_URL` is not set.
const DEFAULT_URL: &str = "ws://localhost:8000";

fn print_question(panel: &QuestionPanel) {
    println!("\n{}", panel.prompt);
    for option in &panel.options {
        let check = if option.checked { "x" } else { " " };
        println!("  [{check}] {}: {} {:?}", option.index, option.text, option.mark);
    }
    for status in &panel.statuses {
        println!("  ({status:?})");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("QUIZ_SERVER_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let table_id: u32 = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "1".to_string())
        .parse()?;
    let config = ChannelConfig::new(url);
    tracing::info!("Joining table {table_id} at {}", config.server_url);

    let mut table = TableClient::start(config.connector(), table_id, config);
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            update = table.next_update() => {
                let Some(update) = update else {
                    tracing::info!("Connection task stopped, exiting");
                    break;
                };
                match update {
                    ClientUpdate::Connected { epoch } => {
                        tracing::info!("Connected (epoch {epoch})");
                    }
                    ClientUpdate::StateReplaced => match table.panel() {
                        TablePanel::Connecting => {}
                        TablePanel::WaitingLeader => println!("Waiting for a leader..."),
                        TablePanel::Join => {
                            if let Some(join) = table.join_panel() {
                                let name = join.table_name.as_deref().unwrap_or("(unnamed)");
                                println!("Table {} {name}, {} device(s)", join.table_id, join.clients);
                            }
                        }
                        TablePanel::Question => {
                            if let Some(panel) = table.question_panel() {
                                print_question(&panel);
                            }
                        }
                        TablePanel::Result => {
                            if let Some(result) = table.result_view() {
                                println!("\nFinal score {} (place {:?} of {})",
                                    result.score, result.place, result.place_amount);
                                for row in &result.questions {
                                    println!("  {}: {}/{}", row.prompt, row.points, row.max_points);
                                }
                            }
                        }
                    },
                    ClientUpdate::Notice(notice) => println!("! {notice}"),
                    ClientUpdate::CountdownTick { remaining } => {
                        if remaining.fract() == 0.0 {
                            println!("  {remaining:.0}s left");
                        }
                    }
                    ClientUpdate::TimeOver => println!("Time is over!"),
                }
            }

            line = stdin.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                let outcome = if line == "submit" {
                    table.submit_answer().map(|()| "answer sent".to_string())
                } else if let Some(name) = line.strip_prefix("name ") {
                    table.set_table_name(name).map(|name| format!("name set to {name}"))
                } else if let Ok(index) = line.parse::<usize>() {
                    table.select_answer(index).map(|selected| format!("selected {selected:?}"))
                } else {
                    Ok("commands: <option number> | submit | name <text>".to_string())
                };
                match outcome {
                    Ok(message) => println!("{message}"),
                    Err(rejection) => println!("not allowed: {rejection}"),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down...");
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    table.close().await;
    Ok(())
}
