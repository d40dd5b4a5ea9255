//! Decoding and classification of inbound server messages.
//!
//! Raw text is decoded into a [`ServerMessage`] and folded into a role's state
//! through the [`RoleState`] trait. Full snapshots replace the stored state
//! wholesale; side-effect events only produce [`Notice`]s. Malformed text is
//! logged and dropped, and unknown `event_type`s are ignored, so no input can
//! take the dispatcher down.

use tracing::{debug, warn};

use crate::error::Result;
use crate::event::Notice;
use crate::protocol::ServerMessage;
use crate::view::{AdminView, ScreenView, TableView};

/// What applying one message did to a role's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The stored state was replaced by a full snapshot.
    Replaced,
    /// State is untouched; these notices should be shown.
    Notify(Vec<Notice>),
    /// The message is not meant for this role, or not understood.
    Ignored,
}

/// State of one client role that inbound messages are folded into.
pub trait RoleState {
    /// Short role name used in log lines.
    const ROLE: &'static str;

    /// Fold one decoded message into the state.
    fn apply(&mut self, message: ServerMessage) -> Dispatch;
}

/// Decode one raw text message.
///
/// # Errors
///
/// Returns [`QuizClientError::Serialization`](crate::QuizClientError::Serialization) if `raw` is not a valid message.
pub fn try_decode(raw: &str) -> Result<ServerMessage> {
    Ok(serde_json::from_str(raw)?)
}

/// Decode one raw text message. Malformed input is logged and yields `None`.
pub fn decode(raw: &str) -> Option<ServerMessage> {
    match try_decode(raw) {
        Ok(message) => Some(message),
        Err(e) => {
            warn!("failed to parse server message: {e}; raw: {raw}");
            None
        }
    }
}

/// Decode `raw` and fold it into `state`.
pub fn dispatch<S: RoleState>(state: &mut S, raw: &str) -> Dispatch {
    let Some(message) = decode(raw) else {
        return Dispatch::Ignored;
    };
    if message == ServerMessage::Unknown {
        debug!(role = S::ROLE, "ignoring unrecognized event type");
        return Dispatch::Ignored;
    }

    let event_type = message.event_type();
    let outcome = state.apply(message);
    if outcome == Dispatch::Ignored {
        debug!(role = S::ROLE, event_type, "event not handled by this role");
    }
    outcome
}

fn server_error(error: String) -> Dispatch {
    Dispatch::Notify(vec![Notice::ServerError(error)])
}

// ── Role folding ────────────────────────────────────────────────────

impl RoleState for TableView {
    const ROLE: &'static str = "table";

    fn apply(&mut self, message: ServerMessage) -> Dispatch {
        match message {
            ServerMessage::Table(payload) => {
                self.replace(*payload);
                Dispatch::Replaced
            }
            ServerMessage::Error { error } => server_error(error),
            _ => Dispatch::Ignored,
        }
    }
}

impl RoleState for ScreenView {
    const ROLE: &'static str = "screen";

    fn apply(&mut self, message: ServerMessage) -> Dispatch {
        match message {
            ServerMessage::ScreenTablesState(payload) => {
                self.replace(*payload);
                Dispatch::Replaced
            }
            ServerMessage::ScreenTableAnswered {
                table_id,
                table_name,
                last,
            } => {
                let mut notices = vec![Notice::TableAnswered {
                    table_id,
                    table_name,
                }];
                if last {
                    notices.push(Notice::AllTablesAnswered);
                }
                Dispatch::Notify(notices)
            }
            ServerMessage::Error { error } => server_error(error),
            _ => Dispatch::Ignored,
        }
    }
}

impl RoleState for AdminView {
    const ROLE: &'static str = "admin";

    fn apply(&mut self, message: ServerMessage) -> Dispatch {
        match message {
            ServerMessage::Error { error } => server_error(error),
            _ => Dispatch::Ignored,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::{GamePhase, Role, TablePhase};

    const TABLE_WITH_QUESTION: &str = r#"{
        "event_type": "table",
        "table_id": 2,
        "table_name": "Owls",
        "table_state": "in_question",
        "clients": 3,
        "role": "leader",
        "question": {
            "id": 11,
            "categories": ["history"],
            "question_type": "single_choice",
            "question": "Who?",
            "answers": ["A", "B"],
            "correct_answers": [0],
            "score": 2,
            "timer": 30,
            "time_left": 12.5
        },
        "result": null
    }"#;

    const TABLE_WITHOUT_QUESTION: &str = r#"{
        "event_type": "table",
        "table_id": 2,
        "table_name": "Owls",
        "table_state": "waiting_game_start",
        "clients": 3,
        "role": "observer",
        "question": null,
        "result": null
    }"#;

    #[test]
    fn table_snapshot_replaces_everything() {
        let mut view = TableView::default();
        assert_eq!(dispatch(&mut view, TABLE_WITH_QUESTION), Dispatch::Replaced);
        assert!(view.question().is_some());
        assert_eq!(view.role(), Some(Role::Leader));

        assert_eq!(dispatch(&mut view, TABLE_WITHOUT_QUESTION), Dispatch::Replaced);
        assert!(view.question().is_none());
        assert_eq!(view.role(), Some(Role::Observer));
        assert_eq!(view.phase(), Some(TablePhase::WaitingGameStart));
    }

    #[test]
    fn malformed_and_unknown_input_is_dropped() {
        let mut view = TableView::default();
        dispatch(&mut view, TABLE_WITH_QUESTION);
        let before = view.snapshot().cloned();

        for raw in [
            "not json",
            "{\"event_type\": 5}",
            r#"{"event_type":"table","table_id":"two"}"#,
            r#"{"event_type":"confetti"}"#,
            "",
        ] {
            assert_eq!(dispatch(&mut view, raw), Dispatch::Ignored, "input {raw:?}");
        }
        assert_eq!(view.snapshot().cloned(), before);
    }

    #[test]
    fn errors_notify_every_role_without_touching_state() {
        let raw = r#"{"event_type":"error","error":"table is full"}"#;
        let expected = Dispatch::Notify(vec![Notice::ServerError("table is full".into())]);

        let mut table = TableView::default();
        dispatch(&mut table, TABLE_WITH_QUESTION);
        assert_eq!(dispatch(&mut table, raw), expected);
        assert!(table.question().is_some());

        let mut screen = ScreenView::default();
        assert_eq!(dispatch(&mut screen, raw), expected);

        let mut admin = AdminView;
        assert_eq!(dispatch(&mut admin, raw), expected);
    }

    #[test]
    fn screen_answered_event_only_notifies() {
        let mut screen = ScreenView::default();
        let state = r#"{"event_type":"screen_tables_state","game_state":"in_question",
            "tables":[{"table_id":1,"table_name":"Owls","table_state":"in_question","clients":1}],
            "question":null,"results":null}"#;
        assert_eq!(dispatch(&mut screen, state), Dispatch::Replaced);
        let before = screen.state().clone();

        let answered = r#"{"event_type":"screen_table_answered","table_id":1,"table_name":"Owls","last":false}"#;
        assert_eq!(
            dispatch(&mut screen, answered),
            Dispatch::Notify(vec![Notice::TableAnswered {
                table_id: 1,
                table_name: Some("Owls".into())
            }])
        );

        let last = r#"{"event_type":"screen_table_answered","table_id":2,"last":true}"#;
        assert_eq!(
            dispatch(&mut screen, last),
            Dispatch::Notify(vec![
                Notice::TableAnswered {
                    table_id: 2,
                    table_name: None
                },
                Notice::AllTablesAnswered,
            ])
        );
        assert_eq!(screen.state(), &before);
        assert_eq!(screen.phase(), GamePhase::InQuestion);
    }

    #[test]
    fn roles_ignore_each_others_snapshots() {
        let mut screen = ScreenView::default();
        assert_eq!(dispatch(&mut screen, TABLE_WITH_QUESTION), Dispatch::Ignored);

        let mut admin = AdminView;
        assert_eq!(dispatch(&mut admin, TABLE_WITH_QUESTION), Dispatch::Ignored);

        let mut table = TableView::default();
        let state = r#"{"event_type":"screen_tables_state","game_state":"waiting","tables":[]}"#;
        assert_eq!(dispatch(&mut table, state), Dispatch::Ignored);
        assert!(table.snapshot().is_none());
    }
}
