//! Wire-compatible protocol types for the quiz game server.
//!
//! Every message is a JSON object discriminated by a string `event_type`
//! field. Inbound messages decode into [`ServerMessage`]; any `event_type` this
//! client does not know becomes [`ServerMessage::Unknown`] so newer servers
//! never break older clients. Outbound commands are [`ClientMessage`]s.
//!
//! Maps keyed by question id travel as JSON objects, so their keys are kept
//! as strings; use the accessor helpers to look entries up by [`QuestionId`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ── Type aliases ────────────────────────────────────────────────────

/// Identifier of a table (one physical team unit).
pub type TableId = u32;

/// Identifier of a question in the server's question bank.
pub type QuestionId = u64;

/// Category tag attached to questions and used for per-category scoring.
pub type Category = String;

// ── Enums ───────────────────────────────────────────────────────────

/// Phase of a single table, as reported in `table_state`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TablePhase {
    /// No device at the table holds the leader role yet.
    WaitingLeader,
    /// A leader is present; the table may pick a name while the game has not started.
    WaitingGameStart,
    /// A question is open for answers.
    InQuestion,
    /// Correct answers are being revealed.
    InAnswers,
    /// Final results are shown.
    InResults,
}

impl TablePhase {
    /// Returns `true` once the game has moved past the lobby.
    pub fn is_started(self) -> bool {
        matches!(self, Self::InQuestion | Self::InAnswers | Self::InResults)
    }
}

/// Aggregate phase of the whole game, as reported to the screen in `game_state`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Lobby: tables are joining and naming themselves.
    #[default]
    Waiting,
    /// A question is open for answers.
    InQuestion,
    /// Correct answers are being revealed.
    InAnswers,
    /// Final leaderboard.
    InResults,
}

/// Role of one device at a table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The single device allowed to select and submit on behalf of the table.
    Leader,
    /// A read-only mirror of the leader's choices.
    Observer,
}

/// How many options a question accepts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// Exactly one option may be selected.
    SingleChoice,
    /// Any number of options may be selected.
    MultipleChoice,
}

// ── Structs ─────────────────────────────────────────────────────────

/// A quiz question as pushed by the server.
///
/// `correct_answers` is expected to be a subset of the option indices (and a
/// single index for [`QuestionType::SingleChoice`]), but the server is not
/// trusted on this: out-of-range indices are simply never matched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: QuestionId,
    #[serde(default)]
    pub categories: Vec<Category>,
    pub question_type: QuestionType,
    /// Prompt text.
    pub question: String,
    /// Images shown while the question is open.
    #[serde(default)]
    pub images: Vec<String>,
    /// Images shown once the answers are revealed.
    #[serde(default)]
    pub answer_images: Vec<String>,
    /// Answer option texts, in display order.
    pub answers: Vec<String>,
    #[serde(default)]
    pub correct_answers: Vec<usize>,
    /// Points awarded for a correct answer.
    #[serde(default)]
    pub score: Option<f64>,
    /// Total allotted duration in seconds.
    pub timer: f64,
    /// Remaining seconds at the moment the snapshot was taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_left: Option<f64>,
}

impl Question {
    /// Returns `true` for [`QuestionType::MultipleChoice`].
    pub fn is_multiple(&self) -> bool {
        self.question_type == QuestionType::MultipleChoice
    }

    /// Returns `true` if `index` is one of the correct answers.
    pub fn is_correct(&self, index: usize) -> bool {
        self.correct_answers.contains(&index)
    }

    /// Option texts for the given indices, skipping indices out of range.
    pub fn answer_texts(&self, indices: &[usize]) -> Vec<&str> {
        indices
            .iter()
            .filter_map(|&i| self.answers.get(i).map(String::as_str))
            .collect()
    }
}

/// Snapshot of one table, as listed to the screen and embedded in table events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableData {
    pub table_id: TableId,
    #[serde(default)]
    pub table_name: Option<String>,
    pub table_state: TablePhase,
    /// Number of devices currently connected to the table.
    #[serde(default)]
    pub clients: u32,
    /// The leader's current, not yet submitted, selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_answers: Option<Vec<usize>>,
    /// `true` once the table submitted its final answer for the active question.
    #[serde(default)]
    pub answered: bool,
}

impl TableData {
    /// Returns the table name if one was set and is not blank.
    pub fn display_name(&self) -> Option<&str> {
        self.table_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// Aggregate score of one table, used on the screen leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableResult {
    pub table_id: TableId,
    #[serde(default)]
    pub table_name: Option<String>,
    pub score: f64,
    /// Score per category.
    #[serde(default)]
    pub categories: BTreeMap<Category, f64>,
    /// Selected indices keyed by question id.
    #[serde(default)]
    pub answers: BTreeMap<String, Vec<usize>>,
}

impl TableResult {
    /// Indices the table selected for `question`, if it answered.
    pub fn answers_for(&self, question: QuestionId) -> Option<&[usize]> {
        self.answers.get(&question.to_string()).map(Vec::as_slice)
    }
}

/// Leaderboard pushed to the screen at the end of the game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ScreenResults {
    /// Tables ranked best first.
    #[serde(rename = "winers", alias = "winners", default)]
    pub winners: Vec<TableResult>,
    /// Best table per category; `None` when nobody qualified.
    #[serde(default)]
    pub category_winners: BTreeMap<Category, Option<TableResult>>,
}

/// Detailed result pushed to a single table at the end of the game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableOutcome {
    pub score: f64,
    /// Points earned per question, keyed by question id.
    #[serde(default)]
    pub question_score: BTreeMap<String, f64>,
    #[serde(default)]
    pub categories: BTreeMap<Category, f64>,
    /// Selected indices keyed by question id.
    #[serde(default)]
    pub answers: BTreeMap<String, Vec<usize>>,
    /// Every question of the game, in order.
    #[serde(default)]
    pub questions: Vec<Question>,
    /// Overall place, 1-based.
    #[serde(default)]
    pub place: Option<u32>,
    #[serde(default)]
    pub place_categories: Option<BTreeMap<Category, Option<u32>>>,
    /// Number of ranked tables.
    #[serde(default)]
    pub place_amount: u32,
}

impl TableOutcome {
    /// Indices the table selected for `question`.
    pub fn answers_for(&self, question: QuestionId) -> &[usize] {
        self.answers
            .get(&question.to_string())
            .map_or(&[], Vec::as_slice)
    }

    /// Points the table earned for `question`.
    pub fn score_for(&self, question: QuestionId) -> f64 {
        self.question_score
            .get(&question.to_string())
            .copied()
            .unwrap_or(0.0)
    }

    /// Place within `category`, when ranked.
    pub fn place_in(&self, category: &str) -> Option<u32> {
        self.place_categories
            .as_ref()
            .and_then(|places| places.get(category).copied().flatten())
    }
}

// ── Payload structs ─────────────────────────────────────────────────

/// Payload of the `table` event: the full state of the receiving table.
/// Boxed in [`ServerMessage`] to reduce enum size.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableStatePayload {
    #[serde(flatten)]
    pub table: TableData,
    /// Role of the receiving device.
    pub role: Role,
    #[serde(default)]
    pub question: Option<Question>,
    #[serde(default)]
    pub result: Option<TableOutcome>,
}

/// Payload of the `screen_tables_state` event: the full aggregate game state.
/// Boxed in [`ServerMessage`] to reduce enum size.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ScreenStatePayload {
    pub game_state: GamePhase,
    #[serde(default)]
    pub tables: Vec<TableData>,
    #[serde(default)]
    pub question: Option<Question>,
    #[serde(default)]
    pub results: Option<ScreenResults>,
}

// ── Messages ────────────────────────────────────────────────────────

/// Commands sent from a client to the server.
///
/// Table devices send the `from_set_*` / `from_answer_*` commands; the admin
/// console sends the `from_admin_*` commands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event_type")]
pub enum ClientMessage {
    /// Name (or rename) the table.
    #[serde(rename = "from_set_table_name")]
    SetTableName { table_name: String },
    /// Broadcast the leader's in-progress selection to the table's observers.
    #[serde(rename = "from_set_table_answers")]
    SetTableAnswers { table_answers: Vec<usize> },
    /// Submit the table's final answer for the active question.
    #[serde(rename = "from_answer_question")]
    AnswerQuestion { table_answers: Vec<usize> },
    /// Change the number of tables.
    #[serde(rename = "from_admin_resize_tables")]
    ResizeTables { count: u32 },
    /// Hand the leader role at a table to another device.
    #[serde(rename = "from_admin_change_leader")]
    ChangeLeader { table_id: TableId },
    #[serde(rename = "from_admin_start_game")]
    StartGame,
    #[serde(rename = "from_admin_show_answers")]
    ShowAnswers,
    #[serde(rename = "from_admin_previous_question")]
    PreviousQuestion,
    #[serde(rename = "from_admin_next_question")]
    NextQuestion,
    #[serde(rename = "from_admin_show_results")]
    ShowResults,
    #[serde(rename = "from_admin_reset_game")]
    ResetGame,
    /// Advance to whatever comes next (question, reveal, or results).
    #[serde(rename = "from_admin_next_step")]
    NextStep,
}

/// Messages sent from the server to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event_type")]
pub enum ServerMessage {
    /// Full state of the receiving table (boxed to reduce enum size).
    #[serde(rename = "table")]
    Table(Box<TableStatePayload>),
    /// Full aggregate state for the screen (boxed to reduce enum size).
    #[serde(rename = "screen_tables_state")]
    ScreenTablesState(Box<ScreenStatePayload>),
    /// A table submitted its answer.
    #[serde(rename = "screen_table_answered")]
    ScreenTableAnswered {
        table_id: TableId,
        #[serde(default)]
        table_name: Option<String>,
        /// `true` when this was the last table still to answer.
        #[serde(default)]
        last: bool,
    },
    /// Domain error reported by the server.
    #[serde(rename = "error")]
    Error { error: String },
    /// Any `event_type` this client does not recognize.
    #[serde(other, rename = "unknown")]
    Unknown,
}

impl ServerMessage {
    /// The `event_type` discriminator of this message.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Table(_) => "table",
            Self::ScreenTablesState(_) => "screen_tables_state",
            Self::ScreenTableAnswered { .. } => "screen_table_answered",
            Self::Error { .. } => "error",
            Self::Unknown => "unknown",
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

    #[test]
    fn unknown_event_type_decodes_to_unknown() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"event_type":"confetti","pieces":600}"#).unwrap();
        assert_eq!(msg, ServerMessage::Unknown);
    }

    #[test]
    fn table_event_with_flattened_table_fields() {
        let json = r#"{
            "event_type": "table",
            "table_id": 3,
            "table_name": null,
            "table_state": "in_question",
            "clients": 2,
            "table_answers": [1],
            "role": "observer",
            "question": null,
            "result": null
        }"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        let ServerMessage::Table(payload) = msg else {
            panic!("expected table event");
        };
        assert_eq!(payload.table.table_id, 3);
        assert_eq!(payload.table.table_state, TablePhase::InQuestion);
        assert_eq!(payload.table.table_answers.as_deref(), Some(&[1][..]));
        assert!(!payload.table.answered);
        assert_eq!(payload.role, Role::Observer);
        assert!(payload.question.is_none());
    }

    #[test]
    fn admin_commands_carry_their_event_type() {
        let json = serde_json::to_value(ClientMessage::NextStep).unwrap();
        assert_eq!(json, serde_json::json!({"event_type": "from_admin_next_step"}));

        let json = serde_json::to_value(ClientMessage::ResizeTables { count: 12 }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event_type": "from_admin_resize_tables", "count": 12})
        );
    }

    #[test]
    fn screen_results_read_the_misspelled_winners_key() {
        let json = r#"{"winers":[{"table_id":1,"table_name":"Owls","score":4.5,
            "categories":{"history":4.5},"answers":{"7":[0,2]}}],
            "category_winners":{"history":null}}"#;
        let results: ScreenResults = serde_json::from_str(json).unwrap();
        assert_eq!(results.winners.len(), 1);
        assert_eq!(results.winners[0].answers_for(7), Some(&[0, 2][..]));
        assert_eq!(results.category_winners.get("history"), Some(&None));
    }

    #[test]
    fn answer_texts_skip_out_of_range_indices() {
        let question = Question {
            id: 1,
            categories: vec![],
            question_type: QuestionType::SingleChoice,
            question: "?".into(),
            images: vec![],
            answer_images: vec![],
            answers: vec!["A".into(), "B".into()],
            correct_answers: vec![1, 9],
            score: None,
            timer: 10.0,
            time_left: None,
        };
        assert_eq!(question.answer_texts(&question.correct_answers), vec!["B"]);
    }

    #[test]
    fn display_name_ignores_blank_names() {
        let mut table = TableData {
            table_id: 1,
            table_name: Some("   ".into()),
            table_state: TablePhase::WaitingGameStart,
            clients: 1,
            table_answers: None,
            answered: false,
        };
        assert_eq!(table.display_name(), None);
        table.table_name = Some(" Owls ".into());
        assert_eq!(table.display_name(), Some("Owls"));
    }
}
