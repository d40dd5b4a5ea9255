//! Answer selection and submission gating for a table device.
//!
//! [`AnswerSelection`] tracks the leader's in-progress choice for the active
//! question and decides which mutations are legal. Illegal attempts come back
//! as a [`Rejection`] and never reach the network. Every legal toggle is
//! broadcast with `from_set_table_answers` so observers can mirror it live;
//! the final answer goes out once with `from_answer_question`.

use tracing::debug;

use crate::channel::CommandSink;
use crate::protocol::{ClientMessage, Question, QuestionId, Role, TablePhase, TableStatePayload};

/// Why a local mutation was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("only the table leader can do this")]
    NotLeader,

    #[error("no question is open")]
    NoQuestion,

    #[error("answers are already revealed")]
    Revealed,

    #[error("the question has no time allotted")]
    NoTimeAllotted,

    #[error("the answer was already sent")]
    AlreadySubmitted,

    #[error("time is over")]
    TimeOver,

    #[error("not connected to the server")]
    Disconnected,

    #[error("option {index} does not exist (question has {options} options)")]
    InvalidOption { index: usize, options: usize },

    #[error("select at least one option")]
    EmptySelection,

    #[error("the table name can only be set before the game starts")]
    NameLocked,

    #[error("the table name must not be blank")]
    BlankName,
}

/// Where the machine stands for the active question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPhase {
    /// No question is open.
    Inactive,
    /// The selection can still change.
    Selecting,
    /// Not submitted, but no longer interactive (time over, revealed, or no
    /// time allotted).
    Blocked,
    /// The final answer was sent.
    Submitted,
}

/// Inputs that reseed the selection when any of them changes.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SelectionKey {
    question: QuestionId,
    timer_bits: u64,
    table_answers: Option<Vec<usize>>,
}

impl SelectionKey {
    fn of(payload: &TableStatePayload) -> Option<Self> {
        payload.question.as_ref().map(|question| Self {
            question: question.id,
            timer_bits: question.timer.to_bits(),
            table_answers: payload.table.table_answers.clone(),
        })
    }

    fn same_question(&self, other: &Self) -> bool {
        self.question == other.question && self.timer_bits == other.timer_bits
    }
}

/// The leader's selection for the active question.
#[derive(Debug, Clone, Default)]
pub struct AnswerSelection {
    selected: Vec<usize>,
    submitted_locally: bool,
    key: Option<SelectionKey>,
}

impl AnswerSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently selected option indices, in selection order.
    pub fn selected(&self) -> &[usize] {
        &self.selected
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }

    /// Reconcile with the latest table snapshot.
    ///
    /// The selection is reseeded from the broadcast `table_answers` whenever
    /// the question, its duration, or the broadcast selection changes. The
    /// local submitted flag survives only while the question stays the same.
    pub fn sync(&mut self, snapshot: Option<&TableStatePayload>) {
        let key = snapshot.and_then(SelectionKey::of);
        if key == self.key {
            return;
        }

        let same_question = matches!(
            (&self.key, &key),
            (Some(old), Some(new)) if old.same_question(new)
        );
        if !same_question {
            self.submitted_locally = false;
        }

        self.selected = key
            .as_ref()
            .and_then(|k| k.table_answers.clone())
            .unwrap_or_default();
        self.key = key;
    }

    /// A new connection epoch opened: forget local-only progress and wait for
    /// the server's snapshot.
    pub fn on_new_epoch(&mut self) {
        self.submitted_locally = false;
        self.key = None;
    }

    /// `true` once the answer was sent, locally or as reported by the server.
    pub fn is_submitted(&self, snapshot: Option<&TableStatePayload>) -> bool {
        self.submitted_locally || snapshot.is_some_and(|s| s.table.answered)
    }

    /// Lifecycle phase, independent of role.
    pub fn phase(&self, snapshot: Option<&TableStatePayload>, time_over: bool) -> SelectionPhase {
        let Some((payload, question)) = active_question(snapshot) else {
            return SelectionPhase::Inactive;
        };
        if payload.table.table_state != TablePhase::InQuestion
            && payload.table.table_state != TablePhase::InAnswers
        {
            return SelectionPhase::Inactive;
        }
        if self.is_submitted(snapshot) {
            SelectionPhase::Submitted
        } else if time_over
            || payload.table.table_state == TablePhase::InAnswers
            || question.timer <= 0.0
        {
            SelectionPhase::Blocked
        } else {
            SelectionPhase::Selecting
        }
    }

    /// Toggle option `index` and broadcast the new selection.
    ///
    /// Single choice replaces the selection; multiple choice adds or removes
    /// the option.
    pub fn select<S>(
        &mut self,
        snapshot: Option<&TableStatePayload>,
        time_over: bool,
        index: usize,
        sink: &S,
    ) -> Result<&[usize], Rejection>
    where
        S: CommandSink + ?Sized,
    {
        let question = gate(self, snapshot, time_over, sink)?;
        let options = question.answers.len();
        if index >= options {
            return Err(Rejection::InvalidOption { index, options });
        }

        if question.is_multiple() {
            if let Some(pos) = self.selected.iter().position(|&i| i == index) {
                self.selected.remove(pos);
            } else {
                self.selected.push(index);
            }
        } else {
            self.selected = vec![index];
        }

        debug!(question = question.id, selected = ?self.selected, "selection changed");
        sink.send(ClientMessage::SetTableAnswers {
            table_answers: self.selected.clone(),
        });
        Ok(&self.selected)
    }

    /// Send the current selection as the table's final answer.
    pub fn submit<S>(
        &mut self,
        snapshot: Option<&TableStatePayload>,
        time_over: bool,
        sink: &S,
    ) -> Result<(), Rejection>
    where
        S: CommandSink + ?Sized,
    {
        let question = gate(self, snapshot, time_over, sink)?;
        if self.selected.is_empty() {
            return Err(Rejection::EmptySelection);
        }

        debug!(question = question.id, selected = ?self.selected, "submitting answer");
        sink.send(ClientMessage::AnswerQuestion {
            table_answers: self.selected.clone(),
        });
        self.submitted_locally = true;
        Ok(())
    }
}

fn active_question(
    snapshot: Option<&TableStatePayload>,
) -> Option<(&TableStatePayload, &Question)> {
    let payload = snapshot?;
    payload.question.as_ref().map(|q| (payload, q))
}

/// Shared gate for select and submit. Checks run from the most to the least
/// fundamental reason so the caller sees the most useful one.
fn gate<'a, S>(
    selection: &AnswerSelection,
    snapshot: Option<&'a TableStatePayload>,
    time_over: bool,
    sink: &S,
) -> Result<&'a Question, Rejection>
where
    S: CommandSink + ?Sized,
{
    let payload = snapshot.ok_or(Rejection::NoQuestion)?;
    if payload.role != Role::Leader {
        return Err(Rejection::NotLeader);
    }
    let question = payload.question.as_ref().ok_or(Rejection::NoQuestion)?;
    match payload.table.table_state {
        TablePhase::InQuestion => {}
        TablePhase::InAnswers => return Err(Rejection::Revealed),
        _ => return Err(Rejection::NoQuestion),
    }
    if question.timer <= 0.0 {
        return Err(Rejection::NoTimeAllotted);
    }
    if selection.is_submitted(snapshot) {
        return Err(Rejection::AlreadySubmitted);
    }
    if time_over {
        return Err(Rejection::TimeOver);
    }
    if !sink.is_open() {
        return Err(Rejection::Disconnected);
    }
    Ok(question)
}

/// Validate and send a table name. Returns the trimmed name that was sent.
///
/// Only the leader may name the table, and only while it waits for the game
/// to start.
pub fn request_table_name<S>(
    snapshot: Option<&TableStatePayload>,
    name: &str,
    sink: &S,
) -> Result<String, Rejection>
where
    S: CommandSink + ?Sized,
{
    let payload = snapshot.ok_or(Rejection::NameLocked)?;
    if payload.role != Role::Leader {
        return Err(Rejection::NotLeader);
    }
    if payload.table.table_state != TablePhase::WaitingGameStart {
        return Err(Rejection::NameLocked);
    }
    let name = name.trim();
    if name.is_empty() {
        return Err(Rejection::BlankName);
    }
    if !sink.is_open() {
        return Err(Rejection::Disconnected);
    }

    sink.send(ClientMessage::SetTableName {
        table_name: name.to_owned(),
    });
    Ok(name.to_owned())
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
    use std::cell::RefCell;

    use super::*;
    use crate::protocol::{QuestionType, TableData};

    #[derive(Default)]
    struct RecordingSink {
        open: bool,
        sent: RefCell<Vec<ClientMessage>>,
    }

    impl RecordingSink {
        fn open() -> Self {
            Self {
                open: true,
                sent: RefCell::default(),
            }
        }

        fn sent(&self) -> Vec<ClientMessage> {
            self.sent.borrow().clone()
        }
    }

    impl CommandSink for RecordingSink {
        fn send(&self, message: ClientMessage) -> bool {
            if self.open {
                self.sent.borrow_mut().push(message);
            }
            self.open
        }

        fn is_open(&self) -> bool {
            self.open
        }
    }

    fn question(id: QuestionId, question_type: QuestionType, options: usize) -> Question {
        Question {
            id,
            categories: vec!["general".into()],
            question_type,
            question: format!("Question {id}"),
            images: vec![],
            answer_images: vec![],
            answers: (0..options).map(|i| format!("Option {i}")).collect(),
            correct_answers: vec![0],
            score: Some(1.0),
            timer: 10.0,
            time_left: Some(10.0),
        }
    }

    fn snapshot(role: Role, state: TablePhase, question: Option<Question>) -> TableStatePayload {
        TableStatePayload {
            table: TableData {
                table_id: 1,
                table_name: Some("Owls".into()),
                table_state: state,
                clients: 2,
                table_answers: None,
                answered: false,
            },
            role,
            question,
            result: None,
        }
    }

    fn leader_in_question(question_type: QuestionType) -> TableStatePayload {
        snapshot(
            Role::Leader,
            TablePhase::InQuestion,
            Some(question(7, question_type, 3)),
        )
    }

    #[test]
    fn multiple_choice_toggle_returns_to_empty() {
        let sink = RecordingSink::open();
        let snap = leader_in_question(QuestionType::MultipleChoice);
        let mut selection = AnswerSelection::new();
        selection.sync(Some(&snap));

        assert_eq!(selection.select(Some(&snap), false, 1, &sink).unwrap(), &[1]);
        assert!(selection.select(Some(&snap), false, 1, &sink).unwrap().is_empty());
        assert_eq!(
            sink.sent(),
            vec![
                ClientMessage::SetTableAnswers {
                    table_answers: vec![1]
                },
                ClientMessage::SetTableAnswers {
                    table_answers: vec![]
                },
            ]
        );
    }

    #[test]
    fn multiple_choice_keeps_selection_order() {
        let sink = RecordingSink::open();
        let snap = leader_in_question(QuestionType::MultipleChoice);
        let mut selection = AnswerSelection::new();

        selection.select(Some(&snap), false, 2, &sink).unwrap();
        selection.select(Some(&snap), false, 0, &sink).unwrap();
        assert_eq!(selection.selected(), &[2, 0]);
    }

    #[test]
    fn single_choice_replaces_selection() {
        let sink = RecordingSink::open();
        let snap = leader_in_question(QuestionType::SingleChoice);
        let mut selection = AnswerSelection::new();

        selection.select(Some(&snap), false, 0, &sink).unwrap();
        assert_eq!(selection.select(Some(&snap), false, 1, &sink).unwrap(), &[1]);
    }

    #[test]
    fn observer_is_rejected_in_every_phase() {
        let sink = RecordingSink::open();
        let mut selection = AnswerSelection::new();
        for state in [
            TablePhase::WaitingLeader,
            TablePhase::WaitingGameStart,
            TablePhase::InQuestion,
            TablePhase::InAnswers,
            TablePhase::InResults,
        ] {
            let snap = snapshot(
                Role::Observer,
                state,
                Some(question(1, QuestionType::SingleChoice, 2)),
            );
            assert_eq!(
                selection.select(Some(&snap), false, 0, &sink),
                Err(Rejection::NotLeader)
            );
            assert_eq!(
                selection.submit(Some(&snap), false, &sink),
                Err(Rejection::NotLeader)
            );
        }
        assert!(selection.selected().is_empty());
        assert!(sink.sent().is_empty());
    }

    #[test]
    fn time_over_blocks_without_submitting() {
        let sink = RecordingSink::open();
        let snap = leader_in_question(QuestionType::SingleChoice);
        let mut selection = AnswerSelection::new();
        selection.select(Some(&snap), false, 1, &sink).unwrap();

        assert_eq!(
            selection.select(Some(&snap), true, 0, &sink),
            Err(Rejection::TimeOver)
        );
        assert_eq!(
            selection.submit(Some(&snap), true, &sink),
            Err(Rejection::TimeOver)
        );
        assert_eq!(selection.selected(), &[1]);
        assert_eq!(selection.phase(Some(&snap), true), SelectionPhase::Blocked);
        assert_eq!(sink.sent().len(), 1);
    }

    #[test]
    fn reveal_and_zero_duration_block_selection() {
        let sink = RecordingSink::open();
        let mut selection = AnswerSelection::new();

        let revealed = snapshot(
            Role::Leader,
            TablePhase::InAnswers,
            Some(question(1, QuestionType::SingleChoice, 2)),
        );
        assert_eq!(
            selection.select(Some(&revealed), false, 0, &sink),
            Err(Rejection::Revealed)
        );

        let mut untimed = leader_in_question(QuestionType::SingleChoice);
        if let Some(q) = untimed.question.as_mut() {
            q.timer = 0.0;
        }
        assert_eq!(
            selection.select(Some(&untimed), false, 0, &sink),
            Err(Rejection::NoTimeAllotted)
        );
        assert!(sink.sent().is_empty());
    }

    #[test]
    fn submit_requires_a_selection_and_happens_once() {
        let sink = RecordingSink::open();
        let snap = leader_in_question(QuestionType::SingleChoice);
        let mut selection = AnswerSelection::new();
        selection.sync(Some(&snap));

        assert_eq!(
            selection.submit(Some(&snap), false, &sink),
            Err(Rejection::EmptySelection)
        );

        selection.select(Some(&snap), false, 2, &sink).unwrap();
        selection.submit(Some(&snap), false, &sink).unwrap();
        assert_eq!(
            selection.submit(Some(&snap), false, &sink),
            Err(Rejection::AlreadySubmitted)
        );
        assert_eq!(
            selection.select(Some(&snap), false, 0, &sink),
            Err(Rejection::AlreadySubmitted)
        );
        assert_eq!(selection.phase(Some(&snap), false), SelectionPhase::Submitted);
        assert_eq!(
            sink.sent().last(),
            Some(&ClientMessage::AnswerQuestion {
                table_answers: vec![2]
            })
        );
    }

    #[test]
    fn server_reported_answer_counts_as_submitted() {
        let sink = RecordingSink::open();
        let mut snap = leader_in_question(QuestionType::SingleChoice);
        snap.table.answered = true;
        let mut selection = AnswerSelection::new();
        selection.sync(Some(&snap));

        assert_eq!(
            selection.select(Some(&snap), false, 0, &sink),
            Err(Rejection::AlreadySubmitted)
        );
    }

    #[test]
    fn disconnected_sink_rejects_and_keeps_state() {
        let sink = RecordingSink::default();
        let snap = leader_in_question(QuestionType::SingleChoice);
        let mut selection = AnswerSelection::new();

        assert_eq!(
            selection.select(Some(&snap), false, 0, &sink),
            Err(Rejection::Disconnected)
        );
        assert!(selection.selected().is_empty());
    }

    #[test]
    fn out_of_range_option_is_rejected() {
        let sink = RecordingSink::open();
        let snap = leader_in_question(QuestionType::SingleChoice);
        let mut selection = AnswerSelection::new();

        assert_eq!(
            selection.select(Some(&snap), false, 3, &sink),
            Err(Rejection::InvalidOption {
                index: 3,
                options: 3
            })
        );
    }

    #[test]
    fn sync_reseeds_from_broadcast_selection() {
        let mut snap = snapshot(
            Role::Observer,
            TablePhase::InQuestion,
            Some(question(3, QuestionType::MultipleChoice, 4)),
        );
        snap.table.table_answers = Some(vec![0, 3]);
        let mut selection = AnswerSelection::new();
        selection.sync(Some(&snap));
        assert_eq!(selection.selected(), &[0, 3]);

        snap.table.table_answers = Some(vec![3]);
        selection.sync(Some(&snap));
        assert_eq!(selection.selected(), &[3]);

        snap.question = None;
        selection.sync(Some(&snap));
        assert!(selection.selected().is_empty());
    }

    #[test]
    fn new_question_clears_local_submission() {
        let sink = RecordingSink::open();
        let mut snap = leader_in_question(QuestionType::SingleChoice);
        let mut selection = AnswerSelection::new();
        selection.sync(Some(&snap));
        selection.select(Some(&snap), false, 0, &sink).unwrap();
        selection.submit(Some(&snap), false, &sink).unwrap();

        // Echo of the submitted selection: still the same question.
        snap.table.table_answers = Some(vec![0]);
        selection.sync(Some(&snap));
        assert!(selection.is_submitted(Some(&snap)));

        snap.question = Some(question(8, QuestionType::SingleChoice, 2));
        snap.table.table_answers = None;
        selection.sync(Some(&snap));
        assert!(!selection.is_submitted(Some(&snap)));
        assert_eq!(selection.phase(Some(&snap), false), SelectionPhase::Selecting);
    }

    #[test]
    fn table_name_is_trimmed_and_gated() {
        let sink = RecordingSink::open();
        let lobby = snapshot(Role::Leader, TablePhase::WaitingGameStart, None);

        assert_eq!(
            request_table_name(Some(&lobby), "  Owls  ", &sink).unwrap(),
            "Owls"
        );
        assert_eq!(
            request_table_name(Some(&lobby), "   ", &sink),
            Err(Rejection::BlankName)
        );

        let started = snapshot(Role::Leader, TablePhase::InQuestion, None);
        assert_eq!(
            request_table_name(Some(&started), "Owls", &sink),
            Err(Rejection::NameLocked)
        );

        let observer = snapshot(Role::Observer, TablePhase::WaitingGameStart, None);
        assert_eq!(
            request_table_name(Some(&observer), "Owls", &sink),
            Err(Rejection::NotLeader)
        );

        assert_eq!(
            sink.sent(),
            vec![ClientMessage::SetTableName {
                table_name: "Owls".into()
            }]
        );
    }
}
