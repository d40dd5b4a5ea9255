//! Role-scoped state and its read-only projections for presentation.
//!
//! Each role owns exactly one view: [`TableView`] for a table device,
//! [`ScreenView`] for the public display and [`AdminView`] for the console.
//! Views hold only the last full snapshot the server pushed; everything a UI
//! needs (which panel to show, option marks, lobby colors, the leaderboard) is
//! derived on demand from that snapshot plus the local selection and
//! countdown.

use crate::countdown::{Countdown, CountdownPhase};
use crate::protocol::{
    GamePhase, Question, QuestionId, Role, ScreenResults, ScreenStatePayload, TableData,
    TableId, TableOutcome, TablePhase, TableResult, TableStatePayload,
};
use crate::selection::AnswerSelection;

// ── Shared projections ──────────────────────────────────────────────

/// How an option is marked once answers are revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionMark {
    /// Not revealed yet, or neither correct nor chosen.
    Neutral,
    /// One of the correct answers.
    Correct,
    /// Chosen by the table but not correct.
    Incorrect,
}

/// Mark for option `index` given the table's `selected` options.
pub fn reveal_mark(question: &Question, selected: &[usize], index: usize) -> OptionMark {
    if question.is_correct(index) {
        OptionMark::Correct
    } else if selected.contains(&index) {
        OptionMark::Incorrect
    } else {
        OptionMark::Neutral
    }
}

/// Marks for every option of `question`, in display order.
pub fn reveal_marks(question: &Question, selected: &[usize]) -> Vec<OptionMark> {
    (0..question.answers.len())
        .map(|index| reveal_mark(question, selected, index))
        .collect()
}

/// Countdown as displayed: seconds left, progress, and the danger flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountdownView {
    pub remaining: f64,
    pub total: f64,
    /// Remaining share of the total, 0–100.
    pub percent: f64,
    /// `true` in the last tenth of the time.
    pub critical: bool,
}

impl CountdownView {
    fn of(countdown: &Countdown) -> Self {
        Self {
            remaining: countdown.current(),
            total: countdown.total(),
            percent: countdown.percent(),
            critical: countdown.is_critical(),
        }
    }
}

/// Which hint to show above the options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionHint {
    /// "Choose one answer".
    SingleChoice,
    /// "Choose one or more answers".
    MultipleChoice,
}

fn table_label(table_id: TableId, name: Option<&str>) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.to_owned(),
        None => format!("Table {table_id}"),
    }
}

// ── Table ───────────────────────────────────────────────────────────

/// Which sub-view a table device shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TablePanel {
    /// No snapshot received yet.
    Connecting,
    /// Nobody holds the leader role yet.
    WaitingLeader,
    /// Name entry while the game has not started.
    Join,
    /// A question is open or being revealed.
    Question,
    /// Final results.
    Result,
}

/// State of one table device: the last `table` snapshot, nothing else.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableView {
    snapshot: Option<TableStatePayload>,
}

impl TableView {
    pub fn snapshot(&self) -> Option<&TableStatePayload> {
        self.snapshot.as_ref()
    }

    pub fn table(&self) -> Option<&TableData> {
        self.snapshot.as_ref().map(|s| &s.table)
    }

    pub fn role(&self) -> Option<Role> {
        self.snapshot.as_ref().map(|s| s.role)
    }

    pub fn is_leader(&self) -> bool {
        self.role() == Some(Role::Leader)
    }

    pub fn phase(&self) -> Option<TablePhase> {
        self.table().map(|t| t.table_state)
    }

    pub fn question(&self) -> Option<&Question> {
        self.snapshot.as_ref().and_then(|s| s.question.as_ref())
    }

    pub fn result(&self) -> Option<&TableOutcome> {
        self.snapshot.as_ref().and_then(|s| s.result.as_ref())
    }

    /// Which sub-view to show for the current phase.
    pub fn panel(&self) -> TablePanel {
        match self.phase() {
            None => TablePanel::Connecting,
            Some(TablePhase::WaitingLeader) => TablePanel::WaitingLeader,
            Some(TablePhase::WaitingGameStart) => TablePanel::Join,
            Some(TablePhase::InQuestion | TablePhase::InAnswers) => TablePanel::Question,
            Some(TablePhase::InResults) => TablePanel::Result,
        }
    }

    /// Name entry projection, while the table waits for the game to start.
    pub fn join_panel(&self) -> Option<JoinPanel> {
        let snapshot = self.snapshot.as_ref()?;
        if snapshot.table.table_state != TablePhase::WaitingGameStart {
            return None;
        }
        Some(JoinPanel {
            table_id: snapshot.table.table_id,
            table_name: snapshot.table.display_name().map(str::to_owned),
            clients: snapshot.table.clients,
            can_edit_name: snapshot.role == Role::Leader,
        })
    }

    /// Question projection combining the snapshot with local selection and
    /// countdown state.
    pub fn question_panel(
        &self,
        selection: &AnswerSelection,
        countdown: &Countdown,
        connected: bool,
    ) -> Option<QuestionPanel> {
        let snapshot = self.snapshot.as_ref()?;
        let question = snapshot.question.as_ref()?;
        let phase = snapshot.table.table_state;
        if !matches!(phase, TablePhase::InQuestion | TablePhase::InAnswers) {
            return None;
        }

        let leader = snapshot.role == Role::Leader;
        let revealed = phase == TablePhase::InAnswers;
        let submitted = selection.is_submitted(Some(snapshot));
        let time_over = countdown.is_expired();
        let blocked = time_over || submitted || revealed || question.timer <= 0.0;
        let interactive = leader && !blocked && connected;

        let options = question
            .answers
            .iter()
            .enumerate()
            .map(|(index, text)| OptionView {
                index,
                text: text.clone(),
                checked: selection.is_selected(index),
                mark: if revealed {
                    reveal_mark(question, selection.selected(), index)
                } else {
                    OptionMark::Neutral
                },
                enabled: interactive,
            })
            .collect();

        let mut statuses = Vec::new();
        if time_over && !submitted {
            statuses.push(QuestionStatus::TimeOver);
        }
        if submitted {
            statuses.push(QuestionStatus::AnswerSent);
        }
        if !leader {
            statuses.push(QuestionStatus::ObservingLeader);
        }
        if revealed {
            statuses.push(QuestionStatus::AnswersRevealed);
        }

        let show_countdown = phase == TablePhase::InQuestion
            && !submitted
            && countdown.phase() != CountdownPhase::Idle;

        Some(QuestionPanel {
            question_id: question.id,
            prompt: question.question.clone(),
            categories: question.categories.clone(),
            images: if revealed {
                question.answer_images.clone()
            } else {
                question.images.clone()
            },
            hint: (!revealed).then(|| {
                if question.is_multiple() {
                    SelectionHint::MultipleChoice
                } else {
                    SelectionHint::SingleChoice
                }
            }),
            options,
            can_submit: interactive && !selection.selected().is_empty(),
            statuses,
            countdown: show_countdown.then(|| CountdownView::of(countdown)),
        })
    }

    /// Result projection, once the game reached its results.
    pub fn result_view(&self) -> Option<ResultView> {
        if self.phase() != Some(TablePhase::InResults) {
            return None;
        }
        self.result().map(ResultView::from_outcome)
    }

    pub(crate) fn replace(&mut self, snapshot: TableStatePayload) {
        self.snapshot = Some(snapshot);
    }
}

/// Name entry sub-view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPanel {
    pub table_id: TableId,
    pub table_name: Option<String>,
    pub clients: u32,
    /// Only the leader may name the table.
    pub can_edit_name: bool,
}

/// One answer option as shown on a table device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionView {
    pub index: usize,
    pub text: String,
    /// Part of the current (or broadcast) selection.
    pub checked: bool,
    pub mark: OptionMark,
    /// The local user may toggle it.
    pub enabled: bool,
}

/// Status lines under a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionStatus {
    TimeOver,
    AnswerSent,
    /// This device is an observer mirroring the leader.
    ObservingLeader,
    AnswersRevealed,
}

/// Question sub-view of a table device.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionPanel {
    pub question_id: QuestionId,
    pub prompt: String,
    pub categories: Vec<String>,
    /// Question images before the reveal, answer images after it.
    pub images: Vec<String>,
    /// Shown only while the question is open.
    pub hint: Option<SelectionHint>,
    pub options: Vec<OptionView>,
    pub can_submit: bool,
    pub statuses: Vec<QuestionStatus>,
    /// Shown only while the question is open and not yet answered.
    pub countdown: Option<CountdownView>,
}

/// Per-question row of the result view.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionResult {
    pub question_id: QuestionId,
    pub prompt: String,
    pub selected: Vec<String>,
    pub correct: Vec<String>,
    pub points: f64,
    /// The question's score, or its number of correct answers when unscored.
    pub max_points: f64,
}

/// Score and place within one category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryResult {
    pub category: String,
    pub score: f64,
    pub place: Option<u32>,
}

/// Final results of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultView {
    pub score: f64,
    pub place: Option<u32>,
    /// Number of ranked tables.
    pub place_amount: u32,
    pub categories: Vec<CategoryResult>,
    pub questions: Vec<QuestionResult>,
}

impl ResultView {
    pub fn from_outcome(outcome: &TableOutcome) -> Self {
        let categories = outcome
            .categories
            .iter()
            .map(|(category, &score)| CategoryResult {
                category: category.clone(),
                score,
                place: outcome.place_in(category),
            })
            .collect();

        let questions = outcome
            .questions
            .iter()
            .map(|question| {
                let selected = outcome.answers_for(question.id);
                QuestionResult {
                    question_id: question.id,
                    prompt: question.question.clone(),
                    selected: owned(question.answer_texts(selected)),
                    correct: owned(question.answer_texts(&question.correct_answers)),
                    points: outcome.score_for(question.id),
                    max_points: question
                        .score
                        .unwrap_or(question.correct_answers.len() as f64),
                }
            })
            .collect();

        Self {
            score: outcome.score,
            place: outcome.place,
            place_amount: outcome.place_amount,
            categories,
            questions,
        }
    }
}

fn owned(texts: Vec<&str>) -> Vec<String> {
    texts.into_iter().map(str::to_owned).collect()
}

// ── Screen ──────────────────────────────────────────────────────────

/// Which sub-view the public display shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenPanel {
    Lobby,
    Question,
    Leaderboard,
}

/// Readiness color of a table in the lobby roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Readiness {
    /// No leader yet.
    Red,
    /// Leader present, no name chosen.
    Yellow,
    /// Named, or already playing.
    Green,
}

impl Readiness {
    pub fn of(table: &TableData) -> Self {
        match table.table_state {
            TablePhase::WaitingLeader => Self::Red,
            TablePhase::WaitingGameStart if table.display_name().is_none() => Self::Yellow,
            _ => Self::Green,
        }
    }

    /// Status label shown next to the color.
    pub fn status(self) -> &'static str {
        match self {
            Self::Red => "waiting leader",
            Self::Yellow => "choosing a name",
            Self::Green => "ready",
        }
    }
}

/// One table in the lobby roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyRow {
    pub table_id: TableId,
    pub label: String,
    pub clients: u32,
    pub readiness: Readiness,
}

/// Lobby roster with the `ready/total` counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyView {
    pub rows: Vec<LobbyRow>,
    /// Tables waiting for the game with a name set.
    pub ready: usize,
    pub total: usize,
}

/// One option on the public display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenOption {
    pub index: usize,
    pub text: String,
    /// Highlighted as correct; only ever set once answers are revealed.
    pub correct: bool,
}

/// Question sub-view of the public display.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenQuestionPanel {
    pub question_id: QuestionId,
    pub prompt: String,
    pub categories: Vec<String>,
    pub images: Vec<String>,
    pub options: Vec<ScreenOption>,
    pub revealed: bool,
    /// Tables that submitted their answer.
    pub answered: usize,
    pub total: usize,
    /// Shown while the question is open.
    pub countdown: Option<CountdownView>,
}

/// Podium medal for the first three places.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Medal {
    Gold,
    Silver,
    Bronze,
}

impl Medal {
    fn for_place(place: usize) -> Option<Self> {
        match place {
            1 => Some(Self::Gold),
            2 => Some(Self::Silver),
            3 => Some(Self::Bronze),
            _ => None,
        }
    }
}

/// One ranked table on the leaderboard.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardRow {
    /// 1-based place.
    pub place: usize,
    pub medal: Option<Medal>,
    pub table_id: TableId,
    pub label: String,
    pub score: f64,
    /// Per-category scores, best first.
    pub categories: Vec<(String, f64)>,
}

/// Best table of one category, if any qualified.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryWinner {
    pub category: String,
    pub winner: Option<(TableId, String, f64)>,
}

impl CategoryWinner {
    /// Winner label, or "no winner".
    pub fn label(&self) -> &str {
        self.winner
            .as_ref()
            .map_or("no winner", |(_, label, _)| label.as_str())
    }
}

/// Final leaderboard of the public display.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaderboard {
    pub winners: Vec<LeaderboardRow>,
    pub category_winners: Vec<CategoryWinner>,
}

impl Leaderboard {
    pub fn from_results(results: &ScreenResults) -> Self {
        let winners = results
            .winners
            .iter()
            .enumerate()
            .map(|(i, result)| {
                let place = i + 1;
                LeaderboardRow {
                    place,
                    medal: Medal::for_place(place),
                    table_id: result.table_id,
                    label: table_label(result.table_id, result.table_name.as_deref()),
                    score: result.score,
                    categories: categories_best_first(result),
                }
            })
            .collect();

        let category_winners = results
            .category_winners
            .iter()
            .map(|(category, winner)| CategoryWinner {
                category: category.clone(),
                winner: winner.as_ref().map(|w| {
                    (
                        w.table_id,
                        table_label(w.table_id, w.table_name.as_deref()),
                        w.score,
                    )
                }),
            })
            .collect();

        Self {
            winners,
            category_winners,
        }
    }
}

fn categories_best_first(result: &TableResult) -> Vec<(String, f64)> {
    let mut categories: Vec<(String, f64)> = result
        .categories
        .iter()
        .map(|(category, &score)| (category.clone(), score))
        .collect();
    categories.sort_by(|a, b| b.1.total_cmp(&a.1));
    categories
}

/// State of the public display: the last `screen_tables_state` snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScreenView {
    state: ScreenStatePayload,
}

impl ScreenView {
    pub fn state(&self) -> &ScreenStatePayload {
        &self.state
    }

    pub fn phase(&self) -> GamePhase {
        self.state.game_state
    }

    pub fn tables(&self) -> &[TableData] {
        &self.state.tables
    }

    pub fn question(&self) -> Option<&Question> {
        self.state.question.as_ref()
    }

    pub fn panel(&self) -> ScreenPanel {
        match self.state.game_state {
            GamePhase::Waiting => ScreenPanel::Lobby,
            GamePhase::InQuestion | GamePhase::InAnswers => ScreenPanel::Question,
            GamePhase::InResults => ScreenPanel::Leaderboard,
        }
    }

    /// Roster of all tables with readiness colors.
    pub fn lobby(&self) -> LobbyView {
        let rows = self
            .state
            .tables
            .iter()
            .map(|table| LobbyRow {
                table_id: table.table_id,
                label: table_label(table.table_id, table.display_name()),
                clients: table.clients,
                readiness: Readiness::of(table),
            })
            .collect();
        let ready = self
            .state
            .tables
            .iter()
            .filter(|t| t.table_state == TablePhase::WaitingGameStart && t.display_name().is_some())
            .count();

        LobbyView {
            rows,
            ready,
            total: self.state.tables.len(),
        }
    }

    /// Shared question projection with the display's own countdown.
    pub fn question_panel(&self, countdown: &Countdown) -> Option<ScreenQuestionPanel> {
        let question = self.state.question.as_ref()?;
        let revealed = match self.state.game_state {
            GamePhase::InQuestion => false,
            GamePhase::InAnswers => true,
            GamePhase::Waiting | GamePhase::InResults => return None,
        };

        let options = question
            .answers
            .iter()
            .enumerate()
            .map(|(index, text)| ScreenOption {
                index,
                text: text.clone(),
                correct: revealed && question.is_correct(index),
            })
            .collect();

        Some(ScreenQuestionPanel {
            question_id: question.id,
            prompt: question.question.clone(),
            categories: question.categories.clone(),
            images: if revealed {
                question.answer_images.clone()
            } else {
                question.images.clone()
            },
            options,
            revealed,
            answered: self.state.tables.iter().filter(|t| t.answered).count(),
            total: self.state.tables.len(),
            countdown: (!revealed && countdown.phase() != CountdownPhase::Idle)
                .then(|| CountdownView::of(countdown)),
        })
    }

    /// Final leaderboard, once results are in.
    pub fn leaderboard(&self) -> Option<Leaderboard> {
        if self.state.game_state != GamePhase::InResults {
            return None;
        }
        self.state.results.as_ref().map(Leaderboard::from_results)
    }

    pub(crate) fn replace(&mut self, state: ScreenStatePayload) {
        self.state = state;
    }
}

// ── Admin ───────────────────────────────────────────────────────────

/// The operator console holds no server-pushed state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdminView;

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    clippy::float_cmp
)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::protocol::QuestionType;

    fn question(correct: Vec<usize>) -> Question {
        Question {
            id: 5,
            categories: vec!["science".into()],
            question_type: QuestionType::SingleChoice,
            question: "Which?".into(),
            images: vec!["before.png".into()],
            answer_images: vec!["after.png".into()],
            answers: vec!["A".into(), "B".into(), "C".into()],
            correct_answers: correct,
            score: None,
            timer: 10.0,
            time_left: None,
        }
    }

    fn table(id: TableId, name: Option<&str>, state: TablePhase) -> TableData {
        TableData {
            table_id: id,
            table_name: name.map(str::to_owned),
            table_state: state,
            clients: 1,
            table_answers: None,
            answered: false,
        }
    }

    fn table_view(role: Role, state: TablePhase, answers: Option<Vec<usize>>) -> TableView {
        let mut data = table(1, Some("Owls"), state);
        data.table_answers = answers;
        let mut view = TableView::default();
        view.replace(TableStatePayload {
            table: data,
            role,
            question: Some(question(vec![0])),
            result: None,
        });
        view
    }

    #[test]
    fn reveal_marks_correct_and_chosen_wrong_options() {
        let marks = reveal_marks(&question(vec![0]), &[1]);
        assert_eq!(
            marks,
            vec![OptionMark::Correct, OptionMark::Incorrect, OptionMark::Neutral]
        );
    }

    #[test]
    fn reveal_tolerates_out_of_range_correct_indices() {
        let marks = reveal_marks(&question(vec![0, 9]), &[]);
        assert_eq!(marks.len(), 3);
        assert_eq!(marks[0], OptionMark::Correct);
    }

    #[test]
    fn table_panel_follows_phase() {
        assert_eq!(TableView::default().panel(), TablePanel::Connecting);
        let cases = [
            (TablePhase::WaitingLeader, TablePanel::WaitingLeader),
            (TablePhase::WaitingGameStart, TablePanel::Join),
            (TablePhase::InQuestion, TablePanel::Question),
            (TablePhase::InAnswers, TablePanel::Question),
            (TablePhase::InResults, TablePanel::Result),
        ];
        for (state, panel) in cases {
            assert_eq!(table_view(Role::Leader, state, None).panel(), panel);
        }
    }

    #[test]
    fn observer_sees_leader_selection_read_only() {
        let view = table_view(Role::Observer, TablePhase::InQuestion, Some(vec![2]));
        let mut selection = AnswerSelection::new();
        selection.sync(view.snapshot());
        let mut countdown = Countdown::new();
        let _ = countdown.seed(10.0, None);

        let panel = view.question_panel(&selection, &countdown, true).unwrap();
        assert!(panel.options[2].checked);
        assert!(panel.options.iter().all(|o| !o.enabled));
        assert!(!panel.can_submit);
        assert_eq!(panel.statuses, vec![QuestionStatus::ObservingLeader]);
        assert_eq!(panel.hint, Some(SelectionHint::SingleChoice));
        assert_eq!(panel.images, vec!["before.png".to_owned()]);
        assert!(panel.countdown.is_some());
    }

    #[test]
    fn reveal_view_marks_options_and_hides_hint_and_countdown() {
        let view = table_view(Role::Leader, TablePhase::InAnswers, Some(vec![1]));
        let mut selection = AnswerSelection::new();
        selection.sync(view.snapshot());
        let countdown = Countdown::new();

        let panel = view.question_panel(&selection, &countdown, true).unwrap();
        let marks: Vec<_> = panel.options.iter().map(|o| o.mark).collect();
        assert_eq!(
            marks,
            vec![OptionMark::Correct, OptionMark::Incorrect, OptionMark::Neutral]
        );
        assert_eq!(panel.hint, None);
        assert_eq!(panel.countdown, None);
        assert_eq!(panel.images, vec!["after.png".to_owned()]);
        assert!(panel.statuses.contains(&QuestionStatus::AnswersRevealed));
    }

    #[test]
    fn expired_countdown_reports_time_over() {
        let view = table_view(Role::Leader, TablePhase::InQuestion, Some(vec![0]));
        let mut selection = AnswerSelection::new();
        selection.sync(view.snapshot());
        let mut countdown = Countdown::new();
        let _ = countdown.seed(10.0, Some(0.0));

        let panel = view.question_panel(&selection, &countdown, true).unwrap();
        assert_eq!(panel.statuses, vec![QuestionStatus::TimeOver]);
        assert!(!panel.can_submit);
    }

    #[test]
    fn leader_can_submit_only_with_selection_and_connection() {
        let view = table_view(Role::Leader, TablePhase::InQuestion, Some(vec![0]));
        let mut selection = AnswerSelection::new();
        selection.sync(view.snapshot());
        let mut countdown = Countdown::new();
        let _ = countdown.seed(10.0, None);

        assert!(view.question_panel(&selection, &countdown, true).unwrap().can_submit);
        assert!(!view.question_panel(&selection, &countdown, false).unwrap().can_submit);
    }

    #[test]
    fn lobby_colors_and_ready_counter() {
        let mut screen = ScreenView::default();
        screen.replace(ScreenStatePayload {
            game_state: GamePhase::Waiting,
            tables: vec![
                table(1, None, TablePhase::WaitingLeader),
                table(2, None, TablePhase::WaitingGameStart),
                table(3, Some("Owls"), TablePhase::WaitingGameStart),
                table(4, None, TablePhase::InResults),
            ],
            question: None,
            results: None,
        });

        let lobby = screen.lobby();
        let colors: Vec<_> = lobby.rows.iter().map(|r| r.readiness).collect();
        assert_eq!(
            colors,
            vec![
                Readiness::Red,
                Readiness::Yellow,
                Readiness::Green,
                Readiness::Green
            ]
        );
        assert_eq!(lobby.rows[1].label, "Table 2");
        assert_eq!(lobby.rows[2].label, "Owls");
        assert_eq!(Readiness::Yellow.status(), "choosing a name");
        assert_eq!((lobby.ready, lobby.total), (1, 4));
        assert_eq!(screen.panel(), ScreenPanel::Lobby);
    }

    #[test]
    fn screen_highlights_correct_options_only_after_reveal() {
        let mut screen = ScreenView::default();
        let mut answered = table(1, Some("Owls"), TablePhase::InQuestion);
        answered.answered = true;
        let mut state = ScreenStatePayload {
            game_state: GamePhase::InQuestion,
            tables: vec![answered, table(2, None, TablePhase::InQuestion)],
            question: Some(question(vec![2])),
            results: None,
        };
        screen.replace(state.clone());

        let mut countdown = Countdown::new();
        let _ = countdown.seed(10.0, Some(4.0));
        let panel = screen.question_panel(&countdown).unwrap();
        assert!(panel.options.iter().all(|o| !o.correct));
        assert_eq!((panel.answered, panel.total), (1, 2));
        assert_eq!(panel.countdown.unwrap().percent, 40.0);

        state.game_state = GamePhase::InAnswers;
        screen.replace(state);
        let panel = screen.question_panel(&countdown).unwrap();
        assert!(panel.options[2].correct);
        assert!(panel.countdown.is_none());
    }

    #[test]
    fn leaderboard_medals_and_sorted_categories() {
        let result = |id: TableId, score: f64| TableResult {
            table_id: id,
            table_name: None,
            score,
            categories: BTreeMap::from([("art".to_owned(), 1.0), ("math".to_owned(), 3.0)]),
            answers: BTreeMap::new(),
        };
        let results = ScreenResults {
            winners: (1..=4).map(|id| result(id, 10.0 - f64::from(id))).collect(),
            category_winners: BTreeMap::from([
                ("art".to_owned(), Some(result(2, 8.0))),
                ("music".to_owned(), None),
            ]),
        };

        let board = Leaderboard::from_results(&results);
        let medals: Vec<_> = board.winners.iter().map(|w| w.medal).collect();
        assert_eq!(
            medals,
            vec![
                Some(Medal::Gold),
                Some(Medal::Silver),
                Some(Medal::Bronze),
                None
            ]
        );
        assert_eq!(board.winners[0].categories[0].0, "math");
        assert_eq!(board.category_winners[0].label(), "Table 2");
        assert_eq!(board.category_winners[1].label(), "no winner");
    }

    #[test]
    fn result_rows_fall_back_to_correct_count_for_max_points() {
        let mut scored = question(vec![0]);
        scored.id = 1;
        scored.score = Some(3.0);
        let mut unscored = question(vec![0, 2]);
        unscored.id = 2;

        let outcome = TableOutcome {
            score: 3.0,
            question_score: BTreeMap::from([("1".to_owned(), 3.0)]),
            categories: BTreeMap::from([("science".to_owned(), 3.0)]),
            answers: BTreeMap::from([("1".to_owned(), vec![0]), ("2".to_owned(), vec![1])]),
            questions: vec![scored, unscored],
            place: Some(2),
            place_categories: Some(BTreeMap::from([("science".to_owned(), Some(1))])),
            place_amount: 6,
        };

        let view = ResultView::from_outcome(&outcome);
        assert_eq!(view.questions[0].max_points, 3.0);
        assert_eq!(view.questions[0].points, 3.0);
        assert_eq!(view.questions[1].max_points, 2.0);
        assert_eq!(view.questions[1].points, 0.0);
        assert_eq!(view.questions[1].selected, vec!["B".to_owned()]);
        assert_eq!(view.questions[1].correct, vec!["A".to_owned(), "C".to_owned()]);
        assert_eq!(view.categories[0].place, Some(1));
        assert_eq!((view.place, view.place_amount), (Some(2), 6));
    }
}
