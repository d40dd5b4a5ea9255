//! Role clients for the quiz game: one per table device, screen, and console.
//!
//! Each client owns exactly one [`ConnectionChannel`] and, where the role has
//! one, one [`CountdownTimer`]. Nothing is shared between clients. The caller
//! drives a client by awaiting [`TableClient::next_update`] (or its screen and
//! admin counterparts) in a loop; that single await point multiplexes inbound
//! messages, reconnect notices and countdown ticks.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = ChannelConfig::new("ws://localhost:8000");
//! let mut table = TableClient::start(config.connector(), 3, config);
//!
//! while let Some(update) = table.next_update().await {
//!     match update {
//!         ClientUpdate::StateReplaced => render(table.view()),
//!         ClientUpdate::Notice(notice) => toast(&notice),
//!         ClientUpdate::TimeOver => break,
//!         _ => {}
//!     }
//! }
//! table.close().await;
//! ```

use std::collections::VecDeque;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::channel::{ChannelConfig, ChannelEvent, ConnectionChannel, ConnectionState, Endpoint};
use crate::countdown::{Countdown, CountdownTimer, Seeded, Step};
use crate::dispatcher::{dispatch, Dispatch, RoleState};
use crate::event::{ClientUpdate, Notice};
use crate::protocol::{ClientMessage, GamePhase, Question, QuestionId, TableId, TablePhase};
use crate::selection::{request_table_name, AnswerSelection, Rejection};
use crate::transport::Connector;
use crate::view::{
    AdminView, JoinPanel, Leaderboard, LobbyView, QuestionPanel, ResultView, ScreenPanel,
    ScreenQuestionPanel, ScreenView, TablePanel, TableView,
};

// ── Session ─────────────────────────────────────────────────────────

/// What one channel event did to a session.
enum Absorbed {
    Opened,
    Replaced,
    Other,
}

/// A connection plus the role state it feeds.
struct Session<S> {
    channel: ConnectionChannel,
    events: mpsc::Receiver<ChannelEvent>,
    state: S,
    pending: VecDeque<ClientUpdate>,
}

impl<S: RoleState + Default> Session<S> {
    fn open<C: Connector>(connector: C, endpoint: Endpoint, config: ChannelConfig) -> Self {
        let (channel, events) = ConnectionChannel::open(connector, endpoint, config);
        Self {
            channel,
            events,
            state: S::default(),
            pending: VecDeque::new(),
        }
    }

    /// Fold one channel event into the state and queue the resulting updates.
    fn absorb(&mut self, event: ChannelEvent) -> Absorbed {
        match event {
            ChannelEvent::Opened { epoch } => {
                info!(endpoint = %self.channel.endpoint(), epoch, "connected");
                self.pending.push_back(ClientUpdate::Connected { epoch });
                Absorbed::Opened
            }
            ChannelEvent::Message(raw) => match dispatch(&mut self.state, &raw) {
                Dispatch::Replaced => {
                    self.pending.push_back(ClientUpdate::StateReplaced);
                    Absorbed::Replaced
                }
                Dispatch::Notify(notices) => {
                    for notice in notices {
                        debug!(role = S::ROLE, %notice, "notice");
                        self.pending.push_back(ClientUpdate::Notice(notice));
                    }
                    Absorbed::Other
                }
                Dispatch::Ignored => Absorbed::Other,
            },
            ChannelEvent::Reconnecting { .. } => {
                self.pending
                    .push_back(ClientUpdate::Notice(Notice::Reconnecting));
                Absorbed::Other
            }
        }
    }

    fn connected(&self) -> bool {
        self.channel.state() == ConnectionState::Open
    }
}

fn countdown_update(step: Step) -> Option<ClientUpdate> {
    match step {
        Step::Tick { remaining } => Some(ClientUpdate::CountdownTick { remaining }),
        Step::Expired => Some(ClientUpdate::TimeOver),
        Step::Stopped => None,
    }
}

/// Authoritative inputs of a countdown. The timer is reseeded whenever they
/// change.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TimerKey {
    question: QuestionId,
    total: f64,
    time_left: Option<f64>,
}

impl TimerKey {
    fn of(question: &Question) -> Self {
        Self {
            question: question.id,
            total: question.timer,
            time_left: question.time_left,
        }
    }
}

/// Reseed `timer` if `key` differs from the last one, clear it when `None`.
/// Returns `true` when the new seed expired immediately.
fn reconcile_timer(
    timer: &mut CountdownTimer,
    current: &mut Option<TimerKey>,
    key: Option<TimerKey>,
) -> bool {
    let Some(key) = key else {
        if current.take().is_some() {
            debug!("countdown cleared");
        }
        timer.clear();
        return false;
    };
    if *current == Some(key) {
        return false;
    }

    *current = Some(key);
    debug!(question = key.question, total = key.total, time_left = ?key.time_left, "countdown reseeded");
    timer.seed(key.total, key.time_left) == Seeded::Expired
}

// ── Table ───────────────────────────────────────────────────────────

/// Client for one device seated at a table.
///
/// Created via [`TableClient::start`]. The device's role (leader or observer)
/// comes from the server with every snapshot; only a leader can select,
/// submit, or name the table.
///
/// # Polling
///
/// The countdown only advances while [`next_update`](Self::next_update) is
/// being awaited. Keep it polled, e.g. as one branch of a `tokio::select!`
/// loop next to user input; it is cancel-safe. A client left unpolled still
/// reports the time it had at the last tick, so [`select_answer`](Self::select_answer)
/// and [`submit_answer`](Self::submit_answer) gate against that value.
pub struct TableClient {
    session: Session<TableView>,
    selection: AnswerSelection,
    timer: CountdownTimer,
    timer_key: Option<TimerKey>,
}

impl TableClient {
    /// Connect to the endpoint of `table_id`. Must be called from within a
    /// Tokio runtime.
    pub fn start<C: Connector>(connector: C, table_id: TableId, config: ChannelConfig) -> Self {
        Self {
            session: Session::open(connector, Endpoint::Table(table_id), config),
            selection: AnswerSelection::new(),
            timer: CountdownTimer::new(),
            timer_key: None,
        }
    }

    /// Wait for the next thing the presentation layer should react to.
    ///
    /// Returns `None` once the connection task is gone.
    pub async fn next_update(&mut self) -> Option<ClientUpdate> {
        loop {
            if let Some(update) = self.session.pending.pop_front() {
                return Some(update);
            }

            tokio::select! {
                event = self.session.events.recv() => {
                    match self.session.absorb(event?) {
                        Absorbed::Opened => self.selection.on_new_epoch(),
                        Absorbed::Replaced => self.resync(),
                        Absorbed::Other => {}
                    }
                }
                step = self.timer.tick() => {
                    if let Some(update) = countdown_update(step) {
                        return Some(update);
                    }
                }
            }
        }
    }

    /// Reconcile selection and countdown with a freshly replaced snapshot.
    fn resync(&mut self) {
        let snapshot = self.session.state.snapshot();
        self.selection.sync(snapshot);

        let key = snapshot.and_then(|s| {
            let question = s.question.as_ref()?;
            let running = s.table.table_state == TablePhase::InQuestion
                && !self.selection.is_submitted(Some(s));
            running.then(|| TimerKey::of(question))
        });
        if reconcile_timer(&mut self.timer, &mut self.timer_key, key) {
            self.session.pending.push_back(ClientUpdate::TimeOver);
        }
    }

    /// Toggle answer option `index` and broadcast the selection.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] when this device may not change the
    /// selection right now; nothing is sent in that case.
    pub fn select_answer(&mut self, index: usize) -> Result<&[usize], Rejection> {
        self.selection.select(
            self.session.state.snapshot(),
            self.timer.is_expired(),
            index,
            &self.session.channel,
        )
    }

    /// Send the current selection as the table's final answer.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] when submitting is not allowed (observer,
    /// time over, empty selection, already sent, ...).
    pub fn submit_answer(&mut self) -> Result<(), Rejection> {
        self.selection.submit(
            self.session.state.snapshot(),
            self.timer.is_expired(),
            &self.session.channel,
        )?;
        reconcile_timer(&mut self.timer, &mut self.timer_key, None);
        Ok(())
    }

    /// Name the table. Returns the trimmed name that was sent.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] when not leader, the game already started,
    /// or the name is blank.
    pub fn set_table_name(&self, name: &str) -> Result<String, Rejection> {
        request_table_name(self.session.state.snapshot(), name, &self.session.channel)
    }

    /// The latest table snapshot, as received.
    pub fn view(&self) -> &TableView {
        &self.session.state
    }

    /// Local answer selection and its submitted flag.
    pub fn selection(&self) -> &AnswerSelection {
        &self.selection
    }

    /// Countdown of the active question.
    pub fn countdown(&self) -> &Countdown {
        self.timer.countdown()
    }

    /// `true` once the countdown for the active question reached zero.
    ///
    /// Reflects the last tick processed by [`next_update`](Self::next_update).
    pub fn is_time_over(&self) -> bool {
        self.timer.is_expired()
    }

    /// Which panel the device should show.
    pub fn panel(&self) -> TablePanel {
        self.session.state.panel()
    }

    /// Pre-game panel; `None` outside `waiting_game_start`.
    pub fn join_panel(&self) -> Option<JoinPanel> {
        self.session.state.join_panel()
    }

    /// Question projection with marks, statuses and the countdown.
    pub fn question_panel(&self) -> Option<QuestionPanel> {
        self.session.state.question_panel(
            &self.selection,
            self.timer.countdown(),
            self.session.connected(),
        )
    }

    /// Final per-table result, once the server sent one.
    pub fn result_view(&self) -> Option<ResultView> {
        self.session.state.result_view()
    }

    /// Health of the underlying connection.
    pub fn connection_state(&self) -> ConnectionState {
        self.session.channel.state()
    }

    /// Endpoint of this table on the server.
    pub fn endpoint(&self) -> Endpoint {
        self.session.channel.endpoint()
    }

    /// Tear down: stop the countdown, cancel any pending reconnect, close the
    /// connection. No updates are produced afterwards.
    pub async fn close(mut self) {
        self.timer.clear();
        self.session.channel.close().await;
    }
}

impl std::fmt::Debug for TableClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableClient")
            .field("channel", &self.session.channel)
            .field("panel", &self.panel())
            .field("selected", &self.selection.selected())
            .field("countdown", self.timer.countdown())
            .finish()
    }
}

// ── Screen ──────────────────────────────────────────────────────────

/// Client for the shared public display.
pub struct ScreenClient {
    session: Session<ScreenView>,
    timer: CountdownTimer,
    timer_key: Option<TimerKey>,
}

impl ScreenClient {
    /// Connect to the screen endpoint. Must be called from within a Tokio
    /// runtime.
    pub fn start<C: Connector>(connector: C, config: ChannelConfig) -> Self {
        Self {
            session: Session::open(connector, Endpoint::Screen, config),
            timer: CountdownTimer::new(),
            timer_key: None,
        }
    }

    /// Wait for the next update; `None` once the connection task is gone.
    pub async fn next_update(&mut self) -> Option<ClientUpdate> {
        loop {
            if let Some(update) = self.session.pending.pop_front() {
                return Some(update);
            }

            tokio::select! {
                event = self.session.events.recv() => {
                    if let Absorbed::Replaced = self.session.absorb(event?) {
                        self.resync();
                    }
                }
                step = self.timer.tick() => {
                    if let Some(update) = countdown_update(step) {
                        return Some(update);
                    }
                }
            }
        }
    }

    fn resync(&mut self) {
        let view = &self.session.state;
        let key = (view.phase() == GamePhase::InQuestion)
            .then(|| view.question().map(TimerKey::of))
            .flatten();
        if reconcile_timer(&mut self.timer, &mut self.timer_key, key) {
            self.session.pending.push_back(ClientUpdate::TimeOver);
        }
    }

    /// The latest screen snapshot, as received.
    pub fn view(&self) -> &ScreenView {
        &self.session.state
    }

    /// The display's own countdown of the active question.
    pub fn countdown(&self) -> &Countdown {
        self.timer.countdown()
    }

    /// Which panel the display should show.
    pub fn panel(&self) -> ScreenPanel {
        self.session.state.panel()
    }

    /// Lobby roster with readiness and the `ready/total` counter.
    pub fn lobby(&self) -> LobbyView {
        self.session.state.lobby()
    }

    /// Shared question projection; correct options are highlighted after the reveal.
    pub fn question_panel(&self) -> Option<ScreenQuestionPanel> {
        self.session.state.question_panel(self.timer.countdown())
    }

    /// Ranked winners and category winners, once results are in.
    pub fn leaderboard(&self) -> Option<Leaderboard> {
        self.session.state.leaderboard()
    }

    /// Health of the underlying connection.
    pub fn connection_state(&self) -> ConnectionState {
        self.session.channel.state()
    }

    /// Stop the countdown, cancel any pending reconnect, close the connection.
    pub async fn close(mut self) {
        self.timer.clear();
        self.session.channel.close().await;
    }
}

impl std::fmt::Debug for ScreenClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenClient")
            .field("channel", &self.session.channel)
            .field("panel", &self.panel())
            .field("countdown", self.timer.countdown())
            .finish()
    }
}

// ── Admin ───────────────────────────────────────────────────────────

/// Operator console. A pure command sender: it only ever receives errors.
///
/// Every command is fire-and-forget and returns `false` when it was dropped
/// because no connection is open.
pub struct AdminClient {
    session: Session<AdminView>,
}

impl AdminClient {
    /// Connect to the admin endpoint. Must be called from within a Tokio
    /// runtime.
    pub fn start<C: Connector>(connector: C, config: ChannelConfig) -> Self {
        Self {
            session: Session::open(connector, Endpoint::Admin, config),
        }
    }

    /// Wait for the next update; `None` once the connection task is gone.
    pub async fn next_update(&mut self) -> Option<ClientUpdate> {
        loop {
            if let Some(update) = self.session.pending.pop_front() {
                return Some(update);
            }
            let event = self.session.events.recv().await?;
            self.session.absorb(event);
        }
    }

    /// Change the number of tables.
    pub fn resize_tables(&self, count: u32) -> bool {
        self.send(ClientMessage::ResizeTables { count })
    }

    /// Hand the leader role at `table_id` to another device.
    pub fn change_leader(&self, table_id: TableId) -> bool {
        self.send(ClientMessage::ChangeLeader { table_id })
    }

    /// Leave the lobby and start the first question.
    pub fn start_game(&self) -> bool {
        self.send(ClientMessage::StartGame)
    }

    /// Reveal the correct answers of the active question.
    pub fn show_answers(&self) -> bool {
        self.send(ClientMessage::ShowAnswers)
    }

    /// Go back one question.
    pub fn previous_question(&self) -> bool {
        self.send(ClientMessage::PreviousQuestion)
    }

    /// Skip to the next question.
    pub fn next_question(&self) -> bool {
        self.send(ClientMessage::NextQuestion)
    }

    /// End the game and show the results.
    pub fn show_results(&self) -> bool {
        self.send(ClientMessage::ShowResults)
    }

    /// Return every table to the lobby.
    pub fn reset_game(&self) -> bool {
        self.send(ClientMessage::ResetGame)
    }

    /// Advance to whatever comes next: question, reveal, or results.
    pub fn next_step(&self) -> bool {
        self.send(ClientMessage::NextStep)
    }

    /// Health of the underlying connection.
    pub fn connection_state(&self) -> ConnectionState {
        self.session.channel.state()
    }

    /// Cancel any pending reconnect and close the connection.
    pub async fn close(mut self) {
        self.session.channel.close().await;
    }

    fn send(&self, message: ClientMessage) -> bool {
        self.session.channel.send(message)
    }
}

impl std::fmt::Debug for AdminClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminClient")
            .field("channel", &self.session.channel)
            .finish()
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
    fn timer_reseeds_only_when_inputs_change() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let _guard = rt.enter();

        let mut timer = CountdownTimer::new();
        let mut key = None;
        let first = TimerKey {
            question: 1,
            total: 10.0,
            time_left: Some(10.0),
        };

        assert!(!reconcile_timer(&mut timer, &mut key, Some(first)));
        assert!(timer.countdown().is_running());

        // Same inputs: local progress is kept.
        assert!(!reconcile_timer(&mut timer, &mut key, Some(first)));
        assert_eq!(key, Some(first));

        let expired = TimerKey {
            time_left: Some(0.0),
            ..first
        };
        assert!(reconcile_timer(&mut timer, &mut key, Some(expired)));
        assert!(timer.is_expired());

        assert!(!reconcile_timer(&mut timer, &mut key, None));
        assert_eq!(key, None);
        assert!(!timer.countdown().is_running());
    }

    #[test]
    fn countdown_steps_map_to_updates() {
        assert_eq!(
            countdown_update(Step::Tick { remaining: 4.2 }),
            Some(ClientUpdate::CountdownTick { remaining: 4.2 })
        );
        assert_eq!(countdown_update(Step::Expired), Some(ClientUpdate::TimeOver));
        assert_eq!(countdown_update(Step::Stopped), None);
    }
}
