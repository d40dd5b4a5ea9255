//! Resilient per-role connection with fixed-delay reconnection.
//!
//! [`ConnectionChannel`] is a thin handle in front of a background task that
//! owns at most one live [`Transport`] at a time. When that transport closes or
//! fails, the task reports [`ChannelEvent::Reconnecting`], waits the configured
//! delay (3000 ms by default) and asks the [`Connector`] for a new one. This
//! repeats until [`ConnectionChannel::close`] is called or the handle is
//! dropped.
//!
//! Commands are fire-and-forget: [`ConnectionChannel::send`] hands a message to
//! the live connection if there is one and silently drops it otherwise. The
//! server pushes a full state snapshot on every new connection, which is what
//! resynchronizes a client that lost a command.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = ChannelConfig::new("ws://localhost:8000");
//! let (mut channel, mut events) =
//!     ConnectionChannel::open(WebSocketConnector::default(), Endpoint::Admin, config);
//!
//! channel.send(ClientMessage::StartGame);
//!
//! while let Some(event) = events.recv().await {
//!     if let ChannelEvent::Message(text) = event { /* … */ }
//! }
//! channel.close().await;
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::protocol::{ClientMessage, TableId};
use crate::transport::{Connector, Transport};

/// Delay between an unexpected closure and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Upper bound on a single connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Endpoint ────────────────────────────────────────────────────────

/// One of the three logical server endpoints, one per client role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// A device seated at the given table.
    Table(TableId),
    /// The shared public display.
    Screen,
    /// The operator console.
    Admin,
}

impl Endpoint {
    /// Path of the endpoint on the server.
    pub fn path(&self) -> String {
        match self {
            Self::Table(id) => format!("/ws/table/{id}"),
            Self::Screen => "/ws/screen".to_string(),
            Self::Admin => "/ws/admin".to_string(),
        }
    }

    /// Full URL of the endpoint below `server_url`.
    ///
    /// ```
    /// use quiz_sync_client::channel::Endpoint;
    ///
    /// assert_eq!(
    ///     Endpoint::Table(4).url("ws://quiz.local:8000/"),
    ///     "ws://quiz.local:8000/ws/table/4"
    /// );
    /// ```
    pub fn url(&self, server_url: &str) -> String {
        format!("{}{}", server_url.trim_end_matches('/'), self.path())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table(id) => write!(f, "table {id}"),
            Self::Screen => f.write_str("screen"),
            Self::Admin => f.write_str("admin"),
        }
    }
}

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`ConnectionChannel`].
///
/// The only required field is `server_url`; all others have defaults.
///
/// # Example
///
/// ```
/// use quiz_sync_client::channel::ChannelConfig;
/// use std::time::Duration;
///
/// let config = ChannelConfig::new("ws://localhost:8000")
///     .with_reconnect_delay(Duration::from_secs(5))
///     .with_event_channel_capacity(64);
/// assert_eq!(config.reconnect_delay, Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Base WebSocket URL of the game server, e.g. `ws://host:8000`.
    pub server_url: String,
    /// Wait between an unexpected closure and the next attempt.
    ///
    /// Defaults to **3000 ms**.
    pub reconnect_delay: Duration,
    /// Upper bound on one connection attempt, used by
    /// `WebSocketConnector` when built through [`ChannelConfig::connector`].
    ///
    /// Defaults to **10 seconds**.
    pub connect_timeout: Duration,
    /// Capacity of the bounded event channel.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Time given to the background task to close the live transport on
    /// [`ConnectionChannel::close`] before it is aborted.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl ChannelConfig {
    /// Create a configuration for the given server with default values.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Set the delay before each reconnection attempt.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the timeout of a single connection attempt.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the capacity of the bounded event channel. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// A WebSocket connector honoring `connect_timeout`.
    #[cfg(feature = "transport-websocket")]
    pub fn connector(&self) -> crate::transports::WebSocketConnector {
        crate::transports::WebSocketConnector::new(self.connect_timeout)
    }
}

// ── Connection state ────────────────────────────────────────────────

/// Health of the logical connection behind a [`ConnectionChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// A connection attempt is in flight.
    Connecting,
    /// A transport is live; commands are delivered.
    Open,
    /// The last transport was lost; another attempt is scheduled.
    ClosedPendingRetry,
    /// The channel was closed by its owner. Terminal.
    Closed,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::ClosedPendingRetry,
            _ => Self::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Connecting => 0,
            Self::Open => 1,
            Self::ClosedPendingRetry => 2,
            Self::Closed => 3,
        }
    }
}

/// Events emitted by a [`ConnectionChannel`] to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A new connection epoch started. Epochs count up from 1.
    Opened {
        /// Sequence number of the connection epoch.
        epoch: u64,
    },
    /// A raw text message arrived on the current epoch.
    Message(String),
    /// The connection was lost or could not be established; another attempt
    /// follows after `retry_in`.
    Reconnecting {
        /// Why the previous epoch ended or the attempt failed.
        reason: String,
        /// Delay before the next attempt.
        retry_in: Duration,
    },
}

// ── Command sink ────────────────────────────────────────────────────

/// The single outbound contract used by everything that emits commands.
///
/// Delivery is fire-and-forget. Acknowledgement or retry could be added
/// behind this trait without touching callers.
pub trait CommandSink {
    /// Hand `message` to the live connection. Returns `false` when it was
    /// dropped because no connection is open.
    fn send(&self, message: ClientMessage) -> bool;

    /// Returns `true` while a connection is open.
    fn is_open(&self) -> bool;
}

// ── Shared state ────────────────────────────────────────────────────

/// State shared between the channel handle and its background task.
struct ChannelShared {
    state: AtomicU8,
    epoch: AtomicU64,
}

impl ChannelShared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Connecting.as_u8()),
            epoch: AtomicU64::new(0),
        }
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    fn next_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }
}

// ── Channel handle ──────────────────────────────────────────────────

/// Handle to one logical, self-healing connection to a role endpoint.
///
/// Created via [`ConnectionChannel::open`]. Dropping the handle aborts the
/// background task, which cancels any pending reconnect and drops the live
/// transport; [`close`](Self::close) does the same gracefully.
pub struct ConnectionChannel {
    endpoint: Endpoint,
    cmd_tx: mpsc::UnboundedSender<ClientMessage>,
    shared: Arc<ChannelShared>,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl ConnectionChannel {
    /// Start connecting to `endpoint` and return the handle plus its event receiver.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn open<C: Connector>(
        connector: C,
        endpoint: Endpoint,
        config: ChannelConfig,
    ) -> (Self, mpsc::Receiver<ChannelEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ClientMessage>();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<ChannelEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let shared = Arc::new(ChannelShared::new());
        let url = endpoint.url(&config.server_url);

        let task = tokio::spawn(connection_loop(
            connector,
            url,
            config.reconnect_delay,
            cmd_rx,
            event_tx,
            Arc::clone(&shared),
            shutdown_rx,
        ));

        let channel = Self {
            endpoint,
            cmd_tx,
            shared,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };

        (channel, event_rx)
    }

    /// The endpoint this channel connects to.
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Current health of the connection.
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Sequence number of the current (or last) connection epoch; 0 before
    /// the first connection opened.
    pub fn epoch(&self) -> u64 {
        self.shared.epoch.load(Ordering::Acquire)
    }

    /// Send a command on the live connection.
    ///
    /// Returns `false`, without queueing anything, when no connection is open.
    pub fn send(&self, message: ClientMessage) -> bool {
        if self.state() != ConnectionState::Open {
            debug!(endpoint = %self.endpoint, ?message, "not connected, dropping command");
            return false;
        }
        self.cmd_tx.send(message).is_ok()
    }

    /// Cancel any pending reconnect, close the live connection, and stop the
    /// background task. No events are emitted afterwards.
    ///
    /// Safe to call more than once.
    pub async fn close(&mut self) {
        debug!(endpoint = %self.endpoint, "channel close requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // Await the task with a timeout. If it doesn't exit in time, abort it
        // so the task cannot detach and keep reconnecting.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("connection loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("connection loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("connection loop aborted: {join_err}");
                    }
                }
            }
        }

        self.shared.set_state(ConnectionState::Closed);
    }
}

impl CommandSink for ConnectionChannel {
    fn send(&self, message: ClientMessage) -> bool {
        ConnectionChannel::send(self, message)
    }

    fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }
}

impl fmt::Debug for ConnectionChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionChannel")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .field("epoch", &self.epoch())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for ConnectionChannel {
    fn drop(&mut self) {
        // `Drop` cannot await a graceful close. Aborting drops the loop
        // future, which drops the transport and any pending reconnect sleep.
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.shared.set_state(ConnectionState::Closed);
    }
}

// ── Connection loop ─────────────────────────────────────────────────

/// How one connection epoch ended.
enum EpochEnd {
    /// The owner asked to stop.
    Shutdown,
    /// The transport was lost; reconnect.
    Lost(String),
}

/// Background task: connect, run the epoch, wait, repeat.
async fn connection_loop<C: Connector>(
    connector: C,
    url: String,
    reconnect_delay: Duration,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientMessage>,
    event_tx: mpsc::Sender<ChannelEvent>,
    shared: Arc<ChannelShared>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!(url = %url, "connection loop started");

    'reconnect: loop {
        shared.set_state(ConnectionState::Connecting);
        debug!(url = %url, "connecting");

        let attempt = tokio::select! {
            biased;
            _ = &mut shutdown_rx => break 'reconnect,
            attempt = connector.connect(&url) => attempt,
        };

        let reason = match attempt {
            Ok(transport) => {
                // Anything queued during the previous epoch belongs to a
                // connection that no longer exists.
                while cmd_rx.try_recv().is_ok() {}

                let epoch = shared.next_epoch();
                shared.set_state(ConnectionState::Open);
                info!(url = %url, epoch, "connection open");

                if event_tx.send(ChannelEvent::Opened { epoch }).await.is_err() {
                    debug!("event channel closed, receiver dropped");
                }

                match run_epoch(transport, &mut cmd_rx, &event_tx, &mut shutdown_rx).await {
                    EpochEnd::Shutdown => break 'reconnect,
                    EpochEnd::Lost(reason) => reason,
                }
            }
            Err(e) => e.to_string(),
        };

        shared.set_state(ConnectionState::ClosedPendingRetry);
        warn!(url = %url, %reason, retry_in = ?reconnect_delay, "connection lost, reconnecting");
        let notice = ChannelEvent::Reconnecting {
            reason,
            retry_in: reconnect_delay,
        };
        // The notice is never dropped; a full channel holds the retry back
        // until the owner catches up or shuts down.
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => break 'reconnect,
            sent = event_tx.send(notice) => {
                if sent.is_err() {
                    debug!("event channel closed, receiver dropped");
                }
            }
        }

        let retry = tokio::time::sleep(reconnect_delay);
        tokio::pin!(retry);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown_rx => break 'reconnect,
                () = &mut retry => break,
                cmd = cmd_rx.recv() => match cmd {
                    Some(message) => {
                        debug!(?message, "connection down, dropping command");
                    }
                    // Command channel closed: handle dropped.
                    None => break 'reconnect,
                },
            }
        }
    }

    shared.set_state(ConnectionState::Closed);
    debug!(url = %url, "connection loop exited");
}

/// Multiplex one live transport until it fails or shutdown is requested.
async fn run_epoch<T: Transport>(
    mut transport: T,
    cmd_rx: &mut mpsc::UnboundedReceiver<ClientMessage>,
    event_tx: &mpsc::Sender<ChannelEvent>,
    shutdown_rx: &mut oneshot::Receiver<()>,
) -> EpochEnd {
    loop {
        tokio::select! {
            biased;

            _ = &mut *shutdown_rx => {
                debug!("shutdown signal received");
                let _ = transport.close().await;
                return EpochEnd::Shutdown;
            }

            cmd = cmd_rx.recv() => match cmd {
                Some(message) => match serde_json::to_string(&message) {
                    Ok(json) => {
                        if let Err(e) = transport.send(json).await {
                            error!("transport send error: {e}");
                            return EpochEnd::Lost(format!("transport send error: {e}"));
                        }
                    }
                    Err(e) => {
                        // Serialization errors are programming bugs; keep the epoch alive.
                        error!("failed to serialize ClientMessage: {e}");
                    }
                },
                None => {
                    debug!("command channel closed, closing transport");
                    let _ = transport.close().await;
                    return EpochEnd::Shutdown;
                }
            },

            incoming = transport.recv() => match incoming {
                Some(Ok(text)) => {
                    // Snapshots must not be dropped or reordered, so this
                    // send waits for room in the channel.
                    if event_tx.send(ChannelEvent::Message(text)).await.is_err() {
                        debug!("event channel closed, receiver dropped");
                    }
                }
                Some(Err(e)) => {
                    error!("transport receive error: {e}");
                    return EpochEnd::Lost(format!("transport receive error: {e}"));
                }
                None => {
                    debug!("transport closed by server");
                    return EpochEnd::Lost("connection closed by server".to_string());
                }
            },
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

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
    use crate::error::QuizClientError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use tokio::time::Instant;

    // ── Mock transport & connector ──────────────────────────────────

    /// Transport fed by an mpsc channel. Dropping the feeding sender looks
    /// like the server closing the connection.
    struct PipeTransport {
        incoming: mpsc::UnboundedReceiver<String>,
        sent: Arc<StdMutex<Vec<String>>>,
    }

    #[async_trait]
    impl Transport for PipeTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), QuizClientError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, QuizClientError>> {
            self.incoming.recv().await.map(Ok)
        }

        async fn close(&mut self) -> std::result::Result<(), QuizClientError> {
            self.incoming.close();
            Ok(())
        }
    }

    /// Hands out scripted transports in order; fails once they run out.
    #[derive(Default)]
    struct ScriptedConnector {
        transports: StdMutex<VecDeque<PipeTransport>>,
        attempts: Arc<StdMutex<Vec<(Instant, String)>>>,
    }

    impl ScriptedConnector {
        /// Add a transport; returns the server-side sender and the sent log.
        fn push(&self) -> (mpsc::UnboundedSender<String>, Arc<StdMutex<Vec<String>>>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let sent = Arc::new(StdMutex::new(Vec::new()));
            self.transports.lock().unwrap().push_back(PipeTransport {
                incoming: rx,
                sent: Arc::clone(&sent),
            });
            (tx, sent)
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        type Transport = PipeTransport;

        async fn connect(&self, url: &str) -> std::result::Result<PipeTransport, QuizClientError> {
            self.attempts
                .lock()
                .unwrap()
                .push((Instant::now(), url.to_string()));
            self.transports
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| QuizClientError::Connect {
                    url: url.to_string(),
                    reason: "connection refused".into(),
                })
        }
    }

    fn config() -> ChannelConfig {
        ChannelConfig::new("ws://quiz.test:8000/")
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[test]
    fn endpoint_paths() {
        assert_eq!(Endpoint::Table(7).path(), "/ws/table/7");
        assert_eq!(Endpoint::Screen.url("ws://h"), "ws://h/ws/screen");
        assert_eq!(Endpoint::Admin.url("ws://h/"), "ws://h/ws/admin");
        assert_eq!(Endpoint::Table(2).to_string(), "table 2");
    }

    #[test]
    fn config_defaults() {
        let config = ChannelConfig::new("ws://h");
        assert_eq!(config.reconnect_delay, Duration::from_millis(3000));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(config.with_event_channel_capacity(0).event_channel_capacity, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_attempts_retry_after_fixed_delay() {
        let connector = ScriptedConnector::default();
        let attempts = Arc::clone(&connector.attempts);
        let (mut channel, mut events) = ConnectionChannel::open(connector, Endpoint::Screen, config());

        for _ in 0..4 {
            let event = events.recv().await.unwrap();
            assert!(matches!(event, ChannelEvent::Reconnecting { .. }), "got {event:?}");
        }

        {
            let attempts = attempts.lock().unwrap();
            assert_eq!(attempts.len(), 4);
            assert_eq!(attempts[0].1, "ws://quiz.test:8000/ws/screen");
            for pair in attempts.windows(2) {
                let gap = pair[1].0 - pair[0].0;
                assert!(gap >= Duration::from_millis(3000), "gap {gap:?}");
                assert!(gap < Duration::from_millis(3050), "gap {gap:?}");
            }
        }
        assert_eq!(channel.state(), ConnectionState::ClosedPendingRetry);

        channel.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_notice_waits_for_room_in_a_full_channel() {
        let connector = ScriptedConnector::default();
        let attempts = Arc::clone(&connector.attempts);
        let (mut channel, mut events) = ConnectionChannel::open(
            connector,
            Endpoint::Screen,
            config().with_event_channel_capacity(1),
        );

        // Nobody reads: the second notice finds the channel full and holds
        // the loop before a third attempt.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(attempts.lock().unwrap().len(), 2);

        for _ in 0..2 {
            let event = events.recv().await.unwrap();
            assert!(matches!(event, ChannelEvent::Reconnecting { .. }), "got {event:?}");
        }

        channel.close().await;
        assert_eq!(attempts.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn close_cancels_pending_reconnect() {
        let connector = ScriptedConnector::default();
        let attempts = Arc::clone(&connector.attempts);
        let (mut channel, mut events) = ConnectionChannel::open(connector, Endpoint::Admin, config());

        let _ = events.recv().await.unwrap(); // Reconnecting
        channel.close().await;
        assert_eq!(channel.state(), ConnectionState::Closed);

        let before = attempts.lock().unwrap().len();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(attempts.lock().unwrap().len(), before);
        assert!(events.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn server_close_starts_new_epoch() {
        let connector = ScriptedConnector::default();
        let (server_a, _sent_a) = connector.push();
        let (server_b, _sent_b) = connector.push();
        let (mut channel, mut events) =
            ConnectionChannel::open(connector, Endpoint::Table(1), config());

        assert_eq!(events.recv().await.unwrap(), ChannelEvent::Opened { epoch: 1 });
        server_a.send("first".into()).unwrap();
        assert_eq!(events.recv().await.unwrap(), ChannelEvent::Message("first".into()));

        drop(server_a);
        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            ChannelEvent::Reconnecting {
                reason: "connection closed by server".into(),
                retry_in: Duration::from_millis(3000),
            }
        );

        assert_eq!(events.recv().await.unwrap(), ChannelEvent::Opened { epoch: 2 });
        assert_eq!(channel.epoch(), 2);
        server_b.send("second".into()).unwrap();
        assert_eq!(events.recv().await.unwrap(), ChannelEvent::Message("second".into()));

        channel.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn send_is_noop_while_disconnected() {
        let connector = ScriptedConnector::default();
        let (mut channel, mut events) = ConnectionChannel::open(connector, Endpoint::Admin, config());

        let _ = events.recv().await.unwrap(); // Reconnecting
        assert!(!channel.send(ClientMessage::StartGame));
        assert!(!CommandSink::is_open(&channel));

        channel.close().await;
        assert!(!channel.send(ClientMessage::StartGame));
    }

    #[tokio::test(start_paused = true)]
    async fn send_serializes_on_open_connection() {
        let connector = ScriptedConnector::default();
        let (_server, sent) = connector.push();
        let (mut channel, mut events) = ConnectionChannel::open(connector, Endpoint::Admin, config());

        assert!(matches!(events.recv().await.unwrap(), ChannelEvent::Opened { .. }));
        assert!(channel.send(ClientMessage::ChangeLeader { table_id: 5 }));

        tokio::time::sleep(Duration::from_millis(10)).await;
        {
            let sent = sent.lock().unwrap();
            assert_eq!(sent.len(), 1);
            let value: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
            assert_eq!(
                value,
                serde_json::json!({"event_type": "from_admin_change_leader", "table_id": 5})
            );
        }

        channel.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn drop_aborts_the_loop() {
        let connector = ScriptedConnector::default();
        let attempts = Arc::clone(&connector.attempts);
        let (channel, mut events) = ConnectionChannel::open(connector, Endpoint::Screen, config());

        let _ = events.recv().await.unwrap();
        drop(channel);

        // The aborted task drops its event sender.
        assert!(events.recv().await.is_none());
        let before = attempts.lock().unwrap().len();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(attempts.lock().unwrap().len(), before);
    }
}
