//! Local countdown reconciled against the server's remaining time.
//!
//! [`Countdown`] is the pure state machine (`idle → running → expired`);
//! [`CountdownTimer`] drives it from one persistent Tokio interval. Whenever
//! the authoritative inputs change the countdown is reseeded, never nudged:
//! local drift is thrown away in favour of the server's value.

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Period of one countdown tick.
pub const TICK_PERIOD: Duration = Duration::from_millis(100);

/// Seconds removed from the countdown per tick.
pub const TICK_STEP: f64 = 0.1;

/// Lifecycle phase of a [`Countdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownPhase {
    /// Not seeded, or cleared.
    Idle,
    /// Counting down.
    Running,
    /// Reached zero; the expiry has been reported.
    Expired,
}

/// Result of seeding a countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Seeded {
    /// Time remains; the countdown is running.
    Running,
    /// No time remained: the countdown expired without ever running.
    Expired,
}

/// Result of advancing a countdown by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Time went down and some remains.
    Tick {
        /// Remaining seconds.
        remaining: f64,
    },
    /// This tick reached zero. Reported exactly once per seed.
    Expired,
    /// Nothing to do: the countdown is idle or already expired.
    Stopped,
}

/// Countdown state: `total`, `current`, and whether it is ticking.
#[derive(Debug, Clone, PartialEq)]
pub struct Countdown {
    total: f64,
    current: f64,
    phase: CountdownPhase,
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Countdown {
    /// An idle countdown.
    pub fn new() -> Self {
        Self {
            total: 0.0,
            current: 0.0,
            phase: CountdownPhase::Idle,
        }
    }

    /// Reset to `total` seconds with `current` remaining (`total` when absent).
    ///
    /// A non-positive remaining time expires immediately.
    pub fn seed(&mut self, total: f64, current: Option<f64>) -> Seeded {
        self.total = total;
        self.current = current.unwrap_or(total).max(0.0);
        if self.current <= 0.0 {
            self.phase = CountdownPhase::Expired;
            Seeded::Expired
        } else {
            self.phase = CountdownPhase::Running;
            Seeded::Running
        }
    }

    /// Advance by one tick of [`TICK_STEP`].
    pub fn step(&mut self) -> Step {
        if self.phase != CountdownPhase::Running {
            return Step::Stopped;
        }
        // Round to tenths each tick so repeated subtraction cannot drift.
        let next = ((self.current - TICK_STEP) * 10.0).round() / 10.0;
        if next <= 0.0 {
            self.current = 0.0;
            self.phase = CountdownPhase::Expired;
            return Step::Expired;
        }
        self.current = next;
        Step::Tick { remaining: next }
    }

    /// Return to idle, e.g. when the question view goes away.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn phase(&self) -> CountdownPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == CountdownPhase::Running
    }

    pub fn is_expired(&self) -> bool {
        self.phase == CountdownPhase::Expired
    }

    /// Remaining share of the total time, 0–100.
    pub fn percent(&self) -> f64 {
        if self.total > 0.0 {
            (self.current / self.total * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        }
    }

    /// `true` in the last tenth of the allotted time.
    pub fn is_critical(&self) -> bool {
        let percent = self.percent();
        percent > 0.0 && percent <= 10.0
    }
}

/// A [`Countdown`] driven by one persistent periodic timer.
///
/// The interval is created once and reset in place on every seed, so the
/// first tick after a reseed lands exactly one [`TICK_PERIOD`] later.
#[derive(Debug)]
pub struct CountdownTimer {
    countdown: Countdown,
    interval: Interval,
}

impl CountdownTimer {
    /// Create an idle timer. Must be called from within a Tokio runtime.
    pub fn new() -> Self {
        let mut interval = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            countdown: Countdown::new(),
            interval,
        }
    }

    /// Reseed from authoritative inputs; see [`Countdown::seed`].
    pub fn seed(&mut self, total: f64, current: Option<f64>) -> Seeded {
        let seeded = self.countdown.seed(total, current);
        if seeded == Seeded::Running {
            self.interval.reset();
        }
        seeded
    }

    /// Stop ticking and forget the countdown.
    pub fn clear(&mut self) {
        self.countdown.clear();
    }

    /// Wait for the next tick and apply it.
    ///
    /// Never resolves while the countdown is not running, which makes it
    /// safe to poll unconditionally from `tokio::select!`. Cancel-safe.
    pub async fn tick(&mut self) -> Step {
        if !self.countdown.is_running() {
            std::future::pending::<()>().await;
        }
        self.interval.tick().await;
        self.countdown.step()
    }

    /// State as of the last processed tick.
    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    /// `true` once the last processed tick reached zero.
    pub fn is_expired(&self) -> bool {
        self.countdown.is_expired()
    }
}

impl Default for CountdownTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::float_cmp,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn full_run_expires_once_after_one_hundred_ticks() {
        let mut countdown = Countdown::new();
        assert_eq!(countdown.seed(10.0, Some(10.0)), Seeded::Running);

        let mut ticks = 0;
        let mut expiries = 0;
        for _ in 0..150 {
            match countdown.step() {
                Step::Tick { .. } => ticks += 1,
                Step::Expired => {
                    ticks += 1;
                    expiries += 1;
                }
                Step::Stopped => {}
            }
        }

        assert_eq!(ticks, 100);
        assert_eq!(expiries, 1);
        assert_eq!(countdown.current(), 0.0);
        assert!(countdown.is_expired());
    }

    #[test]
    fn remaining_time_stays_on_tenths() {
        let mut countdown = Countdown::new();
        let _ = countdown.seed(3.0, None);
        for _ in 0..7 {
            let _ = countdown.step();
        }
        assert_eq!(countdown.current(), 2.3);
    }

    #[test]
    fn non_positive_seed_expires_without_running() {
        let mut countdown = Countdown::new();
        assert_eq!(countdown.seed(10.0, Some(0.0)), Seeded::Expired);
        assert!(countdown.is_expired());
        assert_eq!(countdown.step(), Step::Stopped);

        assert_eq!(countdown.seed(10.0, Some(-2.5)), Seeded::Expired);
        assert_eq!(countdown.current(), 0.0);
    }

    #[test]
    fn reseed_after_expiry_runs_again() {
        let mut countdown = Countdown::new();
        let _ = countdown.seed(1.0, Some(0.1));
        assert_eq!(countdown.step(), Step::Expired);

        assert_eq!(countdown.seed(1.0, Some(0.5)), Seeded::Running);
        assert_eq!(countdown.step(), Step::Tick { remaining: 0.4 });
    }

    #[test]
    fn step_that_rounds_to_zero_expires() {
        let mut countdown = Countdown::new();
        assert_eq!(countdown.seed(10.0, Some(0.14)), Seeded::Running);
        assert_eq!(countdown.step(), Step::Expired);
        assert_eq!(countdown.current(), 0.0);
        assert!(countdown.is_expired());
        assert_eq!(countdown.step(), Step::Stopped);

        let _ = countdown.seed(10.0, Some(0.16));
        assert_eq!(countdown.step(), Step::Tick { remaining: 0.1 });
        assert_eq!(countdown.step(), Step::Expired);
    }

    #[test]
    fn reseed_discards_local_progress() {
        let mut countdown = Countdown::new();
        let _ = countdown.seed(20.0, Some(20.0));
        for _ in 0..30 {
            let _ = countdown.step();
        }
        assert_eq!(countdown.current(), 17.0);

        let _ = countdown.seed(20.0, Some(18.4));
        assert_eq!(countdown.current(), 18.4);
        assert_eq!(countdown.total(), 20.0);
    }

    #[test]
    fn percent_and_critical_band() {
        let mut countdown = Countdown::new();
        let _ = countdown.seed(10.0, Some(5.0));
        assert_eq!(countdown.percent(), 50.0);
        assert!(!countdown.is_critical());

        let _ = countdown.seed(10.0, Some(1.0));
        assert!(countdown.is_critical());

        let _ = countdown.seed(0.0, None);
        assert_eq!(countdown.percent(), 0.0);
        assert!(!countdown.is_critical());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_ticks_every_period() {
        let mut timer = CountdownTimer::new();
        assert_eq!(timer.seed(0.3, None), Seeded::Running);

        let start = Instant::now();
        assert_eq!(timer.tick().await, Step::Tick { remaining: 0.2 });
        assert_eq!(timer.tick().await, Step::Tick { remaining: 0.1 });
        assert_eq!(timer.tick().await, Step::Expired);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(300), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(350), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timer_never_ticks() {
        let mut timer = CountdownTimer::new();
        let waited = tokio::time::timeout(Duration::from_secs(5), timer.tick()).await;
        assert!(waited.is_err());

        let _ = timer.seed(1.0, None);
        timer.clear();
        let waited = tokio::time::timeout(Duration::from_secs(5), timer.tick()).await;
        assert!(waited.is_err());
    }
}
