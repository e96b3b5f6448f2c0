//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, requests fail fast
//! - Half-Open: testing if backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failures in the last `window_size` outcomes >= failure_threshold
//! Open → Half-Open: after open_duration
//! Half-Open → Closed: a trial request succeeds
//! Half-Open → Open: a trial request fails (open timer restarts)
//! ```
//!
//! # Design Decisions
//! - One breaker per name, shared by every route that names it
//! - All state lives behind one short-lived lock; never held across an await
//! - Each transition bumps a generation; outcomes from an older generation are dropped
//! - Fail fast in Open state (no waiting for timeout)

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::error::GatewayError;
use crate::observability::metrics;
use crate::resilience::outcome::RequestOutcome;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds for one breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub window_size: u32,
    pub open_duration: Duration,
    pub half_open_trial_count: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self::from(&CircuitBreakerConfig::named(""))
    }
}

impl From<&CircuitBreakerConfig> for BreakerSettings {
    fn from(config: &CircuitBreakerConfig) -> Self {
        let window_size = config.window_size.max(1);
        Self {
            failure_threshold: config.failure_threshold.clamp(1, window_size),
            window_size,
            open_duration: Duration::from_millis(config.open_duration_ms),
            half_open_trial_count: config.half_open_trial_count.max(1),
        }
    }
}

/// Point-in-time view of a breaker, for admin endpoints and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: BreakerState,
    pub failure_count: u32,
    pub success_count: u32,
    pub window_len: usize,
    /// Milliseconds since the current window started.
    pub window_age_ms: u64,
    /// Milliseconds since the breaker last opened, while not closed.
    pub open_for_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    from: BreakerState,
    to: BreakerState,
}

#[derive(Debug)]
struct BreakerCore {
    state: BreakerState,
    /// Most recent outcomes, `true` for a failure.
    window: VecDeque<bool>,
    failure_count: u32,
    success_count: u32,
    window_start: Instant,
    opened_at: Option<Instant>,
    trials_admitted: u32,
    generation: u64,
}

impl BreakerCore {
    fn new(now: Instant) -> Self {
        Self {
            state: BreakerState::Closed,
            window: VecDeque::new(),
            failure_count: 0,
            success_count: 0,
            window_start: now,
            opened_at: None,
            trials_admitted: 0,
            generation: 0,
        }
    }

    fn clear_window(&mut self, now: Instant) {
        self.window.clear();
        self.failure_count = 0;
        self.success_count = 0;
        self.window_start = now;
    }

    fn transition(&mut self, to: BreakerState, now: Instant) -> Transition {
        let from = self.state;
        self.state = to;
        self.generation += 1;
        self.trials_admitted = 0;
        match to {
            BreakerState::Open => {
                self.opened_at = Some(now);
                self.clear_window(now);
            }
            BreakerState::Closed => {
                self.opened_at = None;
                self.clear_window(now);
            }
            BreakerState::HalfOpen => {}
        }
        Transition { from, to }
    }

    fn poll_open_timer(&mut self, settings: &BreakerSettings, now: Instant) -> Option<Transition> {
        match (self.state, self.opened_at) {
            (BreakerState::Open, Some(opened_at)) if now.duration_since(opened_at) >= settings.open_duration => {
                Some(self.transition(BreakerState::HalfOpen, now))
            }
            _ => None,
        }
    }

    fn record_closed(&mut self, failure: bool, settings: &BreakerSettings, now: Instant) -> Option<Transition> {
        if self.window.is_empty() {
            self.window_start = now;
        }
        if self.window.len() >= settings.window_size as usize {
            match self.window.pop_front() {
                Some(true) => self.failure_count -= 1,
                Some(false) => self.success_count -= 1,
                None => {}
            }
        }
        self.window.push_back(failure);
        if failure {
            self.failure_count += 1;
        } else {
            self.success_count += 1;
        }

        if failure && self.failure_count >= settings.failure_threshold {
            Some(self.transition(BreakerState::Open, now))
        } else {
            None
        }
    }
}

/// A named circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    core: Mutex<BreakerCore>,
}

/// Admission ticket for one backend attempt.
///
/// Hand the attempt's outcome back through [`Permit::record`]. A half-open trial
/// permit dropped without a record gives its trial slot back.
#[must_use = "a permit must be settled with the attempt outcome"]
#[derive(Debug)]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    trial: bool,
    settled: bool,
}

impl Permit<'_> {
    /// Whether this permit is one of the half-open trial requests.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    /// Feed the attempt's outcome into the breaker.
    pub fn record(mut self, outcome: &RequestOutcome) {
        self.settled = true;
        self.breaker.on_outcome(self.generation, outcome);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.release_trial(self.generation);
        }
    }
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            core: Mutex::new(BreakerCore::new(Instant::now())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    /// Ask to send one request to the backend.
    ///
    /// Fails with `BreakerOpen` while open, or while half-open once every trial
    /// slot is taken.
    pub fn try_acquire(&self) -> Result<Permit<'_>, GatewayError> {
        let now = Instant::now();
        let (admitted, transition) = {
            let mut core = self.core.lock();
            let transition = core.poll_open_timer(&self.settings, now);
            let admitted = match core.state {
                BreakerState::Closed => Some((core.generation, false)),
                BreakerState::Open => None,
                BreakerState::HalfOpen => {
                    if core.trials_admitted < self.settings.half_open_trial_count {
                        core.trials_admitted += 1;
                        Some((core.generation, true))
                    } else {
                        None
                    }
                }
            };
            (admitted, transition)
        };

        if let Some(t) = transition {
            self.announce(t);
        }

        match admitted {
            Some((generation, trial)) => Ok(Permit {
                breaker: self,
                generation,
                trial,
                settled: false,
            }),
            None => {
                metrics::record_breaker_rejection(&self.name);
                Err(GatewayError::BreakerOpen {
                    name: self.name.clone(),
                })
            }
        }
    }

    fn on_outcome(&self, generation: u64, outcome: &RequestOutcome) {
        let failure = outcome.is_breaker_failure();
        let now = Instant::now();
        let transition = {
            let mut core = self.core.lock();
            if core.generation != generation {
                tracing::trace!(breaker = %self.name, "Ignoring outcome from previous breaker state");
                return;
            }
            match core.state {
                BreakerState::Closed => core.record_closed(failure, &self.settings, now),
                BreakerState::HalfOpen if failure => Some(core.transition(BreakerState::Open, now)),
                BreakerState::HalfOpen => Some(core.transition(BreakerState::Closed, now)),
                // Every transition into Open bumps the generation.
                BreakerState::Open => None,
            }
        };

        if let Some(t) = transition {
            self.announce(t);
        }
    }

    fn release_trial(&self, generation: u64) {
        let mut core = self.core.lock();
        if core.generation == generation && core.state == BreakerState::HalfOpen {
            core.trials_admitted = core.trials_admitted.saturating_sub(1);
        }
    }

    /// Current state, applying the open timer.
    pub fn state(&self) -> BreakerState {
        let (state, transition) = {
            let mut core = self.core.lock();
            let transition = core.poll_open_timer(&self.settings, Instant::now());
            (core.state, transition)
        };
        if let Some(t) = transition {
            self.announce(t);
        }
        state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.state();
        let core = self.core.lock();
        BreakerSnapshot {
            name: self.name.clone(),
            state,
            failure_count: core.failure_count,
            success_count: core.success_count,
            window_len: core.window.len(),
            window_age_ms: millis_since(core.window_start),
            open_for_ms: core.opened_at.map(millis_since),
        }
    }

    fn announce(&self, t: Transition) {
        match t.to {
            BreakerState::Open => tracing::warn!(
                breaker = %self.name,
                from = %t.from,
                open_for = ?self.settings.open_duration,
                "Circuit breaker opened"
            ),
            _ => tracing::info!(
                breaker = %self.name,
                from = %t.from,
                to = %t.to,
                "Circuit breaker state changed"
            ),
        }
        metrics::record_breaker_transition(&self.name, t.from, t.to);
    }
}

fn millis_since(t: Instant) -> u64 {
    u64::try_from(t.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn settings(threshold: u32, window: u32) -> BreakerSettings {
        BreakerSettings {
            failure_threshold: threshold,
            window_size: window,
            open_duration: Duration::from_secs(5),
            half_open_trial_count: 2,
        }
    }

    fn fail() -> RequestOutcome {
        RequestOutcome::unreachable(Duration::ZERO)
    }

    fn ok() -> RequestOutcome {
        RequestOutcome::from_status(StatusCode::OK, Duration::ZERO)
    }

    fn run(cb: &CircuitBreaker, outcome: RequestOutcome) {
        cb.try_acquire().expect("breaker should admit").record(&outcome);
    }

    #[test]
    fn threshold_failures_trip_and_one_less_does_not() {
        for (threshold, window) in [(1, 1), (2, 4), (3, 3), (5, 10)] {
            let cb = CircuitBreaker::new("cb", settings(threshold, window));
            for _ in 0..threshold - 1 {
                run(&cb, fail());
            }
            assert_eq!(cb.state(), BreakerState::Closed, "threshold {threshold} window {window}");

            run(&cb, fail());
            assert_eq!(cb.state(), BreakerState::Open, "threshold {threshold} window {window}");
        }
    }

    #[test]
    fn failures_outside_window_do_not_count() {
        let cb = CircuitBreaker::new("cb", settings(3, 5));
        run(&cb, fail());
        for _ in 0..5 {
            run(&cb, ok());
        }
        run(&cb, fail());
        run(&cb, fail());
        assert_eq!(cb.state(), BreakerState::Closed);
        let snap = cb.snapshot();
        assert_eq!((snap.failure_count, snap.success_count, snap.window_len), (2, 3, 5));

        // interleaved successes do not reset the window
        run(&cb, ok());
        run(&cb, fail());
        assert_eq!(cb.state(), BreakerState::Open);
    }

    #[test]
    fn client_errors_never_trip() {
        let cb = CircuitBreaker::new("cb", settings(1, 1));
        for _ in 0..10 {
            run(&cb, RequestOutcome::from_status(StatusCode::NOT_FOUND, Duration::ZERO));
        }
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn open_rejects_until_duration_then_admits_trials() {
        let cb = CircuitBreaker::new("cb", settings(1, 1));
        run(&cb, fail());

        for _ in 0..50 {
            assert!(matches!(cb.try_acquire(), Err(GatewayError::BreakerOpen { .. })));
        }

        tokio::time::advance(Duration::from_millis(4_999)).await;
        assert!(cb.try_acquire().is_err());

        tokio::time::advance(Duration::from_millis(1)).await;
        let first = cb.try_acquire().unwrap();
        let second = cb.try_acquire().unwrap();
        assert!(first.is_trial() && second.is_trial());
        assert_eq!(cb.state(), BreakerState::HalfOpen);
        assert!(cb.try_acquire().is_err(), "only two trials allowed");

        first.record(&ok());
        assert_eq!(cb.state(), BreakerState::Closed);

        // the second trial belongs to the old generation and is ignored
        second.record(&fail());
        assert_eq!(cb.state(), BreakerState::Closed);
        assert_eq!(cb.snapshot().window_len, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_failure_reopens_and_restarts_timer() {
        let cb = CircuitBreaker::new("cb", settings(1, 1));
        run(&cb, fail());
        tokio::time::advance(Duration::from_secs(5)).await;

        run(&cb, fail());
        assert_eq!(cb.state(), BreakerState::Open);

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(cb.try_acquire().is_err());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cb.try_acquire().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_trial_releases_slot() {
        let mut s = settings(1, 1);
        s.half_open_trial_count = 1;
        let cb = CircuitBreaker::new("cb", s);
        run(&cb, fail());
        tokio::time::advance(Duration::from_secs(5)).await;

        let trial = cb.try_acquire().unwrap();
        assert!(cb.try_acquire().is_err());
        drop(trial);

        let again = cb.try_acquire().unwrap();
        again.record(&ok());
        assert_eq!(cb.state(), BreakerState::Closed);
    }

    #[test]
    fn stale_closed_outcome_after_trip_is_ignored() {
        let cb = CircuitBreaker::new("cb", settings(1, 2));
        let slow = cb.try_acquire().unwrap();
        run(&cb, fail());
        assert_eq!(cb.state(), BreakerState::Open);

        slow.record(&fail());
        let snap = cb.snapshot();
        assert_eq!(snap.state, BreakerState::Open);
        assert_eq!(snap.window_len, 0);
    }

    #[test]
    fn concurrent_failures_leave_consistent_state() {
        use std::sync::Arc;

        let cb = Arc::new(CircuitBreaker::new("cb", settings(10, 10)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cb = cb.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        if let Ok(permit) = cb.try_acquire() {
                            permit.record(&fail());
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snap = cb.snapshot();
        assert_eq!(snap.state, BreakerState::Open);
        assert_eq!(snap.failure_count, 0, "window cleared on trip");
    }
}
