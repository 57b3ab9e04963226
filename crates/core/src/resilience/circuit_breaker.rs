//! Per-target circuit breaker over a count-based rolling window.
//!
//! State and counters for one breaker sit behind a single mutex, so deciding
//! a transition and applying it is one atomic step. Every transition bumps a
//! generation; outcomes reported for permits issued under an older generation
//! are discarded, which keeps one window observation from tripping twice.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CircuitBreakerPolicy {
    /// Number of most recent outcomes kept while closed.
    pub window_size: usize,
    /// Outcomes required in the window before the failure rate is evaluated.
    pub minimum_calls: usize,
    /// Failure rate in percent at or above which the breaker opens.
    pub failure_rate_threshold: f64,
    pub open_cooldown: Duration,
}

impl Default for CircuitBreakerPolicy {
    fn default() -> Self {
        Self {
            window_size: 10,
            minimum_calls: 5,
            failure_rate_threshold: 50.0,
            open_cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Failure,
}

/// Returned instead of a permit while the breaker rejects calls.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("circuit for `{target}` is {state:?}")]
pub struct CircuitRejected {
    pub target: String,
    pub state: CircuitState,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CircuitSnapshot {
    pub target: String,
    pub state: CircuitState,
    pub buffered_calls: usize,
    pub failure_rate: f64,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    generation: u64,
    window: VecDeque<CallOutcome>,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl BreakerInner {
    fn failure_rate(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let failures = self.window.iter().filter(|o| **o == CallOutcome::Failure).count();
        failures as f64 * 100.0 / self.window.len() as f64
    }

    fn move_to(&mut self, state: CircuitState, now: Instant) {
        self.state = state;
        self.generation += 1;
        self.window.clear();
        self.trial_in_flight = false;
        self.opened_at = (state == CircuitState::Open).then_some(now);
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    target: String,
    policy: CircuitBreakerPolicy,
    inner: Mutex<BreakerInner>,
}

/// Admission to make one call. Report the outcome with [`CallPermit::record`];
/// a permit dropped unreported only frees the half-open trial slot.
#[must_use = "a permit must be settled with `record`"]
#[derive(Debug)]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    trial: bool,
    settled: bool,
}

impl CallPermit<'_> {
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn record(mut self, outcome: CallOutcome) {
        self.settled = true;
        self.breaker.settle(self.generation, self.trial, outcome);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.release_trial(self.generation);
        }
    }
}

impl CircuitBreaker {
    pub fn new(target: impl Into<String>, policy: CircuitBreakerPolicy) -> Self {
        Self {
            target: target.into(),
            policy,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                generation: 0,
                window: VecDeque::new(),
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.inner.lock();
        CircuitSnapshot {
            target: self.target.clone(),
            state: inner.state,
            buffered_calls: inner.window.len(),
            failure_rate: inner.failure_rate(),
        }
    }

    pub fn try_acquire(&self) -> Result<CallPermit<'_>, CircuitRejected> {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        match inner.state {
            CircuitState::Closed => Ok(self.permit(inner.generation, false)),
            CircuitState::Open => {
                let cooled_down = inner
                    .opened_at
                    .map(|opened_at| now.duration_since(opened_at) >= self.policy.open_cooldown)
                    .unwrap_or(true);
                if !cooled_down {
                    return Err(self.rejected(CircuitState::Open));
                }

                inner.move_to(CircuitState::HalfOpen, now);
                inner.trial_in_flight = true;
                info!(
                    event_name = "gateway.circuit.half_open",
                    target = %self.target,
                    "cool-down elapsed, admitting trial call"
                );
                Ok(self.permit(inner.generation, true))
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return Err(self.rejected(CircuitState::HalfOpen));
                }
                inner.trial_in_flight = true;
                Ok(self.permit(inner.generation, true))
            }
        }
    }

    /// Runs `operation` under a permit, classifying `Err` as a failure.
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<Result<T, E>, CircuitRejected>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let permit = self.try_acquire()?;
        let result = operation().await;
        let outcome = if result.is_ok() { CallOutcome::Success } else { CallOutcome::Failure };
        permit.record(outcome);
        Ok(result)
    }

    fn permit(&self, generation: u64, trial: bool) -> CallPermit<'_> {
        CallPermit { breaker: self, generation, trial, settled: false }
    }

    fn rejected(&self, state: CircuitState) -> CircuitRejected {
        CircuitRejected { target: self.target.clone(), state }
    }

    fn settle(&self, generation: u64, trial: bool, outcome: CallOutcome) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return;
        }
        let now = Instant::now();

        match inner.state {
            CircuitState::Closed => {
                inner.window.push_back(outcome);
                while inner.window.len() > self.policy.window_size {
                    inner.window.pop_front();
                }

                let failure_rate = inner.failure_rate();
                if inner.window.len() >= self.policy.minimum_calls
                    && failure_rate >= self.policy.failure_rate_threshold
                {
                    let buffered_calls = inner.window.len();
                    inner.move_to(CircuitState::Open, now);
                    warn!(
                        event_name = "gateway.circuit.opened",
                        target = %self.target,
                        failure_rate,
                        buffered_calls,
                        cooldown_ms = self.policy.open_cooldown.as_millis() as u64,
                        "failure rate crossed threshold, opening circuit"
                    );
                }
            }
            CircuitState::HalfOpen if trial => match outcome {
                CallOutcome::Success => {
                    inner.move_to(CircuitState::Closed, now);
                    info!(
                        event_name = "gateway.circuit.closed",
                        target = %self.target,
                        "trial call succeeded, closing circuit"
                    );
                }
                CallOutcome::Failure => {
                    inner.move_to(CircuitState::Open, now);
                    warn!(
                        event_name = "gateway.circuit.reopened",
                        target = %self.target,
                        "trial call failed, reopening circuit"
                    );
                }
            },
            CircuitState::HalfOpen | CircuitState::Open => {}
        }
    }

    fn release_trial(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation == generation && inner.state == CircuitState::HalfOpen {
            inner.trial_in_flight = false;
        }
    }
}
