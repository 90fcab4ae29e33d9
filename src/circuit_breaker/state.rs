//! Circuit breaker state machine.
//!
//! The functions here are pure: they take the current snapshot and return
//! the next one. The breaker applies, persists and reports the result.

use crate::circuit_breaker::config::CircuitBreakerConfig;
use crate::core::state::{CircuitState, CircuitStatus};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of asking whether a call may run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Admission {
    /// The call may run against this state.
    Allowed(CircuitState),
    /// The circuit is open and the timeout has not elapsed.
    Rejected {
        /// Time left until a trial call is admitted.
        retry_after: Option<Duration>,
    },
}

/// Decides whether a call may run at `now`.
///
/// An open circuit whose timeout has elapsed (or that never recorded a
/// failure time) moves to half-open and admits the call.
pub(crate) fn admit(state: &CircuitState, config: &CircuitBreakerConfig, now: i64) -> Admission {
    match state.status() {
        CircuitStatus::Closed | CircuitStatus::HalfOpen => Admission::Allowed(state.clone()),
        CircuitStatus::Open => match state.seconds_since_failure(now) {
            Some(elapsed) if elapsed < config.timeout_secs() => {
                let remaining = config.timeout_secs().saturating_sub(elapsed);
                Admission::Rejected {
                    retry_after: u64::try_from(remaining).ok().map(Duration::from_secs),
                }
            }
            _ => Admission::Allowed(state.transition_to(CircuitStatus::HalfOpen)),
        },
    }
}

/// Returns the state after a successful call.
pub(crate) fn on_success(state: &CircuitState, config: &CircuitBreakerConfig) -> CircuitState {
    match state.status() {
        CircuitStatus::Closed => state.with_failures_reset(),
        CircuitStatus::HalfOpen => {
            let next = state.with_success();
            if next.success_count() >= config.success_threshold {
                next.transition_to(CircuitStatus::Closed)
            } else {
                next
            }
        }
        // Outcome of a call admitted before another caller opened the circuit.
        CircuitStatus::Open => state.clone(),
    }
}

/// Returns the state after a failed call at `now`.
pub(crate) fn on_failure(
    state: &CircuitState,
    config: &CircuitBreakerConfig,
    now: i64,
) -> CircuitState {
    match state.status() {
        CircuitStatus::Closed => {
            let next = state.with_failure(now);
            if next.failure_count() >= config.failure_threshold {
                next.transition_to(CircuitStatus::Open)
            } else {
                next
            }
        }
        CircuitStatus::HalfOpen => state.with_failure(now).transition_to(CircuitStatus::Open),
        CircuitStatus::Open => state.with_failure(now),
    }
}

/// Returns an open state whose timeout starts at `now`.
pub(crate) fn forced_open(state: &CircuitState, now: i64) -> CircuitState {
    CircuitState::from_parts(
        state.service_key(),
        CircuitStatus::Open,
        state.failure_count(),
        0,
        Some(now),
    )
}

/// In-process statistics about breaker behavior.
///
/// Unlike [`CircuitState`] these are not persisted and start at zero on
/// every construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BreakerMetrics {
    /// Total number of calls, rejected ones included.
    pub total_requests: u64,
    /// Number of successful calls.
    pub successful_requests: u64,
    /// Number of failed calls.
    pub failed_requests: u64,
    /// Number of calls rejected due to open circuit.
    pub rejected_requests: u64,
    /// Number of fallbacks invoked.
    pub fallbacks_invoked: u64,
    /// Number of times the circuit has opened.
    pub times_opened: u64,
    /// Number of times the circuit has closed.
    pub times_closed: u64,
}

impl BreakerMetrics {
    /// Creates new empty metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful request.
    pub fn record_success(&mut self) {
        self.total_requests += 1;
        self.successful_requests += 1;
    }

    /// Records a failed request.
    pub fn record_failure(&mut self) {
        self.total_requests += 1;
        self.failed_requests += 1;
    }

    /// Records a rejected request.
    pub fn record_rejected(&mut self) {
        self.total_requests += 1;
        self.rejected_requests += 1;
    }

    /// Records an invoked fallback.
    pub fn record_fallback(&mut self) {
        self.fallbacks_invoked += 1;
    }

    /// Records a transition between states.
    pub fn record_transition(&mut self, to: CircuitStatus) {
        match to {
            CircuitStatus::Open => self.times_opened += 1,
            CircuitStatus::Closed => self.times_closed += 1,
            CircuitStatus::HalfOpen => {}
        }
    }

    /// Returns the success rate (0.0 to 1.0).
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 1.0;
        }
        self.successful_requests as f64 / self.total_requests as f64
    }

    /// Returns the failure rate (0.0 to 1.0).
    pub fn failure_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.failed_requests as f64 / self.total_requests as f64
    }
}
