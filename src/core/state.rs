//! The persisted circuit state value object.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three states of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitStatus {
    /// Calls pass through; failures are counted.
    #[serde(rename = "closed")]
    Closed,
    /// Calls are rejected until the timeout elapses.
    #[serde(rename = "open")]
    Open,
    /// Trial calls are admitted to test recovery.
    #[serde(rename = "half-open")]
    HalfOpen,
}

impl CircuitStatus {
    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half-open",
        }
    }
}

impl Default for CircuitStatus {
    fn default() -> Self {
        Self::Closed
    }
}

impl fmt::Display for CircuitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CircuitStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "closed" => Ok(Self::Closed),
            "open" => Ok(Self::Open),
            "half-open" => Ok(Self::HalfOpen),
            other => Err(format!("unknown circuit state '{other}'")),
        }
    }
}

/// A snapshot of one breaker's state.
///
/// Values are immutable; every change produces a new snapshot which replaces
/// the previous one both in memory and in storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitState {
    service_key: String,
    status: CircuitStatus,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<i64>,
}

impl CircuitState {
    /// Creates a closed state with zero counters.
    pub fn closed(service_key: impl Into<String>) -> Self {
        Self {
            service_key: service_key.into(),
            status: CircuitStatus::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time: None,
        }
    }

    /// Creates a state from its raw parts.
    ///
    /// Failure times at or before the epoch are recorded as second `1`, the
    /// earliest instant the persisted form can tell apart from "no failure".
    pub fn from_parts(
        service_key: impl Into<String>,
        status: CircuitStatus,
        failure_count: u32,
        success_count: u32,
        last_failure_time: Option<i64>,
    ) -> Self {
        Self {
            service_key: service_key.into(),
            status,
            failure_count,
            success_count,
            last_failure_time: last_failure_time.map(failure_instant),
        }
    }

    /// Returns the service key this state belongs to.
    pub fn service_key(&self) -> &str {
        &self.service_key
    }

    /// Returns the current status.
    pub fn status(&self) -> CircuitStatus {
        self.status
    }

    /// Returns the failure counter.
    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Returns the success counter; only meaningful while half-open.
    pub fn success_count(&self) -> u32 {
        self.success_count
    }

    /// Returns the epoch second of the most recent failure, if any.
    pub fn last_failure_time(&self) -> Option<i64> {
        self.last_failure_time
    }

    /// Returns `true` if the circuit is closed.
    pub fn is_closed(&self) -> bool {
        self.status == CircuitStatus::Closed
    }

    /// Returns `true` if the circuit is open.
    pub fn is_open(&self) -> bool {
        self.status == CircuitStatus::Open
    }

    /// Returns `true` if the circuit is half-open.
    pub fn is_half_open(&self) -> bool {
        self.status == CircuitStatus::HalfOpen
    }

    /// Returns a copy with one more failure recorded at `now`.
    pub fn with_failure(&self, now: i64) -> Self {
        Self {
            failure_count: self.failure_count.saturating_add(1),
            last_failure_time: Some(failure_instant(now)),
            ..self.clone()
        }
    }

    /// Returns a copy with one more success recorded.
    pub fn with_success(&self) -> Self {
        Self {
            success_count: self.success_count.saturating_add(1),
            ..self.clone()
        }
    }

    /// Returns a copy with the failure counter reset.
    pub fn with_failures_reset(&self) -> Self {
        Self {
            failure_count: 0,
            ..self.clone()
        }
    }

    /// Returns a copy moved into `status`, resetting counters for the target.
    ///
    /// Entering closed clears both counters; entering open or half-open
    /// clears the success counter. `last_failure_time` is kept.
    pub fn transition_to(&self, status: CircuitStatus) -> Self {
        match status {
            CircuitStatus::Closed => Self {
                status,
                failure_count: 0,
                success_count: 0,
                ..self.clone()
            },
            CircuitStatus::Open | CircuitStatus::HalfOpen => Self {
                status,
                success_count: 0,
                ..self.clone()
            },
        }
    }

    /// Seconds elapsed since the last failure, or `None` if there was none.
    pub fn seconds_since_failure(&self, now: i64) -> Option<i64> {
        self.last_failure_time.map(|t| now.saturating_sub(t))
    }
}

fn failure_instant(epoch_secs: i64) -> i64 {
    epoch_secs.max(1)
}
