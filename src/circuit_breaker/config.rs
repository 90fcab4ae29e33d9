//! Circuit breaker configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a circuit breaker.
///
/// Deserializes from objects such as
/// `{"failure_threshold": 5, "success_threshold": 2, "timeout_seconds": 60}`;
/// missing fields take their default values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Number of failures before opening the circuit.
    pub failure_threshold: u32,

    /// Number of successes in half-open state to close the circuit.
    pub success_threshold: u32,

    /// How long the circuit stays open after the last failure before a trial call
    /// is admitted. Only whole seconds are significant.
    #[serde(rename = "timeout_seconds", with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the failure threshold (at least 1).
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Sets the success threshold (at least 1).
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold.max(1);
        self
    }

    /// Sets the open timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Creates a configuration that trips early and recovers slowly.
    ///
    /// This configuration:
    /// - Opens after 3 failures
    /// - Keeps circuits open for 120 seconds
    /// - Needs 5 successful trial calls to close
    pub fn strict() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 5,
            timeout: Duration::from_secs(120),
        }
    }

    /// Creates a configuration optimized for high availability.
    ///
    /// This configuration:
    /// - Opens after 10 failures
    /// - Keeps circuits open for 10 seconds
    /// - Closes after a single successful trial call
    pub fn high_availability() -> Self {
        Self {
            failure_threshold: 10,
            success_threshold: 1,
            timeout: Duration::from_secs(10),
        }
    }

    /// Returns the timeout in whole seconds.
    pub fn timeout_secs(&self) -> i64 {
        i64::try_from(self.timeout.as_secs()).unwrap_or(i64::MAX)
    }

    /// Returns a copy with thresholds raised to at least 1.
    pub(crate) fn normalized(&self) -> Self {
        Self {
            failure_threshold: self.failure_threshold.max(1),
            success_threshold: self.success_threshold.max(1),
            timeout: self.timeout,
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
