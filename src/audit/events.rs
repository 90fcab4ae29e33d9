//! Breaker lifecycle events and sinks.

use crate::core::state::{CircuitState, CircuitStatus};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Mutex;
use uuid::Uuid;

/// What happened to a breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BreakerEventKind {
    /// The protected operation succeeded.
    CallSucceeded,
    /// The protected operation failed.
    CallFailed {
        /// Display form of the operation's error.
        error: String,
    },
    /// The breaker rejected a call without running it.
    CallRejected,
    /// The breaker moved between states.
    StateChanged {
        /// State before the transition.
        from: CircuitStatus,
        /// State after the transition.
        to: CircuitStatus,
    },
    /// A caller-supplied fallback ran.
    FallbackInvoked {
        /// Display form of the error that triggered it.
        error: String,
    },
}

impl BreakerEventKind {
    /// Returns the signal name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CallSucceeded => "call_succeeded",
            Self::CallFailed { .. } => "call_failed",
            Self::CallRejected => "call_rejected",
            Self::StateChanged { .. } => "state_changed",
            Self::FallbackInvoked { .. } => "fallback_invoked",
        }
    }
}

/// A lifecycle signal carrying the breaker's snapshot at emission time.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerEvent {
    /// Unique event ID.
    pub id: Uuid,
    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    #[serde(flatten)]
    pub kind: BreakerEventKind,
    /// The breaker's state after the event.
    pub state: CircuitState,
}

impl BreakerEvent {
    /// Creates an event for `state`.
    pub fn new(kind: BreakerEventKind, state: CircuitState) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
            state,
        }
    }

    /// Returns the signal name.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Receives breaker lifecycle events.
///
/// Sinks must not fail the caller: the breaker's decisions never depend on
/// what a sink does with an event.
pub trait EventSink: Send + Sync + Debug {
    /// Handles one event.
    fn emit(&self, event: &BreakerEvent);
}

/// Emits events as structured `tracing` records under the
/// `durable_breaker::events` target.
///
/// State changes are logged at `info` (`warn` when the circuit opens),
/// call outcomes at `debug`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &BreakerEvent) {
        let state = &event.state;
        match &event.kind {
            BreakerEventKind::StateChanged { from, to } => {
                if *to == CircuitStatus::Open {
                    tracing::warn!(
                        target: "durable_breaker::events",
                        event_type = event.name(),
                        event_id = %event.id,
                        service = %state.service_key(),
                        from = %from,
                        to = %to,
                        failure_count = state.failure_count(),
                        last_failure_time = ?state.last_failure_time(),
                        "Circuit opened"
                    );
                } else {
                    tracing::info!(
                        target: "durable_breaker::events",
                        event_type = event.name(),
                        event_id = %event.id,
                        service = %state.service_key(),
                        from = %from,
                        to = %to,
                        failure_count = state.failure_count(),
                        success_count = state.success_count(),
                        "Circuit state changed"
                    );
                }
            }
            BreakerEventKind::CallFailed { error } | BreakerEventKind::FallbackInvoked { error } => {
                tracing::debug!(
                    target: "durable_breaker::events",
                    event_type = event.name(),
                    event_id = %event.id,
                    service = %state.service_key(),
                    state = %state.status(),
                    failure_count = state.failure_count(),
                    success_count = state.success_count(),
                    error = %error,
                    "Breaker event"
                );
            }
            BreakerEventKind::CallSucceeded | BreakerEventKind::CallRejected => {
                tracing::debug!(
                    target: "durable_breaker::events",
                    event_type = event.name(),
                    event_id = %event.id,
                    service = %state.service_key(),
                    state = %state.status(),
                    failure_count = state.failure_count(),
                    success_count = state.success_count(),
                    "Breaker event"
                );
            }
        }
    }
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn emit(&self, _event: &BreakerEvent) {}
}

/// Keeps every event in memory for inspection.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<BreakerEvent>>,
}

impl RecordingEventSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every recorded event.
    pub fn events(&self) -> Vec<BreakerEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Returns the signal names in emission order.
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(BreakerEvent::name).collect()
    }

    /// Returns every recorded `(from, to)` transition.
    pub fn transitions(&self) -> Vec<(CircuitStatus, CircuitStatus)> {
        self.events()
            .iter()
            .filter_map(|e| match e.kind {
                BreakerEventKind::StateChanged { from, to } => Some((from, to)),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: &BreakerEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}
