//! Breaker lifecycle signals.
//!
//! The breaker reports every call outcome and every state transition to an
//! [`EventSink`]. [`TracingEventSink`] turns them into structured `tracing`
//! records that any subscriber (JSON file, OpenTelemetry, ...) can capture;
//! other sinks can fan events out further.

mod events;

pub use events::{
    BreakerEvent, BreakerEventKind, EventSink, NoOpEventSink, RecordingEventSink,
    TracingEventSink,
};
