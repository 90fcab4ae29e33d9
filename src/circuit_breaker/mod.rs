//! Persistent circuit breaker.
//!
//! The circuit breaker pattern prevents cascading failures by temporarily
//! stopping traffic to a failing dependency and periodically probing it to
//! detect recovery. Here the breaker's state is written through a
//! [`CircuitStateRepository`](crate::CircuitStateRepository) on every
//! change, so an open circuit stays open across restarts.
//!
//! ## States
//!
//! - **Closed**: Normal operation; calls pass through.
//! - **Open**: The dependency is failing; calls are rejected immediately.
//! - **Half-Open**: Probing the dependency to see if it has recovered.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use durable_breaker::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! let config = CircuitBreakerConfig::default()
//!     .with_failure_threshold(5)
//!     .with_timeout(Duration::from_secs(30));
//!
//! let breaker = CircuitBreaker::builder("search-api")
//!     .config(config)
//!     .repository(repository)
//!     .build()
//!     .await?;
//! ```

mod breaker;
mod config;
mod state;

pub use breaker::{CircuitBreaker, CircuitBreakerBuilder};
pub use config::CircuitBreakerConfig;
pub use state::BreakerMetrics;
