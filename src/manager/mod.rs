//! Breaker registry.
//!
//! A [`BreakerRegistry`] is an explicit, per-process map from service key
//! to breaker. It is passed around by reference; there is no global
//! instance.

mod registry;

pub use registry::BreakerRegistry;
