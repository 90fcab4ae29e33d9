//! Persistence of circuit states on top of a storage adapter.

#[allow(clippy::module_inception)]
mod repository;
mod serializer;

pub use repository::CircuitStateRepository;
pub use serializer::{JsonStateSerializer, StateSerializer};
