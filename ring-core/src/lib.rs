//! Ring artifact store, orchestrator control loop, distribution service,
//! and minion pull logic (spec.md §2).
//!
//! The ring-builder's partition-assignment algorithm, ring serialization,
//! and the dispersion reporting tool remain external collaborators; see
//! [`builder`] and [`dispersion`] for the seams around them.

pub mod artifact;
pub mod builder;
pub mod dispersion;
pub mod distribution;
pub mod error;
pub mod minion;
pub mod orchestration;

pub use error::{Result, RingError};
