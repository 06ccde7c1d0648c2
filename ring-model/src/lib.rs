//! Shared data types for the ring orchestration suite.
//!
//! This crate carries no I/O and no business logic — just the types that
//! the master, distributor, and minion all need to agree on.

mod device;
mod kind;

pub use device::{DeviceId, DeviceRecord, DeviceSlot};
pub use kind::RingKind;
