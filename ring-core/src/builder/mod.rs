//! The external ring-builder/ring library contract (spec.md §3, §6, §9).
//!
//! Partition assignment, balance computation, and ring (de)serialization are
//! explicitly out of scope — this module only states the interface the
//! orchestrator depends on. [`reference`] is a minimal, genuinely-functioning
//! default adapter (single replica per partition) so the binaries have
//! something concrete to run against; real deployments swap it for an
//! adapter around the actual ring-builder library. [`fixture`] is a
//! deterministic stand-in used exclusively by tests.

pub mod reference;

#[cfg(any(test, feature = "fixture"))]
pub mod fixture;

use std::path::Path;

use ring_model::{DeviceId, DeviceSlot};

/// A loaded, mutable builder snapshot (spec.md §3 "Builder file").
pub trait RingBuilder: Send {
    type Ring: RingArtifact;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Ordered device slots, holes included.
    fn devs(&self) -> &[DeviceSlot];
    fn devs_mut(&mut self) -> &mut [DeviceSlot];

    /// Set by the builder itself when device membership changed since the
    /// last rebalance; cleared by the builder's own bookkeeping on rebalance.
    fn devs_changed(&self) -> bool;

    fn min_part_hours(&self) -> u32;
    fn parts(&self) -> u64;

    /// Wall-clock second partitions were last reassigned.
    fn last_part_moves_epoch(&self) -> i64;

    fn get_balance(&self) -> f64;

    /// Mutate a device's current weight. No-op if `id` does not name a
    /// present device.
    fn set_dev_weight(&mut self, id: DeviceId, weight: f64);

    /// Recompute partition assignment. Returns (partitions moved, new balance).
    fn rebalance(&mut self) -> Result<(u64, f64), Self::Error>;

    /// Produce the ring artifact for the current assignment.
    fn get_ring(&self) -> Self::Ring;

    /// Opaque serialized form persisted to the builder file.
    fn to_bytes(&self) -> Result<Vec<u8>, Self::Error>;
}

/// The binary ring artifact consumed by storage nodes (spec.md §3 "Ring file").
pub trait RingArtifact {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Serialize and write the ring to `path`. Opaque format; only the
    /// bytes-on-disk and their digest matter to this system.
    fn save(&self, path: &Path) -> Result<(), Self::Error>;
}

/// Loads a builder snapshot from its on-disk file.
pub trait BuilderLoader: Send + Sync {
    type Builder: RingBuilder;
    type Error: std::error::Error + Send + Sync + 'static;

    fn load(&self, path: &Path) -> Result<Self::Builder, Self::Error>;
}

/// Validates that bytes at `path` form a usable ring (spec.md §4.1 `validate_ring`).
///
/// `len(devs) >= 1 AND get_part_nodes(1)` is non-empty; any load error maps
/// to `false`, never propagates.
pub trait RingValidator: Send + Sync {
    fn validate(&self, path: &Path) -> bool;
}
