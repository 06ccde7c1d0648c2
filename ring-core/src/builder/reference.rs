//! Minimal reference implementation of [`RingBuilder`]/[`RingArtifact`],
//! used by the `ring-master`/`ring-minion` binaries in the absence of a
//! real ring-builder library dependency (spec.md §1 treats partition
//! assignment as an external collaborator with a fixed contract; this is
//! the bundled default that satisfies that contract well enough to run
//! end-to-end, not a reimplementation of any specific algorithm).
//!
//! Builder files are persisted as JSON; ring files are a JSON-encoded
//! partition table. Both are opaque to the rest of the system (spec.md §9
//! "do not attempt to reimplement the serialization format" applies to
//! *this* format too — orchestrator, distributor, and minion never parse
//! ring bytes, only transfer and digest them). This adapter assigns a
//! single replica per partition; a real multi-replica ring-builder plugs
//! in behind the same trait.

use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use ring_model::{DeviceId, DeviceRecord, DeviceSlot};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{BuilderLoader, RingArtifact, RingBuilder, RingValidator};

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed builder file: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonBuilder {
    devs: Vec<DeviceSlot>,
    devs_changed: bool,
    min_part_hours: u32,
    parts: u64,
    last_part_moves_epoch: i64,
    /// Partition index -> owning device id, from the last successful
    /// rebalance. Empty before the first one.
    assignment: Vec<DeviceId>,
}

impl JsonBuilder {
    pub fn new(devs: Vec<DeviceSlot>, parts: u64, min_part_hours: u32) -> Self {
        Self {
            devs,
            devs_changed: true,
            min_part_hours,
            parts,
            last_part_moves_epoch: 0,
            assignment: Vec::new(),
        }
    }

    fn present_devices(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devs.iter().filter_map(DeviceSlot::as_present)
    }

    fn balance_of(&self, assignment: &[DeviceId]) -> f64 {
        if assignment.len() != self.parts as usize {
            return 100.0;
        }
        let total_weight: f64 = self.present_devices().map(|d| d.weight).sum();
        if total_weight <= 0.0 {
            return 0.0;
        }

        let mut worst: f64 = 0.0;
        for dev in self.present_devices() {
            if dev.weight <= 0.0 {
                continue;
            }
            let ideal_fraction = dev.weight / total_weight;
            let actual = assignment.iter().filter(|id| **id == dev.id).count() as f64;
            let actual_fraction = actual / assignment.len() as f64;
            let deviation = ((actual_fraction - ideal_fraction) / ideal_fraction).abs() * 100.0;
            worst = worst.max(deviation);
        }
        worst
    }

    /// Deterministic weighted assignment: partitions are handed out in
    /// cumulative-weight order, so each device's share of partitions tracks
    /// its share of total weight.
    fn assign(&self) -> Vec<DeviceId> {
        let candidates: Vec<&DeviceRecord> = self.present_devices().filter(|d| d.weight > 0.0).collect();
        let total_weight: f64 = candidates.iter().map(|d| d.weight).sum();
        if candidates.is_empty() || total_weight <= 0.0 {
            return Vec::new();
        }

        let mut thresholds = Vec::with_capacity(candidates.len());
        let mut cumulative = 0.0;
        for dev in &candidates {
            cumulative += dev.weight / total_weight;
            thresholds.push((cumulative, dev.id));
        }

        (0..self.parts)
            .map(|p| {
                let fraction = (p as f64 + 0.5) / self.parts as f64;
                thresholds
                    .iter()
                    .find(|(threshold, _)| fraction <= *threshold)
                    .map(|(_, id)| *id)
                    .unwrap_or(thresholds.last().unwrap().1)
            })
            .collect()
    }
}

impl RingBuilder for JsonBuilder {
    type Ring = JsonRing;
    type Error = ReferenceError;

    fn devs(&self) -> &[DeviceSlot] {
        &self.devs
    }

    fn devs_mut(&mut self) -> &mut [DeviceSlot] {
        &mut self.devs
    }

    fn devs_changed(&self) -> bool {
        self.devs_changed
    }

    fn min_part_hours(&self) -> u32 {
        self.min_part_hours
    }

    fn parts(&self) -> u64 {
        self.parts
    }

    fn last_part_moves_epoch(&self) -> i64 {
        self.last_part_moves_epoch
    }

    fn get_balance(&self) -> f64 {
        self.balance_of(&self.assignment)
    }

    fn set_dev_weight(&mut self, id: DeviceId, weight: f64) {
        for slot in self.devs.iter_mut() {
            if let DeviceSlot::Present(dev) = slot {
                if dev.id == id {
                    dev.weight = weight;
                }
            }
        }
    }

    fn rebalance(&mut self) -> Result<(u64, f64), Self::Error> {
        let new_assignment = self.assign();
        let parts_moved = new_assignment
            .iter()
            .enumerate()
            .filter(|(p, id)| self.assignment.get(*p) != Some(*id))
            .count() as u64;

        self.assignment = new_assignment;
        self.devs_changed = false;
        self.last_part_moves_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let new_balance = self.balance_of(&self.assignment);
        Ok((parts_moved, new_balance))
    }

    fn get_ring(&self) -> Self::Ring {
        JsonRing {
            assignment: self.assignment.clone(),
            devices: self.devs.iter().filter_map(DeviceSlot::as_present).cloned().collect(),
        }
    }

    fn to_bytes(&self) -> Result<Vec<u8>, Self::Error> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRing {
    assignment: Vec<DeviceId>,
    devices: Vec<DeviceRecord>,
}

impl JsonRing {
    /// Devices holding partition `partition` (single replica in this
    /// reference implementation).
    pub fn get_part_nodes(&self, partition: u64) -> Vec<&DeviceRecord> {
        match self.assignment.get(partition as usize) {
            Some(id) => self.devices.iter().filter(|d| d.id == *id).collect(),
            None => Vec::new(),
        }
    }
}

impl RingArtifact for JsonRing {
    type Error = ReferenceError;

    fn save(&self, path: &Path) -> Result<(), Self::Error> {
        fs::write(path, serde_json::to_vec(self)?)?;
        Ok(())
    }
}

/// Loads a [`JsonBuilder`] from its on-disk JSON form.
pub struct JsonBuilderLoader;

impl BuilderLoader for JsonBuilderLoader {
    type Builder = JsonBuilder;
    type Error = ReferenceError;

    fn load(&self, path: &Path) -> Result<Self::Builder, Self::Error> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Validates a ring file per spec.md §4.1: at least one device, and
/// partition 1 resolves to a non-empty replica list.
pub struct JsonRingValidator;

impl RingValidator for JsonRingValidator {
    fn validate(&self, path: &Path) -> bool {
        let Ok(bytes) = fs::read(path) else {
            return false;
        };
        let Ok(ring): Result<JsonRing, _> = serde_json::from_slice(&bytes) else {
            return false;
        };
        !ring.devices.is_empty() && !ring.get_part_nodes(1).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev(id: u64, weight: f64) -> DeviceSlot {
        DeviceSlot::Present(DeviceRecord {
            id: DeviceId(id),
            ip: "127.0.0.1".into(),
            port: 6000,
            device: format!("sd{id}"),
            zone: 1,
            weight,
            target_weight: None,
            weight_shift: None,
        })
    }

    #[test]
    fn rebalance_assigns_every_partition_and_reports_balance() {
        let mut builder = JsonBuilder::new(vec![dev(1, 100.0), dev(2, 100.0)], 256, 1);
        let (parts_moved, balance) = builder.rebalance().unwrap();
        assert_eq!(parts_moved, 256);
        assert!(balance < 5.0, "two equal-weight devices should balance tightly, got {balance}");

        let ring = builder.get_ring();
        assert_eq!(ring.get_part_nodes(1).len(), 1);
    }

    #[test]
    fn second_rebalance_with_no_changes_moves_nothing() {
        let mut builder = JsonBuilder::new(vec![dev(1, 100.0), dev(2, 100.0)], 64, 1);
        builder.rebalance().unwrap();
        let (parts_moved, _) = builder.rebalance().unwrap();
        assert_eq!(parts_moved, 0);
    }

    #[test]
    fn validator_rejects_ring_with_no_devices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("account.ring.gz");
        let empty = JsonRing {
            assignment: vec![],
            devices: vec![],
        };
        empty.save(&path).unwrap();
        assert!(!JsonRingValidator.validate(&path));
    }

    #[test]
    fn validator_accepts_populated_ring() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("account.ring.gz");
        let mut builder = JsonBuilder::new(vec![dev(1, 100.0)], 8, 1);
        builder.rebalance().unwrap();
        builder.get_ring().save(&path).unwrap();
        assert!(JsonRingValidator.validate(&path));
    }
}
