//! A deterministic in-memory builder/ring used only by tests. It
//! implements just enough of the real builder semantics (balance,
//! rebalance, device weights) to exercise the orchestrator's state
//! machine without depending on the real partition-assignment
//! algorithm, which is explicitly out of scope.

use std::convert::Infallible;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use ring_model::{DeviceId, DeviceSlot};

use super::{RingArtifact, RingBuilder, RingValidator};

#[derive(Debug, Clone)]
pub struct FixtureBuilder {
    pub devs: Vec<DeviceSlot>,
    pub devs_changed: bool,
    pub min_part_hours: u32,
    pub parts: u64,
    pub last_part_moves_epoch: i64,
    /// Balance reported before the next `rebalance()` call.
    pub pending_balance: f64,
    /// Balance `rebalance()` will report going forward.
    pub post_rebalance_balance: f64,
    /// Partitions `rebalance()` reports moving. Zero simulates a no-op.
    pub parts_to_move: u64,
}

impl FixtureBuilder {
    pub fn new(devs: Vec<DeviceSlot>) -> Self {
        Self {
            devs,
            devs_changed: false,
            min_part_hours: 1,
            parts: 1024,
            last_part_moves_epoch: 0,
            pending_balance: 0.0,
            post_rebalance_balance: 0.0,
            parts_to_move: 1,
        }
    }
}

fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl RingBuilder for FixtureBuilder {
    type Ring = FixtureRing;
    type Error = Infallible;

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
        self.pending_balance
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
        self.pending_balance = self.post_rebalance_balance;
        self.devs_changed = false;
        self.last_part_moves_epoch = now_epoch_secs();
        Ok((self.parts_to_move, self.post_rebalance_balance))
    }

    fn get_ring(&self) -> Self::Ring {
        FixtureRing {
            device_count: self
                .devs
                .iter()
                .filter(|s| matches!(s, DeviceSlot::Present(_)))
                .count(),
        }
    }

    fn to_bytes(&self) -> Result<Vec<u8>, Self::Error> {
        Ok(format!("{:?}", self.devs).into_bytes())
    }
}

#[derive(Debug, Clone)]
pub struct FixtureRing {
    pub device_count: usize,
}

impl RingArtifact for FixtureRing {
    type Error = std::io::Error;

    fn save(&self, path: &Path) -> Result<(), Self::Error> {
        // Opaque on-disk encoding: device count followed by a marker byte.
        // Real deployments delegate to the builder library's serializer.
        let mut bytes = vec![self.device_count as u8];
        bytes.extend_from_slice(b"RINGFIXTURE");
        fs::write(path, bytes)
    }
}

pub struct FixtureValidator;

impl RingValidator for FixtureValidator {
    fn validate(&self, path: &Path) -> bool {
        match fs::read(path) {
            Ok(bytes) => bytes.first().map(|&n| n >= 1).unwrap_or(false) && bytes.len() > 1,
            Err(_) => false,
        }
    }
}
