use serde::{Deserialize, Serialize};

/// Stable integer identity of a device within a builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub u64);

/// A single entry in a builder's `devs` sequence.
///
/// The builder's device list may contain holes — slots that once held a
/// device and were vacated rather than compacted away. Those must be
/// skipped everywhere, never treated as a null device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeviceSlot {
    Present(DeviceRecord),
    Hole,
}

impl DeviceSlot {
    pub fn as_present(&self) -> Option<&DeviceRecord> {
        match self {
            DeviceSlot::Present(dev) => Some(dev),
            DeviceSlot::Hole => None,
        }
    }

    pub fn as_present_mut(&mut self) -> Option<&mut DeviceRecord> {
        match self {
            DeviceSlot::Present(dev) => Some(dev),
            DeviceSlot::Hole => None,
        }
    }
}

/// Mapping of recognized fields on a builder's device record (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: DeviceId,
    pub ip: String,
    pub port: u16,
    pub device: String,
    pub zone: u32,
    pub weight: f64,
    /// Absent means the device is not managed by the orchestrator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_weight: Option<f64>,
    /// Per-device override of `default_weight_shift`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_shift: Option<f64>,
}

impl DeviceRecord {
    /// `true` iff this device's weight should converge toward `target_weight`.
    pub fn is_managed(&self) -> bool {
        self.target_weight.is_some()
    }

    pub fn weight_needs_adjustment(&self) -> bool {
        match self.target_weight {
            Some(target) => self.weight != target,
            None => false,
        }
    }

    /// The step size to use in ADJUST, falling back to the orchestrator default.
    pub fn effective_shift(&self, default_weight_shift: f64) -> f64 {
        self.weight_shift.unwrap_or(default_weight_shift)
    }

    /// Apply one bounded step toward `target_weight`, snapping instead of
    /// overshooting (spec.md §4.2.2 step 7).
    ///
    /// No-op if the device isn't managed or already at target.
    pub fn step_toward_target(&mut self, default_weight_shift: f64) {
        let Some(target) = self.target_weight else {
            return;
        };
        if self.weight == target {
            return;
        }
        let shift = self.effective_shift(default_weight_shift);
        if (self.weight - target).abs() <= shift {
            self.weight = target;
        } else if self.weight < target {
            self.weight += shift;
        } else {
            self.weight -= shift;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev(weight: f64, target: f64) -> DeviceRecord {
        DeviceRecord {
            id: DeviceId(0),
            ip: "127.0.0.1".into(),
            port: 6000,
            device: "sdb1".into(),
            zone: 1,
            weight,
            target_weight: Some(target),
            weight_shift: None,
        }
    }

    #[test]
    fn steps_by_shift_then_snaps() {
        let mut d = dev(100.0, 110.0);
        d.step_toward_target(5.0);
        assert_eq!(d.weight, 105.0);
        d.step_toward_target(5.0);
        assert_eq!(d.weight, 110.0);
        d.step_toward_target(5.0);
        assert_eq!(d.weight, 110.0); // idempotent once converged
    }

    #[test]
    fn steps_rather_than_snaps_when_gap_exceeds_shift() {
        // gap (7) > shift (5): steps to 105, does not snap to 107.
        let mut d = dev(100.0, 107.0);
        d.step_toward_target(5.0);
        assert_eq!(d.weight, 105.0);
    }

    #[test]
    fn snaps_on_overshoot_without_intermediate_step() {
        // gap (5) <= shift (7): snaps straight to the target.
        let mut d = dev(100.0, 105.0);
        d.step_toward_target(7.0);
        assert_eq!(d.weight, 105.0);
    }

    #[test]
    fn steps_downward_toward_a_lower_target() {
        let mut d = dev(100.0, 80.0);
        d.step_toward_target(10.0);
        assert_eq!(d.weight, 90.0);
    }

    #[test]
    fn unmanaged_device_is_left_alone() {
        let mut d = DeviceRecord {
            id: DeviceId(1),
            ip: "127.0.0.1".into(),
            port: 6000,
            device: "sdb1".into(),
            zone: 1,
            weight: 100.0,
            target_weight: None,
            weight_shift: None,
        };
        d.step_toward_target(5.0);
        assert_eq!(d.weight, 100.0);
        assert!(!d.is_managed());
        assert!(!d.weight_needs_adjustment());
    }

    #[test]
    fn hole_has_no_present_record() {
        let slot = DeviceSlot::Hole;
        assert!(slot.as_present().is_none());
    }
}
