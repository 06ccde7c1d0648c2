use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Recognized configuration options for the orchestrator (spec.md §4.2.1).
///
/// Defaults mirror the original `ringmasterd.conf` defaults so operators
/// migrating a deployment get the same behavior out of the box.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Per-cycle maximum change in a device's weight when converging to target.
    pub default_weight_shift: f64,
    /// Maximum acceptable ring balance; above this, rebalance without modification.
    pub balance_threshold: f64,
    /// Builder-file mtime must be older than this before orchestration acts.
    pub min_seconds_since_change: u64,
    /// Toggle enforcing the `min_part_hours` gate.
    pub min_part_hours_check: bool,
    pub container_min_pct: f64,
    pub object_min_pct: f64,
    /// Sleep after a no-op cycle, seconds.
    pub interval: u64,
    /// Sleep after a cycle that produced or attempted ring changes, seconds.
    pub change_interval: u64,
    /// Seconds to wait on the parent-directory lock.
    pub lock_timeout: u64,
    pub pause_file_path: PathBuf,
    pub backup_dir: PathBuf,
    pub dispersion_cmd: String,
    /// Root directory containing the three builder/ring files.
    pub swiftdir: PathBuf,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_weight_shift: 25.0,
            balance_threshold: 2.0,
            min_seconds_since_change: 120,
            min_part_hours_check: false,
            container_min_pct: 99.75,
            object_min_pct: 99.75,
            interval: 120,
            change_interval: 3600,
            lock_timeout: 90,
            pause_file_path: PathBuf::from("/tmp/.srm-pause"),
            backup_dir: PathBuf::from("/etc/swift/backups"),
            dispersion_cmd: "/usr/bin/swift-dispersion-report".into(),
            swiftdir: PathBuf::from("/etc/swift"),
        }
    }
}

impl OrchestratorConfig {
    pub fn min_pct_for(&self, kind: ring_model::RingKind) -> f64 {
        match kind {
            ring_model::RingKind::Container => self.container_min_pct,
            ring_model::RingKind::Object => self.object_min_pct,
            ring_model::RingKind::Account => 0.0,
        }
    }

    pub fn builder_path(&self, kind: ring_model::RingKind) -> PathBuf {
        self.swiftdir.join(kind.builder_filename())
    }

    pub fn ring_path(&self, kind: ring_model::RingKind) -> PathBuf {
        self.swiftdir.join(kind.ring_filename())
    }
}
