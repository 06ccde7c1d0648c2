use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Minion configuration (spec.md §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MinionConfig {
    /// Destination directory for installed ring files.
    pub swiftdir: PathBuf,
    /// URL prefix the minion fetches `ring/<name>` under, e.g. `http://master:8090/`.
    pub ring_master: String,
    /// Seconds to sleep between full passes over all configured ring kinds.
    pub check_interval: u64,
    /// Upper bound (exclusive) of the uniformly random startup jitter, seconds.
    pub start_delay_range: u64,
    /// HTTP request timeout, seconds.
    pub ring_master_timeout: u64,
}

impl Default for MinionConfig {
    fn default() -> Self {
        Self {
            swiftdir: PathBuf::from("/etc/swift"),
            ring_master: "http://127.0.0.1:8090/".into(),
            check_interval: 30,
            start_delay_range: 120,
            ring_master_timeout: 300,
        }
    }
}

impl MinionConfig {
    pub fn ring_path(&self, kind: ring_model::RingKind) -> PathBuf {
        self.swiftdir.join(kind.ring_filename())
    }

    pub fn ring_url(&self, kind: ring_model::RingKind) -> String {
        format!(
            "{}ring/{}",
            self.ring_master.trim_end_matches('/').to_string() + "/",
            kind.ring_filename()
        )
    }
}
