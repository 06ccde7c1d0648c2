use std::net::SocketAddr;
use std::path::PathBuf;

use ring_core::orchestration::OrchestratorConfig;
use serde::{Deserialize, Serialize};

/// `ring-master.toml`: the orchestrator tunables (spec.md §4.2.1) plus the
/// Distribution Service's bind address and this binary's pidfile location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    #[serde(flatten)]
    pub orchestrator: OrchestratorConfig,
    /// Distribution Service bind address (spec.md §6 default `0.0.0.0:8090`).
    pub bind: SocketAddr,
    pub pid_path: PathBuf,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            bind: "0.0.0.0:8090".parse().unwrap(),
            pid_path: PathBuf::from("/var/run/ring-master.pid"),
        }
    }
}
