//! The Minion pull agent (spec.md §4.4): periodically polls the
//! Distribution Service for each configured ring kind and installs
//! validated updates locally.

mod client;
mod config;

pub use client::{fetch_and_install, log_failure, startup_jitter, FetchOutcome};
pub use config::MinionConfig;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use ring_model::RingKind;
use tracing::info;

use crate::artifact::ArtifactStore;
use crate::builder::RingValidator;

/// Drives the minion's watch loop. Holds the per-kind cached digest so
/// repeated cycles send `If-None-Match` and avoid re-downloading an
/// unchanged ring.
pub struct Minion {
    config: MinionConfig,
    client: reqwest::Client,
    store: ArtifactStore,
    validator: Box<dyn RingValidator>,
    cached_digests: Mutex<HashMap<RingKind, String>>,
}

impl Minion {
    pub fn new(config: MinionConfig, validator: Box<dyn RingValidator>) -> Self {
        let backup_dir = config.swiftdir.join("backups");
        Self {
            client: reqwest::Client::new(),
            store: ArtifactStore::new(backup_dir),
            validator,
            cached_digests: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// One pass over all ring kinds (spec.md §4.4 steps 1-3). Used by both
    /// the watch loop and `--once` mode.
    pub async fn run_once(&self) {
        for kind in RingKind::ALL {
            let cached = self
                .cached_digests
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .get(&kind)
                .cloned();

            match client::fetch_and_install(
                &self.client,
                &self.config,
                &self.store,
                self.validator.as_ref(),
                kind,
                cached.as_deref(),
            )
            .await
            {
                Ok(FetchOutcome::Unchanged) => {
                    info!(%kind, "ring unchanged");
                }
                Ok(FetchOutcome::Installed { digest }) => {
                    self.cached_digests
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .insert(kind, digest);
                }
                Err(err) => client::log_failure(kind, &err),
            }
        }
    }

    /// Runs forever: startup jitter, then `run_once` + `check_interval`
    /// sleep, repeated (spec.md §4.4 steps 4-5).
    pub async fn watch(&self) {
        let jitter = startup_jitter(self.config.start_delay_range);
        if !jitter.is_zero() {
            info!(delay_secs = jitter.as_secs(), "startup jitter");
            tokio::time::sleep(jitter).await;
        }
        loop {
            self.run_once().await;
            tokio::time::sleep(Duration::from_secs(self.config.check_interval)).await;
        }
    }
}
