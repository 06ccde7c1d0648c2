//! The per-ring-kind state machine (spec.md §4.2.2).
//!
//! `run_cycle` walks LOAD (done by the caller) → NEED-CHANGE? →
//! MIN-PART-HOURS → MIN-MODIFY-TIME → DISPERSION → BALANCE-BRANCH →
//! ADJUST/REBALANCE → PUBLISH, returning an outcome the caller uses to pick
//! the next sleep duration (spec.md step 10).

use std::path::Path;
use std::time::SystemTime;

use ring_model::RingKind;
use tracing::{debug, info, warn};

use crate::artifact::{write_bytes, ArtifactStore};
use crate::builder::{RingArtifact, RingBuilder, RingValidator};
use crate::error::{Result, RingError};
use crate::orchestration::config::OrchestratorConfig;
use crate::orchestration::notify::Notifier;

/// Why a cycle ended where it did; also decides interval vs change_interval.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// NEED-CHANGE? was false: nothing in this ring diverges from target.
    NoChangeNeeded,
    /// A gate before REBALANCE failed; cycle skipped, no state changed.
    GateSkipped(Gate),
    /// Rebalance ran but produced no usable change (zero moves, or no
    /// device change and balance moved less than one point).
    RebalanceNotReady,
    /// Builder and ring were published successfully.
    Published {
        builder_digest: String,
        ring_digest: String,
    },
}

impl CycleOutcome {
    /// `true` selects `change_interval`, `false` selects `interval`
    /// (spec.md §4.2.2 step 10).
    pub fn is_disruptive(&self) -> bool {
        matches!(
            self,
            CycleOutcome::RebalanceNotReady | CycleOutcome::Published { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    MinPartHours,
    MinModifyTime,
    Dispersion,
}

/// Evaluates the DISPERSION gate. Abstracted behind a trait so tests don't
/// need a real dispersion-report binary on `$PATH`.
pub trait DispersionGate {
    fn check(&self, kind: RingKind, min_pct: f64) -> Result<bool>;
}

/// Production implementation: shells out to the configured dispersion command.
pub struct SubprocessDispersionGate<'a> {
    pub dispersion_cmd: &'a str,
}

impl DispersionGate for SubprocessDispersionGate<'_> {
    fn check(&self, kind: RingKind, min_pct: f64) -> Result<bool> {
        crate::dispersion::dispersion_ok(self.dispersion_cmd, kind, min_pct)
    }
}

/// `true` iff any managed device's weight differs from its target.
fn any_weight_diverges<B: RingBuilder>(builder: &B) -> bool {
    builder
        .devs()
        .iter()
        .filter_map(|slot| slot.as_present())
        .any(|dev| dev.weight_needs_adjustment())
}

/// NEED-CHANGE? (spec.md step 2).
fn needs_change<B: RingBuilder>(builder: &B, balance_threshold: f64) -> bool {
    builder.devs_changed()
        || builder.get_balance() > balance_threshold
        || any_weight_diverges(builder)
}

/// MIN-PART-HOURS (spec.md step 3): elapsed hours since partitions last
/// moved must strictly exceed the builder's `min_part_hours`.
fn min_part_hours_ok<B: RingBuilder>(builder: &B, now: SystemTime) -> bool {
    let now_epoch = epoch_secs(now);
    let elapsed_hours = (now_epoch - builder.last_part_moves_epoch()).max(0) / 3600;
    elapsed_hours > builder.min_part_hours() as i64
}

/// MIN-MODIFY-TIME (spec.md step 4): builder file mtime must be older than
/// `min_seconds_since_change`.
fn min_modify_time_ok(builder_mtime: SystemTime, now: SystemTime, min_seconds: u64) -> bool {
    let since_modified = now
        .duration_since(builder_mtime)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    since_modified > min_seconds
}

fn epoch_secs(t: SystemTime) -> i64 {
    t.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// ADJUST (spec.md step 7): step every managed device one bounded increment
/// toward its target, skipping holes and already-converged devices.
fn adjust<B: RingBuilder>(builder: &mut B, default_weight_shift: f64) {
    for slot in builder.devs_mut() {
        if let Some(dev) = slot.as_present_mut() {
            dev.step_toward_target(default_weight_shift);
        }
    }
    // Builders track weight on their own internal device table; push the
    // adjusted values through the builder's own setter so a real adapter's
    // bookkeeping (e.g. recomputing replica maps) stays correct.
    let updates: Vec<_> = builder
        .devs()
        .iter()
        .filter_map(|slot| slot.as_present())
        .map(|dev| (dev.id, dev.weight))
        .collect();
    for (id, weight) in updates {
        builder.set_dev_weight(id, weight);
    }
}

/// REBALANCE (spec.md step 8). Success requires: builder didn't error,
/// `parts_moved > 0`, and (`devs_changed` was true OR balance moved by at
/// least one point).
fn rebalance<B: RingBuilder>(
    kind: RingKind,
    builder: &mut B,
) -> Result<Option<(u64, f64)>> {
    let devs_changed = builder.devs_changed();
    let last_balance = builder.get_balance();

    let (parts_moved, new_balance) = builder
        .rebalance()
        .map_err(|e| RingError::RebalanceFailed {
            kind,
            source: Box::new(e),
        })?;

    if parts_moved == 0 {
        info!(%kind, "rebalance reassigned no partitions");
        return Ok(None);
    }
    if !devs_changed && (last_balance - new_balance).abs() < 1.0 {
        info!(%kind, "rebalance failed to change balance by more than 1%%");
        return Ok(None);
    }

    info!(
        %kind,
        parts_moved,
        pct = 100.0 * parts_moved as f64 / builder.parts().max(1) as f64,
        new_balance,
        "rebalance reassigned partitions"
    );
    Ok(Some((parts_moved, new_balance)))
}

/// PUBLISH (spec.md step 9): write builder then ring, each backed up before
/// its rename, ring validated before commit.
fn publish<B: RingBuilder>(
    kind: RingKind,
    builder: &B,
    builder_path: &Path,
    ring_path: &Path,
    store: &ArtifactStore,
    validator: &dyn RingValidator,
    notifier: &dyn Notifier,
) -> Result<(String, String)> {
    if builder_path.exists() {
        let (backup_path, backup_digest) = store
            .backup_before_replace(builder_path)
            .map_err(|e| RingError::WriteBuilder {
                kind,
                source: Box::new(e),
            })?;
        info!(%kind, backup = %backup_path.display(), %backup_digest, "backed up builder");
    }

    let bytes = builder.to_bytes().map_err(|e| RingError::WriteBuilder {
        kind,
        source: Box::new(e),
    })?;
    store
        .publish_atomic(builder_path, |p| write_bytes(p, &bytes), 0o644)
        .map_err(|e| RingError::WriteBuilder {
            kind,
            source: Box::new(e),
        })?;
    let builder_digest = store.digest(builder_path).map_err(|e| RingError::WriteBuilder {
        kind,
        source: Box::new(e),
    })?;
    info!(%kind, %builder_digest, "wrote new builder");

    if ring_path.exists() {
        let (backup_path, backup_digest) = store
            .backup_before_replace(ring_path)
            .map_err(|e| RingError::WriteRing {
                kind,
                source: Box::new(e),
            })?;
        info!(%kind, backup = %backup_path.display(), %backup_digest, "backed up ring");
    }

    let ring = builder.get_ring();
    store
        .publish_atomic(
            ring_path,
            |p| {
                ring.save(p).map_err(|e| RingError::WriteRing {
                    kind,
                    source: Box::new(e),
                })?;
                if !validator.validate(p) {
                    return Err(RingError::RingValidationFailed(p.to_path_buf()));
                }
                Ok(())
            },
            0o644,
        )
        .map_err(|e| match e {
            RingError::RingValidationFailed(p) => RingError::RingValidationFailed(p),
            other => RingError::WriteRing {
                kind,
                source: Box::new(other),
            },
        })?;
    let ring_digest = store.digest(ring_path).map_err(|e| RingError::WriteRing {
        kind,
        source: Box::new(e),
    })?;
    info!(%kind, %ring_digest, "wrote new ring");

    notifier.notify(kind, &format!("wrote new ring with digest {ring_digest}"));

    Ok((builder_digest, ring_digest))
}

#[allow(clippy::too_many_arguments)]
pub fn run_cycle<B: RingBuilder>(
    kind: RingKind,
    builder: &mut B,
    builder_path: &Path,
    ring_path: &Path,
    builder_mtime: SystemTime,
    now: SystemTime,
    config: &OrchestratorConfig,
    store: &ArtifactStore,
    validator: &dyn RingValidator,
    dispersion: &dyn DispersionGate,
    notifier: &dyn Notifier,
) -> Result<CycleOutcome> {
    if !needs_change(builder, config.balance_threshold) {
        debug!(%kind, "no ring change required");
        return Ok(CycleOutcome::NoChangeNeeded);
    }
    info!(%kind, "ring requires weight change");

    if config.min_part_hours_check && !min_part_hours_ok(builder, now) {
        warn!(%kind, "min_part_hours gate: not ready");
        return Ok(CycleOutcome::GateSkipped(Gate::MinPartHours));
    }

    if !min_modify_time_ok(builder_mtime, now, config.min_seconds_since_change) {
        warn!(%kind, "min modify time gate: not ready");
        return Ok(CycleOutcome::GateSkipped(Gate::MinModifyTime));
    }

    // A dispersion tool error (subprocess crash, malformed JSON, empty
    // result) fails the gate rather than the cycle (spec.md §4.2.2 step 5
    // "Any exception or empty result ⇒ fail", §7 "External tool error ...
    // Log; gate fails; skip") — it must not bubble up as a fatal
    // orchestration error.
    let dispersion_passed = match dispersion.check(kind, config.min_pct_for(kind)) {
        Ok(passed) => passed,
        Err(err) => {
            warn!(%kind, error = %err, "dispersion gate: tool error, treating as not ready");
            false
        }
    };
    if !dispersion_passed {
        warn!(%kind, "dispersion gate: not ready");
        return Ok(CycleOutcome::GateSkipped(Gate::Dispersion));
    }

    // BALANCE-BRANCH (spec.md step 6): an unbalanced ring is treated as
    // already disrupted, so restore balance first rather than compounding
    // churn with a weight shift in the same cycle.
    if builder.get_balance() <= config.balance_threshold {
        adjust(builder, config.default_weight_shift);
    } else {
        info!(%kind, "ring balance not ok, rebalancing without weight adjustment");
    }

    if rebalance(kind, builder)?.is_none() {
        return Ok(CycleOutcome::RebalanceNotReady);
    }

    let (builder_digest, ring_digest) =
        publish(kind, builder, builder_path, ring_path, store, validator, notifier)?;

    Ok(CycleOutcome::Published {
        builder_digest,
        ring_digest,
    })
}
