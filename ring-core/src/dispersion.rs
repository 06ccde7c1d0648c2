//! Dispersion report gate (spec.md §4.2.2 step 5, §6 "Dispersion tool contract").
//!
//! The dispersion reporting tool is an external subprocess; this module only
//! invokes it and parses its JSON, never recomputes dispersion itself.

use std::process::Command;

use ring_model::RingKind;
use serde::Deserialize;

use crate::error::{Result, RingError};

#[derive(Debug, Clone, Deserialize)]
pub struct DispersionStats {
    pub missing_2: u64,
    pub pct_found: f64,
}

/// Invoke `<dispersion_cmd> -j --<kind>-only` and evaluate the gate.
///
/// Passes iff `missing_2 == 0 AND pct_found > min_pct`. `account` rings pass
/// unconditionally without invoking the subprocess at all — matching the
/// original, which never runs a dispersion report for accounts.
pub fn dispersion_ok(
    dispersion_cmd: &str,
    kind: RingKind,
    min_pct: f64,
) -> Result<bool> {
    if !kind.requires_dispersion() {
        return Ok(true);
    }

    let output = Command::new(dispersion_cmd)
        .arg("-j")
        .arg(format!("--{kind}-only"))
        .output()
        .map_err(|e| RingError::DispersionUnavailable {
            kind,
            reason: e.to_string(),
        })?;

    let stats = parse_dispersion_json(&output.stdout, kind)?;
    Ok(stats.missing_2 == 0 && stats.pct_found > min_pct)
}

/// Parse `{ "<kind>": { "missing_2": int, "pct_found": float, ... } }`.
///
/// Unparseable or empty output fails the gate (an error here, not a `false`,
/// so callers can distinguish "ran but empty" from "gate evaluated false").
pub fn parse_dispersion_json(stdout: &[u8], kind: RingKind) -> Result<DispersionStats> {
    let root: serde_json::Value =
        serde_json::from_slice(stdout).map_err(|source| RingError::DispersionMalformed {
            kind,
            source,
        })?;
    let section = root.get(kind.as_str()).ok_or_else(|| {
        RingError::DispersionUnavailable {
            kind,
            reason: "dispersion report run returned nothing".into(),
        }
    })?;
    serde_json::from_value(section.clone()).map_err(|source| RingError::DispersionMalformed {
        kind,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_always_passes_without_running_a_subprocess() {
        assert!(dispersion_ok("/bin/does-not-exist", RingKind::Account, 99.0).unwrap());
    }

    #[test]
    fn exact_threshold_fails_strictly_greater_required() {
        let json = br#"{"container": {"missing_2": 0, "pct_found": 99.50}}"#;
        let stats = parse_dispersion_json(json, RingKind::Container).unwrap();
        assert!(!(stats.missing_2 == 0 && stats.pct_found > 99.50));
    }

    #[test]
    fn full_coverage_passes() {
        let json = br#"{"object": {"missing_2": 0, "pct_found": 100.0}}"#;
        let stats = parse_dispersion_json(json, RingKind::Object).unwrap();
        assert!(stats.missing_2 == 0 && stats.pct_found > 99.75);
    }

    #[test]
    fn unparseable_output_fails_the_gate() {
        let err = parse_dispersion_json(b"not json", RingKind::Object).unwrap_err();
        assert!(matches!(err, RingError::DispersionMalformed { .. }));
    }

    #[test]
    fn missing_section_is_unavailable() {
        let err = parse_dispersion_json(br#"{"other": {}}"#, RingKind::Object).unwrap_err();
        assert!(matches!(err, RingError::DispersionUnavailable { .. }));
    }
}
