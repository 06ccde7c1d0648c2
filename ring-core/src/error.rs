use std::path::PathBuf;

use thiserror::Error;

/// Error taxonomy for the orchestration/distribution/minion core (spec.md §7).
#[derive(Error, Debug)]
pub enum RingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out waiting {timeout_secs}s for lock on {path}")]
    LockTimeout { path: PathBuf, timeout_secs: u64 },

    #[error("builder load failed for {kind}: {source}")]
    BuilderLoad {
        kind: ring_model::RingKind,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("rebalance produced no usable change for {kind}")]
    RebalanceNoOp { kind: ring_model::RingKind },

    #[error("builder rebalance failed for {kind}: {source}")]
    RebalanceFailed {
        kind: ring_model::RingKind,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("error writing builder for {kind}: {source}")]
    WriteBuilder {
        kind: ring_model::RingKind,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("error writing ring for {kind}: {source}")]
    WriteRing {
        kind: ring_model::RingKind,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("ring validation failed for temp file {0}")]
    RingValidationFailed(PathBuf),

    #[error("dispersion report unavailable for {kind}: {reason}")]
    DispersionUnavailable {
        kind: ring_model::RingKind,
        reason: String,
    },

    #[error("dispersion report for {kind} was malformed: {0}", kind = .kind)]
    DispersionMalformed {
        kind: ring_model::RingKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("digest mismatch: expected {expected}, computed {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{swiftdir} is not writable")]
    NotWritable { swiftdir: PathBuf },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, RingError>;
