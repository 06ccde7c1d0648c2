//! The Distribution Service's shared `(mtime, digest)` cache (spec.md §4.3,
//! §5: "updated under a critical section equivalent to a single-writer
//! mutex").

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;

use ring_model::RingKind;

use crate::artifact::digest;
use crate::error::Result;

#[derive(Debug, Clone)]
struct Entry {
    mtime: SystemTime,
    digest: String,
}

/// Per-ring-kind cache of the last-observed mtime and digest. Readers that
/// race an update may be served the previous digest; the next request
/// reconciles (spec.md §5).
#[derive(Default)]
pub struct RingCache {
    entries: Mutex<HashMap<RingKind, Entry>>,
}

impl RingCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Re-stat `path`; recompute the digest only if mtime changed since the
    /// last observation. Returns the current digest.
    pub fn digest_for(&self, kind: RingKind, path: &Path) -> Result<String> {
        let mtime = std::fs::metadata(path)?.modified()?;

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get(&kind) {
            if entry.mtime == mtime {
                return Ok(entry.digest.clone());
            }
        }

        let computed = digest(path)?;
        entries.insert(
            kind,
            Entry {
                mtime,
                digest: computed.clone(),
            },
        );
        Ok(computed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recomputes_only_when_mtime_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("account.ring.gz");
        std::fs::write(&path, b"v1").unwrap();

        let cache = RingCache::new();
        let d1 = cache.digest_for(RingKind::Account, &path).unwrap();
        let d1_again = cache.digest_for(RingKind::Account, &path).unwrap();
        assert_eq!(d1, d1_again);

        // Force a distinguishable mtime on filesystems with coarse resolution.
        std::thread::sleep(std::time::Duration::from_millis(10));
        std::fs::write(&path, b"v2-longer-body").unwrap();
        let d2 = cache.digest_for(RingKind::Account, &path).unwrap();
        assert_ne!(d1, d2);
    }
}
