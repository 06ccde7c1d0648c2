use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

/// Filesystem sentinel that halts orchestration while it exists (spec.md
/// §4.2.3). Checked before every gate evaluation and every side-effecting
/// step; never releases the parent-directory lock held for the current ring.
///
/// The orchestrator runs as a dedicated blocking thread (spec.md §9: "prefer
/// explicit tasks or threads with blocking I/O"), so this polls with a plain
/// `std::thread::sleep` rather than an async sleep.
#[derive(Debug, Clone)]
pub struct PauseGate {
    pause_file_path: PathBuf,
}

impl PauseGate {
    pub fn new(pause_file_path: impl Into<PathBuf>) -> Self {
        Self {
            pause_file_path: pause_file_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.pause_file_path
    }

    pub fn is_paused(&self) -> bool {
        self.pause_file_path.exists()
    }

    /// Block (polling at 1 Hz) until the pause file is removed.
    pub fn wait_while_paused(&self) {
        if !self.is_paused() {
            return;
        }
        info!(path = %self.pause_file_path.display(), "pause file found, pausing orchestration");
        while self.is_paused() {
            std::thread::sleep(Duration::from_secs(1));
        }
        info!("pause removed, resuming orchestration");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waits_until_pause_file_removed() {
        let dir = tempfile::tempdir().unwrap();
        let pause_path = dir.path().join(".pause");
        std::fs::write(&pause_path, b"").unwrap();
        let gate = PauseGate::new(&pause_path);

        let pause_path_for_remove = pause_path.clone();
        let remover = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            std::fs::remove_file(&pause_path_for_remove).unwrap();
        });

        gate.wait_while_paused();
        assert!(!gate.is_paused());
        remover.join().unwrap();
    }

    #[test]
    fn unpaused_when_file_absent() {
        let dir = tempfile::tempdir().unwrap();
        let gate = PauseGate::new(dir.path().join(".pause"));
        assert!(!gate.is_paused());
    }
}
