//! Pidfile acquisition (spec.md §6 CLI surface; grounded in the pack's
//! daemon lifecycle lock-then-write-pid pattern: acquire the exclusive lock
//! before truncating, so a failed acquisition never wipes the running
//! process's recorded pid).

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{ConfigError, Result};

/// An exclusively-locked pidfile holding the current process's pid.
/// Released unconditionally on drop.
pub struct PidFile {
    file: File,
    path: PathBuf,
}

impl PidFile {
    /// Acquire the lock and record the current process's pid. Fails if
    /// another process already holds the lock (spec.md: a second `start`
    /// against a running instance must not clobber it).
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        file.try_lock_exclusive()
            .map_err(|source| ConfigError::PidFileLocked {
                path: path.to_path_buf(),
                source,
            })?;

        let mut file = file;
        file.set_len(0).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        writeln!(file, "{}", std::process::id()).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Read the pid recorded in an existing pidfile, for `stop`/`restart`
/// against an already-running process this invocation does not own.
pub fn read_pid(path: &Path) -> Result<i32> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    text.trim()
        .parse()
        .map_err(|_| ConfigError::MalformedPid(path.to_path_buf()))
}
