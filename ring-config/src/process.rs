//! Process control for `start | stop | restart` (spec.md §6 CLI surface).
//!
//! Daemonization itself (double-fork, session detachment, privilege drop)
//! is explicitly out of scope (spec.md §1); `start` here is the idiomatic
//! systems-language substitute described in SPEC_FULL.md §6: spawn a
//! detached child with redirected stdio and record its pid, or run
//! in-process when `--foreground` is set. Real deployments run these
//! binaries under a supervisor (systemd, runit).

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::error::{ConfigError, Result};
use crate::pidfile::read_pid;

/// Re-exec the current binary as a detached background process with the
/// given arguments, returning once the child has been spawned (not once it
/// has finished starting up).
pub fn spawn_detached(exe: &Path, args: &[String]) -> Result<u32> {
    let child = Command::new(exe)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| ConfigError::Spawn(exe.display().to_string(), source))?;
    Ok(child.id())
}

/// Send `SIGTERM` to the process recorded in `pid_path`, then poll (up to
/// `timeout`) for it to disappear. Missing pidfile or missing process are
/// treated as "already stopped", not errors.
pub fn stop(pid_path: &Path, timeout: Duration) -> Result<()> {
    if !pid_path.exists() {
        info!(path = %pid_path.display(), "no pidfile, nothing to stop");
        return Ok(());
    }
    let pid = read_pid(pid_path)?;

    // SAFETY: `kill` with signal 0 or SIGTERM on an attacker-uncontrolled,
    // operator-supplied pid is a standard process-control call; no memory
    // is touched on the Rust side.
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            warn!(pid, "pidfile referenced a process that is already gone");
            return Ok(());
        }
        return Err(ConfigError::Other(format!(
            "failed to signal pid {pid}: {err}"
        )));
    }

    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if unsafe { libc::kill(pid, 0) } != 0 {
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    Err(ConfigError::Other(format!(
        "process {pid} did not exit within {timeout:?}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_with_no_pidfile_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        stop(&dir.path().join("absent.pid"), Duration::from_secs(1)).unwrap();
    }

    #[test]
    fn stop_with_stale_pid_reports_already_gone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.pid");
        // A pid essentially guaranteed not to be a live process in the test sandbox.
        std::fs::write(&path, "999999\n").unwrap();
        stop(&path, Duration::from_secs(1)).unwrap();
    }
}
