use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

use crate::error::{Result, RingError};

const CHUNK_SIZE: usize = 4096;

/// Streaming MD5 digest of a file's contents, as a lowercase hex string.
///
/// This is the ETag/content-identity primitive for the whole distribution
/// protocol — master, distributor, and minion all must compute the same
/// digest for the same bytes.
pub fn digest(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut ctx = md5::Context::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        ctx.consume(&buf[..n]);
    }
    Ok(format!("{:x}", ctx.compute()))
}

/// Copy `path` into `backup_dir/<unix_seconds>.<basename>`, returning the
/// backup path and its digest.
///
/// `backup_dir` is created if absent; pre-existence is not an error.
/// Second-granularity collisions (two backups of the same file within the
/// same second) are acceptable: the later call overwrites, and the parent
/// directory lock excludes concurrent edits that would make the contents
/// actually differ.
pub fn backup(path: &Path, backup_dir: &Path) -> Result<(PathBuf, String)> {
    fs::create_dir_all(backup_dir)?;

    let basename = path
        .file_name()
        .ok_or_else(|| RingError::Other(format!("{} has no file name", path.display())))?;
    let epoch = Utc::now().timestamp();

    let backup_path = backup_dir.join(format!("{}.{}", epoch, basename.to_string_lossy()));
    fs::copy(path, &backup_path)?;
    let backup_digest = digest(&backup_path)?;
    debug!(path = %path.display(), backup = %backup_path.display(), %backup_digest, "backed up artifact");
    Ok((backup_path, backup_digest))
}

/// Write `target_path` atomically: stage bytes in a temp file in the same
/// directory (required so the final rename stays on one filesystem), set
/// `mode`, then rename over the target. The rename is the commit point; on
/// any error prior to it the temp file is removed and never observed by
/// readers.
pub fn publish_atomic<F>(target_path: &Path, write_fn: F, mode: u32) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let dir = target_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let temp = tempfile::Builder::new()
        .prefix(".tmp.")
        .suffix(
            target_path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default()
                .as_str(),
        )
        .tempfile_in(dir)?;
    let temp_path = temp.path().to_path_buf();

    let result = write_fn(&temp_path).and_then(|()| {
        set_mode(&temp_path, mode)?;
        fs::rename(&temp_path, target_path)?;
        Ok(())
    });

    match result {
        Ok(()) => {
            // The rename consumed the temp path; persist() would try to
            // remove it again, so forget the handle without touching disk.
            let _ = temp.keep();
            Ok(())
        }
        Err(err) => {
            let _ = fs::remove_file(&temp_path);
            Err(err)
        }
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Bundles the artifact primitives against a configured backup directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    backup_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn digest(&self, path: &Path) -> Result<String> {
        digest(path)
    }

    /// Back up `path` before replacing it (spec.md §9: backup must complete
    /// before the rename, so a crash between the two still leaves a provable
    /// pre-image).
    pub fn backup_before_replace(&self, path: &Path) -> Result<(PathBuf, String)> {
        backup(path, &self.backup_dir)
    }

    pub fn publish_atomic<F>(&self, target_path: &Path, write_fn: F, mode: u32) -> Result<()>
    where
        F: FnOnce(&Path) -> Result<()>,
    {
        publish_atomic(target_path, write_fn, mode)
    }
}

/// Small helper so callers can write raw bytes without hand-rolling a closure.
pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut f = fs::File::create(path)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_matches_known_md5() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"hello world").unwrap();
        // md5("hello world") = 5eb63bbbe01eeed093cb22bb8f5acdc3
        assert_eq!(digest(&path).unwrap(), "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn backup_creates_dir_and_preserves_content() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("account.builder");
        fs::write(&src, b"builder-bytes").unwrap();
        let backup_dir = dir.path().join("backups");

        let (backup_path, backup_digest) = backup(&src, &backup_dir).unwrap();
        assert!(backup_path.starts_with(&backup_dir));
        assert_eq!(backup_digest, digest(&src).unwrap());
    }

    #[test]
    fn backup_tolerates_preexisting_dir() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("account.builder");
        fs::write(&src, b"x").unwrap();
        let backup_dir = dir.path().join("backups");
        fs::create_dir_all(&backup_dir).unwrap();

        backup(&src, &backup_dir).unwrap();
    }

    #[test]
    fn publish_atomic_commits_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("object.ring.gz");
        fs::write(&target, b"old").unwrap();

        publish_atomic(
            &target,
            |p| {
                write_bytes(p, b"new")?;
                Ok(())
            },
            0o644,
        )
        .unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"new");
        // No leftover temp files in the directory.
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn publish_atomic_leaves_target_untouched_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("object.ring.gz");
        fs::write(&target, b"old").unwrap();

        let err = publish_atomic(
            &target,
            |_p| Err(RingError::Other("boom".into())),
            0o644,
        );
        assert!(err.is_err());
        assert_eq!(fs::read(&target).unwrap(), b"old");

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp."))
            .collect();
        assert!(leftovers.is_empty());
    }
}
