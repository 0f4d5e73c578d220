//! File writes that either land completely or not at all.
//!
//! Content goes to a sibling temporary file which is synced and then
//! renamed over the destination. Until the rename succeeds the temporary
//! file is owned by a guard that deletes it on drop, so an error at any
//! step leaves no partial file and keeps any existing destination intact.

use crate::error::Result;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Owns a temporary file until it is committed.
struct TempGuard {
    path: PathBuf,
    committed: bool,
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = fs::remove_file(&self.path) {
                log::warn!("could not remove temporary file {}: {}", self.path.display(), e);
            }
        }
    }
}

fn temp_path_for(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let tmp = format!(".{}.{}.tmp", name, std::process::id());
    match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(tmp),
        _ => PathBuf::from(tmp),
    }
}

fn open_new(path: &Path, secret: bool) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if secret {
            options.mode(0o600);
        }
    }
    #[cfg(not(unix))]
    let _ = secret;
    options.open(path)
}

fn write_atomic_inner(dest: &Path, data: &[u8], secret: bool) -> Result<()> {
    let tmp = temp_path_for(dest);
    // A stale temporary from a crashed run would make create_new fail.
    if fs::symlink_metadata(&tmp).is_ok() {
        fs::remove_file(&tmp)?;
    }

    let mut file = open_new(&tmp, secret)?;
    let mut guard = TempGuard {
        path: tmp,
        committed: false,
    };
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&guard.path, dest)?;
    guard.committed = true;
    log::debug!("wrote {} bytes to {}", data.len(), dest.display());
    Ok(())
}

/// Replace `dest` with `data` atomically.
pub fn write_atomic(dest: &Path, data: &[u8]) -> Result<()> {
    write_atomic_inner(dest, data, false)
}

/// Like [`write_atomic`], but the file is created owner-only on Unix.
pub fn write_atomic_secret(dest: &Path, data: &[u8]) -> Result<()> {
    write_atomic_inner(dest, data, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_write_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.bin");
        assert!(write_atomic(&path, b"data").is_err());
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_rename_failure_keeps_destination_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        // Renaming a file over a non-empty directory fails.
        let dest = dir.path().join("occupied");
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("keep"), b"x").unwrap();
        assert!(write_atomic(&dest, b"data").is_err());
        assert!(dest.join("keep").exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_secret_mode() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret.key");
        write_atomic_secret(&path, b"k").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
