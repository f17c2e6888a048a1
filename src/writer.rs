//! Atomic byte-buffer commit: tmp sibling + rename, then a best-effort
//! fsync of the parent directory.
//!
//! A crash or concurrent reader never observes a partial file at the final
//! path: the bytes land in a hidden temp file in the same directory first,
//! and only a successful rename (or, for the no-replace variant, a hard
//! link) publishes them. Every failure path removes the temp file and
//! leaves the final path untouched.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::SaveError;
use crate::metrics::record_bytes_written;

/// Write `bytes` to `path` atomically. With `fsync` on, the temp file is
/// synced to disk before the rename commit.
pub fn write_atomic(path: &Path, bytes: &[u8], fsync: bool) -> Result<(), SaveError> {
    let tmp = temp_sibling(path)?;

    if let Err(e) = write_temp(&tmp, bytes, fsync) {
        let _ = fs::remove_file(&tmp);
        return Err(SaveError::io("write", &tmp, e));
    }

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(SaveError::io("rename", path, e));
    }

    let _ = fsync_dir(path);
    record_bytes_written(bytes.len() as u64);
    Ok(())
}

/// Like [`write_atomic`], but never replaces an existing file: the temp
/// file is published with a hard link, which fails atomically if `path`
/// appeared in the meantime. Returns `false` when the path was already
/// taken and nothing was committed; the caller decides whether to probe
/// for another name.
pub fn write_atomic_new(path: &Path, bytes: &[u8], fsync: bool) -> Result<bool, SaveError> {
    let tmp = temp_sibling(path)?;

    if let Err(e) = write_temp(&tmp, bytes, fsync) {
        let _ = fs::remove_file(&tmp);
        return Err(SaveError::io("write", &tmp, e));
    }

    let published = fs::hard_link(&tmp, path);
    let _ = fs::remove_file(&tmp);
    match published {
        Ok(()) => {
            let _ = fsync_dir(path);
            record_bytes_written(bytes.len() as u64);
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(SaveError::io("link", path, e)),
    }
}

fn write_temp(tmp: &Path, bytes: &[u8], fsync: bool) -> std::io::Result<()> {
    let mut f = OpenOptions::new().write(true).create_new(true).open(tmp)?;
    f.write_all(bytes)?;
    if fsync {
        f.sync_all()?;
    }
    Ok(())
}

/// Hidden temp name in the same directory as the target, so the final
/// rename never crosses a filesystem boundary.
fn temp_sibling(path: &Path) -> Result<PathBuf, SaveError> {
    let dir = path.parent().ok_or_else(|| {
        SaveError::Io(format!("no parent directory for {}", path.display()))
    })?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| SaveError::Io(format!("bad file name in {}", path.display())))?;
    let nonce: u32 = rand::random();
    Ok(dir.join(format!(
        ".{}.{}.{:08x}.tmp",
        name,
        std::process::id(),
        nonce
    )))
}

#[cfg(unix)]
fn fsync_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let dir = File::open(parent)?;
            dir.sync_all()?;
        }
    }
    Ok(())
}
#[cfg(not(unix))]
fn fsync_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
