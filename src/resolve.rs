//! Conflict-mode decoding and destination-path resolution.
//!
//! Resolution turns (base name, extension, sub dir, mode) into a concrete
//! path under the engine root:
//! - input strings are sanitized (separators and NULs stripped from file
//!   name parts; `..` segments in the sub dir rejected);
//! - the destination directory is created on demand;
//! - an existing target is handled per [`ConflictMode`], with AutoRename
//!   probing `"name (1)"`, `"name (2)"`, ... up to a configured bound.
//!
//! Existence checks go through the platform's native check; nothing here
//! assumes case sensitivity one way or the other.

use std::path::{Path, PathBuf};

use log::debug;

use crate::errors::SaveError;
use crate::metrics::record_rename_probes;

/// Policy applied when the destination path already exists.
///
/// The integer values are a pinned external contract shared with callers on
/// the other side of the boundary; do not renumber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictMode {
    /// Probe `"name (1)"`, `"name (2)"`, ... until a free path is found.
    AutoRename,
    /// Keep the candidate path; the atomic rename replaces the old file.
    Overwrite,
    /// Report `FileAlreadyExists` without writing anything.
    Fail,
    /// Report success with the existing path, write nothing.
    Skip,
}

impl ConflictMode {
    /// Decode the raw selector from the boundary. Unknown values are
    /// rejected by the engine with `InvalidInput`, never defaulted.
    pub fn from_raw(v: i32) -> Option<Self> {
        match v {
            0 => Some(ConflictMode::AutoRename),
            1 => Some(ConflictMode::Overwrite),
            2 => Some(ConflictMode::Fail),
            3 => Some(ConflictMode::Skip),
            _ => None,
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            ConflictMode::AutoRename => 0,
            ConflictMode::Overwrite => 1,
            ConflictMode::Fail => 2,
            ConflictMode::Skip => 3,
        }
    }
}

/// Outcome of resolution: either a path to commit bytes to, or an existing
/// path to report as-is (Skip mode).
#[derive(Debug)]
pub enum Resolution {
    Fresh(PathBuf),
    Existing(PathBuf),
}

/// Strip path separators and NUL bytes from a user-provided file name and
/// reject names that end up empty or whitespace-only.
pub fn sanitize_base_name(raw: &str) -> Result<String, SaveError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0'))
        .collect();
    if cleaned.trim().is_empty() {
        return Err(SaveError::InvalidInput(
            "base file name must not be empty".to_string(),
        ));
    }
    Ok(cleaned)
}

/// Strip dots, separators and NUL bytes from the extension and trim
/// whitespace. An empty result means "no extension".
pub fn sanitize_extension(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '.' | '/' | '\\' | '\0'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Normalize a relative sub-directory fragment into plain segments.
/// Empty and `.` segments are dropped; `..` is rejected outright.
pub fn normalize_sub_dir(raw: &str) -> Result<Vec<String>, SaveError> {
    let mut segments = Vec::new();
    for seg in raw.split(['/', '\\']) {
        let seg: String = seg.chars().filter(|c| *c != '\0').collect();
        let seg = seg.trim();
        if seg.is_empty() || seg == "." {
            continue;
        }
        if seg == ".." {
            return Err(SaveError::PathEscape(format!(
                "sub dir {:?} would escape the root directory",
                raw
            )));
        }
        segments.push(seg.to_string());
    }
    Ok(segments)
}

fn compose_file_name(base: &str, ext: &str) -> String {
    if ext.is_empty() {
        base.to_string()
    } else {
        format!("{}.{}", base, ext)
    }
}

/// Resolve the final destination for one request.
///
/// `root` must already exist; the sub-directory chain is created here so the
/// conflict check runs against the real directory.
pub fn resolve_target(
    root: &Path,
    base_file_name: &str,
    extension: &str,
    sub_dir: &str,
    mode: ConflictMode,
    max_rename_attempts: u32,
) -> Result<Resolution, SaveError> {
    let base = sanitize_base_name(base_file_name)?;
    let ext = sanitize_extension(extension);

    let mut dir = root.to_path_buf();
    for seg in normalize_sub_dir(sub_dir)? {
        dir.push(seg);
    }
    if let Err(e) = std::fs::create_dir_all(&dir) {
        return Err(SaveError::DirectoryCreateFailed(format!(
            "create {}: {}",
            dir.display(),
            e
        )));
    }

    let candidate = dir.join(compose_file_name(&base, &ext));
    if !candidate.exists() {
        return Ok(Resolution::Fresh(candidate));
    }

    match mode {
        ConflictMode::Overwrite => Ok(Resolution::Fresh(candidate)),
        ConflictMode::Skip => {
            debug!("resolve: {} exists, skip mode keeps it", candidate.display());
            Ok(Resolution::Existing(candidate))
        }
        ConflictMode::Fail => Err(SaveError::FileAlreadyExists(format!(
            "file already exists: {}",
            candidate.display()
        ))),
        ConflictMode::AutoRename => auto_rename(&dir, &base, &ext, max_rename_attempts),
    }
}

fn auto_rename(
    dir: &Path,
    base: &str,
    ext: &str,
    max_attempts: u32,
) -> Result<Resolution, SaveError> {
    for i in 1..=max_attempts {
        let candidate = dir.join(compose_file_name(&format!("{} ({})", base, i), ext));
        if !candidate.exists() {
            record_rename_probes(i as u64);
            debug!(
                "resolve: auto-renamed to {} after {} probe(s)",
                candidate.display(),
                i
            );
            return Ok(Resolution::Fresh(candidate));
        }
    }
    record_rename_probes(max_attempts as u64);
    Err(SaveError::NameExhaustion(format!(
        "no free name for {:?} after {} attempts",
        compose_file_name(base, ext),
        max_attempts
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_mode_ordinals_are_pinned() {
        assert_eq!(ConflictMode::from_raw(0), Some(ConflictMode::AutoRename));
        assert_eq!(ConflictMode::from_raw(1), Some(ConflictMode::Overwrite));
        assert_eq!(ConflictMode::from_raw(2), Some(ConflictMode::Fail));
        assert_eq!(ConflictMode::from_raw(3), Some(ConflictMode::Skip));
        assert_eq!(ConflictMode::from_raw(4), None);
        assert_eq!(ConflictMode::from_raw(-1), None);
    }

    #[test]
    fn base_name_strips_separators_and_nuls() {
        assert_eq!(sanitize_base_name("a/b\\c\0d").unwrap(), "abcd");
        assert!(sanitize_base_name("").is_err());
        assert!(sanitize_base_name("   ").is_err());
        assert!(sanitize_base_name("///").is_err());
    }

    #[test]
    fn extension_strips_dots() {
        assert_eq!(sanitize_extension(".png"), "png");
        assert_eq!(sanitize_extension("tar.gz"), "targz");
        assert_eq!(sanitize_extension(" txt "), "txt");
        assert_eq!(sanitize_extension(""), "");
    }

    #[test]
    fn sub_dir_normalization() {
        assert_eq!(normalize_sub_dir("").unwrap(), Vec::<String>::new());
        assert_eq!(normalize_sub_dir("a/b").unwrap(), vec!["a", "b"]);
        assert_eq!(normalize_sub_dir("a\\b").unwrap(), vec!["a", "b"]);
        assert_eq!(normalize_sub_dir("./a//b/.").unwrap(), vec!["a", "b"]);
        assert!(normalize_sub_dir("..").is_err());
        assert!(normalize_sub_dir("a/../b").is_err());
    }

    #[test]
    fn file_name_composition() {
        assert_eq!(compose_file_name("report", "txt"), "report.txt");
        assert_eq!(compose_file_name("report", ""), "report");
    }
}
