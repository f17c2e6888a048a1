//! Error taxonomy for the save engine.
//!
//! Every failure that can reach a caller is one of these variants. The
//! symbolic `code()` string is a stable contract: it is what crosses the
//! boundary in the result envelope's `error_code` field, so renaming a code
//! is a breaking change. `Display` carries the human-readable detail.

use std::fmt;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveError {
    /// Empty or malformed base file name / extension / request field.
    InvalidInput(String),
    /// `sub_dir` attempted to traverse outside the root directory.
    PathEscape(String),
    /// The destination directory could not be created.
    DirectoryCreateFailed(String),
    /// Fail-mode conflict: the target exists and nothing was written.
    FileAlreadyExists(String),
    /// AutoRename exhausted its attempt bound without finding a free name.
    NameExhaustion(String),
    /// Underlying write/rename failure (disk full, permissions, device).
    Io(String),
    /// Unexpected failure during orchestration, converted rather than
    /// propagated unhandled.
    Internal(String),
}

impl SaveError {
    /// Stable symbolic code surfaced through the boundary envelope.
    pub fn code(&self) -> &'static str {
        match self {
            SaveError::InvalidInput(_) => "InvalidInput",
            SaveError::PathEscape(_) => "PathEscape",
            SaveError::DirectoryCreateFailed(_) => "DirectoryCreateFailed",
            SaveError::FileAlreadyExists(_) => "FileAlreadyExists",
            SaveError::NameExhaustion(_) => "NameExhaustion",
            SaveError::Io(_) => "IoError",
            SaveError::Internal(_) => "InternalFault",
        }
    }

    /// Human-readable detail (without the code prefix).
    pub fn message(&self) -> &str {
        match self {
            SaveError::InvalidInput(m)
            | SaveError::PathEscape(m)
            | SaveError::DirectoryCreateFailed(m)
            | SaveError::FileAlreadyExists(m)
            | SaveError::NameExhaustion(m)
            | SaveError::Io(m)
            | SaveError::Internal(m) => m,
        }
    }

    /// Wrap an io::Error with the operation and path that produced it.
    pub(crate) fn io(op: &str, path: &Path, e: io::Error) -> Self {
        SaveError::Io(format!("{} {}: {}", op, path.display(), e))
    }
}

impl fmt::Display for SaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for SaveError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_pinned() {
        let m = "m".to_string();
        assert_eq!(SaveError::InvalidInput(m.clone()).code(), "InvalidInput");
        assert_eq!(SaveError::PathEscape(m.clone()).code(), "PathEscape");
        assert_eq!(
            SaveError::DirectoryCreateFailed(m.clone()).code(),
            "DirectoryCreateFailed"
        );
        assert_eq!(
            SaveError::FileAlreadyExists(m.clone()).code(),
            "FileAlreadyExists"
        );
        assert_eq!(SaveError::NameExhaustion(m.clone()).code(), "NameExhaustion");
        assert_eq!(SaveError::Io(m.clone()).code(), "IoError");
        assert_eq!(SaveError::Internal(m).code(), "InternalFault");
    }

    #[test]
    fn display_carries_code_and_detail() {
        let e = SaveError::Io("write /x: denied".to_string());
        assert_eq!(e.to_string(), "IoError: write /x: denied");
        assert_eq!(e.message(), "write /x: denied");
    }
}
