//! Centralized configuration for the save engine.
//!
//! Goals:
//! - Single place for tunables instead of scattering env lookups.
//! - SaveConfig::from_env() reads BD_* variables; fluent with_* setters
//!   allow explicit overrides (useful in tests and embedding hosts).
//!
//! Durability-oriented defaults:
//! - data_fsync = true (fsync every file before the rename commit)
//! - worker_threads = 4
//! - max_rename_attempts = 1000 (AutoRename probe bound)

use std::fmt;

/// Tunables consumed by [`crate::engine::SaveEngine`].
#[derive(Clone, Debug)]
pub struct SaveConfig {
    /// Number of background worker threads servicing the save queue.
    /// Env: BD_WORKER_THREADS (default 4, clamped to >= 1)
    pub worker_threads: usize,

    /// Whether to fsync the temp file before renaming it over the target.
    /// Env: BD_DATA_FSYNC (default true; "0|false|off|no" => false)
    pub data_fsync: bool,

    /// Upper bound for AutoRename " (N)" probing.
    /// Env: BD_MAX_RENAME_ATTEMPTS (default 1000)
    pub max_rename_attempts: u32,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            data_fsync: true,
            max_rename_attempts: 1000,
        }
    }
}

impl SaveConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("BD_WORKER_THREADS") {
            if let Ok(n) = v.trim().parse::<usize>() {
                cfg.worker_threads = n.max(1);
            }
        }

        if let Ok(v) = std::env::var("BD_DATA_FSYNC") {
            let s = v.trim().to_ascii_lowercase();
            cfg.data_fsync = !(s == "0" || s == "false" || s == "off" || s == "no");
        }

        if let Ok(v) = std::env::var("BD_MAX_RENAME_ATTEMPTS") {
            if let Ok(n) = v.trim().parse::<u32>() {
                if n > 0 {
                    cfg.max_rename_attempts = n;
                }
            }
        }

        cfg
    }

    /// Fluent setters (builder-style) to override specific fields.

    pub fn with_worker_threads(mut self, n: usize) -> Self {
        self.worker_threads = n.max(1);
        self
    }

    pub fn with_data_fsync(mut self, on: bool) -> Self {
        self.data_fsync = on;
        self
    }

    pub fn with_max_rename_attempts(mut self, n: u32) -> Self {
        self.max_rename_attempts = n.max(1);
        self
    }
}

impl fmt::Display for SaveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SaveConfig {{ worker_threads: {}, data_fsync: {}, max_rename_attempts: {} }}",
            self.worker_threads, self.data_fsync, self.max_rename_attempts
        )
    }
}
