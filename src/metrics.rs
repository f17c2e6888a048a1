//! Lightweight global metrics for the save engine.
//!
//! Thread-safe atomic counters:
//! - submitted / succeeded / failed requests
//! - bytes committed to disk
//! - AutoRename probes

use std::sync::atomic::{AtomicU64, Ordering};

static SAVES_SUBMITTED: AtomicU64 = AtomicU64::new(0);
static SAVES_SUCCEEDED: AtomicU64 = AtomicU64::new(0);
static SAVES_FAILED: AtomicU64 = AtomicU64::new(0);
static BYTES_WRITTEN: AtomicU64 = AtomicU64::new(0);
static RENAME_PROBES: AtomicU64 = AtomicU64::new(0);

pub fn record_save_submitted() {
    SAVES_SUBMITTED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_save_succeeded() {
    SAVES_SUCCEEDED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_save_failed() {
    SAVES_FAILED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_bytes_written(n: u64) {
    BYTES_WRITTEN.fetch_add(n, Ordering::Relaxed);
}

pub fn record_rename_probes(n: u64) {
    RENAME_PROBES.fetch_add(n, Ordering::Relaxed);
}

/// Point-in-time view of all counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub saves_submitted: u64,
    pub saves_succeeded: u64,
    pub saves_failed: u64,
    pub bytes_written: u64,
    pub rename_probes: u64,
}

impl MetricsSnapshot {
    pub fn current() -> Self {
        Self {
            saves_submitted: SAVES_SUBMITTED.load(Ordering::Relaxed),
            saves_succeeded: SAVES_SUCCEEDED.load(Ordering::Relaxed),
            saves_failed: SAVES_FAILED.load(Ordering::Relaxed),
            bytes_written: BYTES_WRITTEN.load(Ordering::Relaxed),
            rename_probes: RENAME_PROBES.load(Ordering::Relaxed),
        }
    }
}
