//! bytedrop: asynchronous byte-buffer save engine.
//!
//! Persists caller-owned byte buffers to a host-provided root directory,
//! resolving name collisions (auto-rename, overwrite, fail, skip), committing
//! atomically (tmp sibling + rename), and reporting each outcome through a
//! one-shot callback fired from a worker thread. The C ABI in [`ffi`] wraps
//! the same engine behind opaque u64 handles and explicitly released result
//! envelopes for foreign hosts.

// Core modules
pub mod config;
pub mod engine;
pub mod errors;
pub mod metrics;
pub mod resolve;
pub mod writer;

// CLI front (savecli binary)
pub mod cli;

// C ABI boundary
pub mod ffi;

// Utilities (file:// URI building)
pub mod util;

// Convenience re-exports
pub use config::SaveConfig;
pub use engine::{SaveEngine, SaveOutcome, SaveRequest, SavedFile};
pub use errors::SaveError;
pub use metrics::MetricsSnapshot;
pub use resolve::ConflictMode;
