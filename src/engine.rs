//! SaveEngine: background workers, the submit/callback protocol, and the
//! per-request save pipeline.
//!
//! Model:
//! - submit() enqueues and returns immediately; it never blocks on I/O.
//! - Each request runs on one of a fixed set of worker threads sharing a
//!   thread-safe queue; the completion callback fires on a worker thread,
//!   exactly once per request.
//! - No ordering guarantee between concurrently submitted requests. Two
//!   Overwrite requests racing for the same final path are resolved by the
//!   filesystem: the last rename wins. In every other mode a commit never
//!   replaces an existing file, so racing requests land on distinct paths.
//! - Any fault inside the pipeline (including panics) is converted into a
//!   failure outcome; nothing escapes to the caller unhandled.
//! - Dropping the engine closes the queue and joins the workers, so
//!   already-submitted requests still complete and report.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use crate::config::SaveConfig;
use crate::errors::SaveError;
use crate::metrics::{record_save_failed, record_save_submitted, record_save_succeeded};
use crate::resolve::{resolve_target, ConflictMode, Resolution};
use crate::util::{file_uri, panic_message};
use crate::writer::{write_atomic, write_atomic_new};

/// One save request. The engine owns `data` from the moment of submission:
/// boundary shims must copy the caller's buffer before constructing this.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub data: Vec<u8>,
    pub base_file_name: String,
    /// Extension without the dot; empty means "no extension".
    pub extension: String,
    /// Advisory only; never validated or enforced.
    pub mime_type: String,
    /// Relative fragment under the engine root; empty means the root itself.
    pub sub_dir: String,
    /// Raw conflict-mode selector (see [`ConflictMode::from_raw`]).
    pub conflict_mode: i32,
}

impl SaveRequest {
    pub fn new(data: Vec<u8>, base_file_name: impl Into<String>) -> Self {
        Self {
            data,
            base_file_name: base_file_name.into(),
            extension: String::new(),
            mime_type: String::new(),
            sub_dir: String::new(),
            conflict_mode: ConflictMode::AutoRename.as_raw(),
        }
    }

    pub fn with_extension(mut self, ext: impl Into<String>) -> Self {
        self.extension = ext.into();
        self
    }

    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = mime.into();
        self
    }

    pub fn with_sub_dir(mut self, sub_dir: impl Into<String>) -> Self {
        self.sub_dir = sub_dir.into();
        self
    }

    pub fn with_conflict_mode(mut self, mode: ConflictMode) -> Self {
        self.conflict_mode = mode.as_raw();
        self
    }
}

/// Successful outcome: where the bytes ended up.
#[derive(Debug, Clone)]
pub struct SavedFile {
    /// Absolute path (the engine root is canonicalized at construction).
    pub path: PathBuf,
    /// `file://` form of the same location.
    pub uri: String,
}

/// Exactly one side is ever populated; this is the envelope invariant the
/// FFI layer projects into its C struct.
pub type SaveOutcome = Result<SavedFile, SaveError>;

type Callback = Box<dyn FnOnce(SaveOutcome) + Send + 'static>;

struct Job {
    request: SaveRequest,
    callback: Callback,
}

/// Asynchronous save engine bound to one writable root directory.
pub struct SaveEngine {
    root: PathBuf,
    cfg: SaveConfig,
    queue: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl SaveEngine {
    /// Create the engine: validates/creates the root, canonicalizes it so
    /// reported paths are absolute, and spawns the worker pool.
    pub fn new(root: impl Into<PathBuf>, cfg: SaveConfig) -> Result<Self, SaveError> {
        let root = root.into();
        if root.as_os_str().is_empty() {
            return Err(SaveError::InvalidInput(
                "root directory must not be empty".to_string(),
            ));
        }
        if let Err(e) = std::fs::create_dir_all(&root) {
            return Err(SaveError::DirectoryCreateFailed(format!(
                "create root {}: {}",
                root.display(),
                e
            )));
        }
        let root = std::fs::canonicalize(&root)
            .map_err(|e| SaveError::io("canonicalize root", &root, e))?;

        let (tx, rx) = channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));
        let mut workers = Vec::with_capacity(cfg.worker_threads);
        for i in 0..cfg.worker_threads {
            let rx = Arc::clone(&rx);
            let root = root.clone();
            let cfg = cfg.clone();
            workers.push(
                thread::Builder::new()
                    .name(format!("bytedrop-worker-{}", i))
                    .spawn(move || worker_loop(root, cfg, rx))
                    .map_err(|e| SaveError::Internal(format!("spawn worker: {}", e)))?,
            );
        }

        debug!("engine up at {} ({})", root.display(), cfg);
        Ok(Self {
            root,
            cfg,
            queue: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &SaveConfig {
        &self.cfg
    }

    /// Fire-and-forget submission. Returns immediately; `on_complete` is
    /// invoked exactly once, on a worker thread, with the final outcome.
    ///
    /// After [`SaveEngine::shutdown`] the callback still fires (with an
    /// `InternalFault`), synchronously on the calling thread, so the
    /// one-envelope-per-request contract holds in every case.
    pub fn submit<F>(&self, request: SaveRequest, on_complete: F)
    where
        F: FnOnce(SaveOutcome) + Send + 'static,
    {
        record_save_submitted();
        let job = Job {
            request,
            callback: Box::new(on_complete),
        };

        let rejected = {
            let guard = self.queue.lock().unwrap();
            match guard.as_ref() {
                Some(tx) => match tx.send(job) {
                    Ok(()) => None,
                    Err(e) => Some(e.0),
                },
                None => Some(job),
            }
        };

        if let Some(job) = rejected {
            record_save_failed();
            (job.callback)(Err(SaveError::Internal(
                "engine is shut down".to_string(),
            )));
        }
    }

    /// Close the queue and join the workers. Pending requests drain first,
    /// so every callback submitted before this point has fired when it
    /// returns. Called from Drop; exposed for explicit disposal.
    pub fn shutdown(&self) {
        let tx = self.queue.lock().unwrap().take();
        drop(tx);
        let mut workers = self.workers.lock().unwrap();
        for w in workers.drain(..) {
            let _ = w.join();
        }
    }
}

impl Drop for SaveEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(root: PathBuf, cfg: SaveConfig, rx: Arc<Mutex<Receiver<Job>>>) {
    loop {
        let job = {
            let guard = rx.lock().unwrap();
            guard.recv()
        };
        let Job { request, callback } = match job {
            Ok(j) => j,
            Err(_) => break, // queue closed
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| execute(&root, &cfg, &request)))
            .unwrap_or_else(|p| {
                Err(SaveError::Internal(format!(
                    "save pipeline panicked: {}",
                    panic_message(p)
                )))
            });

        match &outcome {
            Ok(saved) => {
                record_save_succeeded();
                debug!("saved {} ({} bytes)", saved.path.display(), request.data.len());
            }
            Err(e) => {
                record_save_failed();
                warn!("save {:?} failed: {}", request.base_file_name, e);
            }
        }

        callback(outcome);
    }
}

/// The per-request pipeline: decode mode, validate, resolve, commit.
fn execute(root: &Path, cfg: &SaveConfig, request: &SaveRequest) -> SaveOutcome {
    let mode = ConflictMode::from_raw(request.conflict_mode).ok_or_else(|| {
        SaveError::InvalidInput(format!(
            "unknown conflict mode: {}",
            request.conflict_mode
        ))
    })?;

    if request.data.is_empty() {
        return Err(SaveError::InvalidInput(
            "file data must not be empty".to_string(),
        ));
    }

    // Resolution and commit race against concurrent requests for the same
    // name. Overwrite replaces whatever is there, so a plain rename commit
    // is fine. Every other mode must not clobber a file that appeared
    // between the existence probe and the commit, so the final name is
    // claimed with a no-replace link; losing that claim loops back into
    // resolution, which now sees the winner's file and applies the mode to
    // it (Fail errors, Skip reports it, AutoRename probes further).
    let path = loop {
        let resolution = resolve_target(
            root,
            &request.base_file_name,
            &request.extension,
            &request.sub_dir,
            mode,
            cfg.max_rename_attempts,
        )?;

        match resolution {
            Resolution::Fresh(path) => {
                if mode == ConflictMode::Overwrite {
                    write_atomic(&path, &request.data, cfg.data_fsync)?;
                    break path;
                }
                if write_atomic_new(&path, &request.data, cfg.data_fsync)? {
                    break path;
                }
                debug!("lost claim on {}, resolving again", path.display());
            }
            // Skip mode hit an existing file: report it untouched.
            Resolution::Existing(path) => break path,
        }
    };

    Ok(SavedFile {
        uri: file_uri(&path),
        path,
    })
}
