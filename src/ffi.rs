//! C FFI for the save engine (stable ABI for foreign hosts).
//!
//! Model:
//! - Engines live in a process-wide registry keyed by u64 handles; the
//!   boundary never sees internal structure (0 is never a valid handle).
//! - Results cross the boundary as heap-allocated `BdSaveResult` envelopes
//!   with independently allocated strings; the receiver releases each
//!   envelope exactly once via `bd_result_free`.
//! - The completion callback is invoked exactly once per submission, on a
//!   worker thread for accepted requests, or synchronously on the calling
//!   thread when the request is rejected before dispatch.
//!
//! Safety/rules:
//! - All pointers are NULL-checked; strings are NUL-terminated C strings.
//! - The caller's `data` buffer is copied during `bd_save_bytes_async` and
//!   may be freed or reused as soon as the call returns.
//! - `bd_result_free` consumes the envelope; calling it twice on the same
//!   pointer is a contract violation (double free), not a safe no-op.
//! - `bd_engine_dispose` must not be called from inside a completion
//!   callback: disposal joins the workers and would deadlock.
//!
//! Header generation (cbindgen):
//!   cbindgen --crate bytedrop --output bytedrop.h

use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::ptr;
use std::slice;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use libc::{c_char, c_uchar};

use crate::config::SaveConfig;
use crate::engine::{SaveEngine, SaveOutcome, SaveRequest};
use crate::errors::SaveError;

// ---------- Handle registry ----------

static REGISTRY: OnceLock<Mutex<HashMap<u64, Arc<SaveEngine>>>> = OnceLock::new();
static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

fn registry() -> &'static Mutex<HashMap<u64, Arc<SaveEngine>>> {
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

fn engine_for(handle: u64) -> Option<Arc<SaveEngine>> {
    registry().lock().unwrap().get(&handle).cloned()
}

// ---------- Result envelope ----------

/// Boundary result. Exactly one of (file_path, file_uri) or
/// (error_code, error_message) is populated; never both, never neither.
#[repr(C)]
pub struct BdSaveResult {
    pub success: bool,
    pub file_path: *mut c_char,
    pub file_uri: *mut c_char,
    pub error_code: *mut c_char,
    pub error_message: *mut c_char,
}

/// One-shot completion callback. The envelope pointer is owned by the
/// receiver from the moment of the call.
pub type BdSaveCallback = extern "C" fn(*mut BdSaveResult);

fn raw_cstring(s: &str) -> *mut c_char {
    // Interior NULs cannot come from our own paths or messages, but a
    // fallback beats a panic at the boundary.
    let c = CString::new(s).unwrap_or_else(|_| CString::new("invalid string").unwrap());
    c.into_raw()
}

fn envelope(outcome: SaveOutcome) -> *mut BdSaveResult {
    let env = match outcome {
        Ok(saved) => BdSaveResult {
            success: true,
            file_path: raw_cstring(&saved.path.to_string_lossy()),
            file_uri: raw_cstring(&saved.uri),
            error_code: ptr::null_mut(),
            error_message: ptr::null_mut(),
        },
        Err(e) => BdSaveResult {
            success: false,
            file_path: ptr::null_mut(),
            file_uri: ptr::null_mut(),
            error_code: raw_cstring(e.code()),
            error_message: raw_cstring(e.message()),
        },
    };
    Box::into_raw(Box::new(env))
}

// ---------- Helpers ----------

unsafe fn cstr_required(c: *const c_char, what: &str) -> Result<String, SaveError> {
    if c.is_null() {
        return Err(SaveError::InvalidInput(format!("{} is null", what)));
    }
    CStr::from_ptr(c)
        .to_str()
        .map(|s| s.to_string())
        .map_err(|_| SaveError::InvalidInput(format!("{} is not valid UTF-8", what)))
}

unsafe fn cstr_optional(c: *const c_char, what: &str) -> Result<String, SaveError> {
    if c.is_null() {
        return Ok(String::new());
    }
    cstr_required(c, what)
}

unsafe fn bytes_from(ptr: *const c_uchar, len: i64) -> Result<Vec<u8>, SaveError> {
    if len < 0 {
        return Err(SaveError::InvalidInput(format!(
            "negative data length: {}",
            len
        )));
    }
    if len == 0 {
        return Ok(Vec::new());
    }
    if ptr.is_null() {
        return Err(SaveError::InvalidInput(
            "data pointer is null for non-empty buffer".to_string(),
        ));
    }
    Ok(slice::from_raw_parts(ptr, len as usize).to_vec())
}

unsafe fn set_err(out_err: *mut *mut c_char, msg: &str) {
    if out_err.is_null() {
        return;
    }
    if !(*out_err).is_null() {
        let _ = CString::from_raw(*out_err);
    }
    *out_err = raw_cstring(msg);
}

// ---------- API ----------

/// Create an engine rooted at the host-provided writable directory.
/// Returns an opaque non-zero handle, or 0 with `out_err` set (release the
/// error string with `bd_string_free`).
#[no_mangle]
pub unsafe extern "C" fn bd_engine_new(
    root_dir: *const c_char,
    out_err: *mut *mut c_char,
) -> u64 {
    let root = match cstr_required(root_dir, "root_dir") {
        Ok(r) => r,
        Err(e) => {
            set_err(out_err, &e.to_string());
            return 0;
        }
    };
    match SaveEngine::new(root, SaveConfig::from_env()) {
        Ok(engine) => {
            let handle = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
            registry().lock().unwrap().insert(handle, Arc::new(engine));
            handle
        }
        Err(e) => {
            set_err(out_err, &e.to_string());
            0
        }
    }
}

/// Submit one save. Never blocks on I/O; the caller's buffer is copied
/// before this returns. `callback` always fires exactly once: on a worker
/// thread for accepted requests, synchronously here when the request is
/// rejected (unknown handle, bad pointers, non-UTF-8 strings).
/// `mime_type` and `sub_dir` may be NULL (treated as empty).
#[no_mangle]
pub unsafe extern "C" fn bd_save_bytes_async(
    handle: u64,
    data: *const c_uchar,
    data_len: i64,
    base_file_name: *const c_char,
    extension: *const c_char,
    mime_type: *const c_char,
    sub_dir: *const c_char,
    conflict_mode: i32,
    callback: BdSaveCallback,
) {
    let engine = match engine_for(handle) {
        Some(e) => e,
        None => {
            callback(envelope(Err(SaveError::Internal(format!(
                "unknown engine handle: {}",
                handle
            )))));
            return;
        }
    };

    let request = (|| -> Result<SaveRequest, SaveError> {
        Ok(SaveRequest {
            data: bytes_from(data, data_len)?,
            base_file_name: cstr_required(base_file_name, "base_file_name")?,
            extension: cstr_optional(extension, "extension")?,
            mime_type: cstr_optional(mime_type, "mime_type")?,
            sub_dir: cstr_optional(sub_dir, "sub_dir")?,
            conflict_mode,
        })
    })();

    match request {
        Ok(req) => engine.submit(req, move |outcome| callback(envelope(outcome))),
        Err(e) => callback(envelope(Err(e))),
    }
}

/// Release one result envelope: each embedded string, then the envelope
/// itself. Exactly once per envelope received; the pointer is dead after.
#[no_mangle]
pub unsafe extern "C" fn bd_result_free(result: *mut BdSaveResult) {
    if result.is_null() {
        return;
    }
    let env = Box::from_raw(result);
    for p in [env.file_path, env.file_uri, env.error_code, env.error_message] {
        if !p.is_null() {
            let _ = CString::from_raw(p);
        }
    }
}

/// Dispose the engine behind `handle`. In-flight requests drain and their
/// callbacks fire before this returns; submitting against the handle
/// afterwards reports a failure envelope.
#[no_mangle]
pub unsafe extern "C" fn bd_engine_dispose(handle: u64) {
    let engine = registry().lock().unwrap().remove(&handle);
    // Dropped outside the registry lock: disposal joins the workers.
    drop(engine);
}

/// Free a string produced by this library (e.g. `out_err`).
#[no_mangle]
pub unsafe extern "C" fn bd_string_free(s: *mut c_char) {
    if !s.is_null() {
        let _ = CString::from_raw(s);
    }
}

#[no_mangle]
pub extern "C" fn bd_version() -> *const c_char {
    static S: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    S.as_ptr() as *const c_char
}
