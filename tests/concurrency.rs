use anyhow::Result;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use bytedrop::{ConflictMode, SaveConfig, SaveEngine, SaveRequest};

/// K concurrent submits against one engine: exactly K callbacks, each with
/// its own distinct path and its own payload on disk.
#[test]
fn k_concurrent_submits_yield_k_correct_callbacks() -> Result<()> {
    const K: usize = 128;

    let root = unique_root("conc");
    let engine = SaveEngine::new(&root, SaveConfig::default().with_data_fsync(false))?;

    let (tx, rx) = mpsc::channel();
    for i in 0..K {
        let tx = tx.clone();
        let payload = format!("payload-{:04}", i).into_bytes();
        let expected = payload.clone();
        let req = SaveRequest::new(payload, format!("req-{:04}", i))
            .with_extension("txt")
            .with_conflict_mode(ConflictMode::Fail);
        engine.submit(req, move |outcome| {
            let verdict = match outcome {
                Ok(saved) => {
                    let on_disk = fs::read(&saved.path).unwrap_or_default();
                    (on_disk == expected).then_some(saved.path)
                }
                Err(_) => None,
            };
            let _ = tx.send(verdict);
        });
    }
    drop(tx);

    let mut paths = HashSet::new();
    for _ in 0..K {
        let verdict = rx
            .recv_timeout(Duration::from_secs(60))
            .expect("missing completion callback");
        let path = verdict.expect("every request must succeed with its own bytes");
        paths.insert(path);
    }
    assert_eq!(paths.len(), K, "every request must land on its own path");
    assert!(rx.try_recv().is_err(), "no extra callbacks");
    Ok(())
}

/// Many concurrent AutoRename submits of the same base name: every payload
/// must survive on its own numbered path. Racing requests may probe the
/// same free name, so the commit must refuse to replace a file that
/// appeared after the probe and pick the next number instead.
#[test]
fn concurrent_auto_rename_never_loses_a_payload() -> Result<()> {
    const K: usize = 64;

    let root = unique_root("clash");
    let engine = SaveEngine::new(&root, SaveConfig::default().with_data_fsync(false))?;

    let (tx, rx) = mpsc::channel();
    for i in 0..K {
        let tx = tx.clone();
        let payload = format!("clash-payload-{:04}", i).into_bytes();
        let req = SaveRequest::new(payload.clone(), "clash")
            .with_extension("txt")
            .with_conflict_mode(ConflictMode::AutoRename);
        engine.submit(req, move |outcome| {
            let _ = tx.send((payload, outcome));
        });
    }
    drop(tx);

    let mut paths = HashSet::new();
    for _ in 0..K {
        let (payload, outcome) = rx
            .recv_timeout(Duration::from_secs(60))
            .expect("missing completion callback");
        let saved = outcome.expect("every racing request must succeed");
        let on_disk = fs::read(&saved.path)?;
        assert_eq!(on_disk, payload, "payload survived at {}", saved.path.display());
        paths.insert(saved.path);
    }
    assert_eq!(paths.len(), K, "every request must land on its own path");

    // The base name plus 63 numbered siblings, nothing else.
    drop(engine);
    let files = fs::read_dir(&root)?.count();
    assert_eq!(files, K);
    Ok(())
}

/// submit() is safe from many threads against a single engine.
#[test]
fn submits_from_many_threads() -> Result<()> {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 16;

    let root = unique_root("multi");
    let engine = Arc::new(SaveEngine::new(
        &root,
        SaveConfig::default().with_data_fsync(false),
    )?);

    let (tx, rx) = mpsc::channel();
    let mut joins = Vec::new();
    for t in 0..THREADS {
        let engine = Arc::clone(&engine);
        let tx = tx.clone();
        joins.push(thread::spawn(move || {
            for i in 0..PER_THREAD {
                let tx = tx.clone();
                let req = SaveRequest::new(vec![t as u8, i as u8], format!("f-{}", i))
                    .with_extension("bin")
                    .with_sub_dir(format!("thread-{}", t))
                    .with_conflict_mode(ConflictMode::Fail);
                engine.submit(req, move |outcome| {
                    let _ = tx.send(outcome.is_ok());
                });
            }
        }));
    }
    drop(tx);
    for j in joins {
        j.join().expect("submitter thread panicked");
    }

    let mut ok = 0;
    for _ in 0..THREADS * PER_THREAD {
        if rx.recv_timeout(Duration::from_secs(60)).expect("callback missing") {
            ok += 1;
        }
    }
    assert_eq!(ok, THREADS * PER_THREAD);
    Ok(())
}

/// Dropping the engine drains the queue: every already-submitted request
/// still completes and reports before drop returns.
#[test]
fn drop_drains_pending_requests() -> Result<()> {
    const N: usize = 32;

    let root = unique_root("drain");
    let engine = SaveEngine::new(
        &root,
        SaveConfig::default().with_data_fsync(false).with_worker_threads(2),
    )?;

    let (tx, rx) = mpsc::channel();
    for i in 0..N {
        let tx = tx.clone();
        let req = SaveRequest::new(vec![i as u8; 128], format!("pending-{}", i))
            .with_extension("bin");
        engine.submit(req, move |outcome| {
            let _ = tx.send(outcome.is_ok());
        });
    }
    drop(engine); // joins workers

    let fired: Vec<bool> = rx.try_iter().collect();
    assert_eq!(fired.len(), N, "all callbacks must fire before drop returns");
    assert!(fired.iter().all(|ok| *ok));
    Ok(())
}

/// Submitting after an explicit shutdown still delivers the one failure
/// envelope instead of silently dropping the callback.
#[test]
fn submit_after_shutdown_reports_internal_fault() -> Result<()> {
    let root = unique_root("late");
    let engine = SaveEngine::new(&root, SaveConfig::default())?;
    engine.shutdown();

    let (tx, rx) = mpsc::channel();
    let req = SaveRequest::new(b"x".to_vec(), "late").with_extension("txt");
    engine.submit(req, move |outcome| {
        let _ = tx.send(outcome);
    });

    let err = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("callback must still fire")
        .expect_err("must be a failure envelope");
    assert_eq!(err.code(), "InternalFault");
    Ok(())
}

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("bytedrop-{}-{}-{}", prefix, pid, t))
}
