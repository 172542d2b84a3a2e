//! One-shot warm-up walk: cold-start the cache over an existing tree.
//!
//! Walks every entry under a root (pruning the backend's reserved subtree
//! outright) and feeds each regular file through a fixed pool of workers
//! pulling from a bounded queue. Best-effort by design: per-file failures
//! and unreadable subtrees are recorded in the report and skipped, never
//! fatal. Returns only after the walk finished, the queue drained, and
//! every worker joined.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::ingest::Ingestor;
use crate::resolve;

/// What a warm-up pass accomplished.
#[derive(Debug, Default)]
pub struct BootstrapReport {
    pub ingested: usize,
    /// Per-path failures: unreadable walk entries and failed ingestions.
    pub failures: Vec<(PathBuf, String)>,
}

/// Walk `root` and ingest every regular file, with one worker per available
/// core.
pub async fn run(
    root: PathBuf,
    reserved_dir: PathBuf,
    ingestor: Arc<Ingestor>,
    cancel: CancellationToken,
) -> BootstrapReport {
    let workers = thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
    run_with_workers(root, reserved_dir, ingestor, cancel, workers).await
}

pub async fn run_with_workers(
    root: PathBuf,
    reserved_dir: PathBuf,
    ingestor: Arc<Ingestor>,
    cancel: CancellationToken,
    workers: usize,
) -> BootstrapReport {
    let (tx, rx) = flume::bounded::<PathBuf>(100);

    let walk_root = root.clone();
    let walker = tokio::task::spawn_blocking(move || {
        let mut failures = Vec::new();
        let entries = WalkDir::new(&walk_root)
            .into_iter()
            .filter_entry(|e| !resolve::is_reserved(e.path(), &reserved_dir));
        for entry in entries {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && tx.send(entry.into_path()).is_err() {
                        // Workers are gone; we are shutting down.
                        break;
                    }
                }
                Err(e) => {
                    let at = e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| walk_root.clone());
                    tracing::warn!(path = %at.display(), error = %e, "walk error, skipping subtree");
                    failures.push((at, e.to_string()));
                }
            }
        }
        failures
    });

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let rx = rx.clone();
        let ingestor = Arc::clone(&ingestor);
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            let mut ingested = 0usize;
            let mut failures = Vec::new();
            loop {
                let path = tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = rx.recv_async() => match received {
                        Ok(path) => path,
                        Err(_) => break, // queue drained and closed
                    },
                };
                match ingestor.ingest(path.clone(), cancel.child_token()).await {
                    Ok(id) => {
                        ingested += 1;
                        tracing::info!(path = %path.display(), id = %id, "bootstrapped");
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "bootstrap ingestion failed");
                        failures.push((path, e.to_string()));
                    }
                }
            }
            (ingested, failures)
        }));
    }
    drop(rx);

    let mut report = BootstrapReport::default();
    match walker.await {
        Ok(walk_failures) => report.failures.extend(walk_failures),
        Err(e) => report
            .failures
            .push((root.clone(), format!("walk task failed: {e}"))),
    }
    for handle in handles {
        match handle.await {
            Ok((ingested, failures)) => {
                report.ingested += ingested;
                report.failures.extend(failures);
            }
            Err(e) => report
                .failures
                .push((root.clone(), format!("worker failed: {e}"))),
        }
    }
    report
}
