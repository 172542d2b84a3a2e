//! Close-write watcher: eager ingestion on file writes.
//!
//! Watches the serving root recursively and ingests any file that is closed
//! after being opened for writing, without waiting for a request to come in.
//! Delivery is whatever the kernel gives us: best-effort, at most once per
//! notification. A missed event costs nothing — the path is simply caught by
//! the next request or bootstrap pass. Nothing that happens to a single
//! ingestion may stop the loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::GatewayConfig;
use crate::ingest::{IngestError, Ingestor};
use crate::resolve;

/// Paths a single notification should trigger ingestion for: close-write
/// events only, minus anything inside the backend's reserved subtree (the
/// backend writing its own storage must never feed back into ingestion).
pub fn ingestible_paths(event: &Event, reserved_dir: &Path) -> Vec<PathBuf> {
    if !matches!(
        event.kind,
        EventKind::Access(AccessKind::Close(AccessMode::Write))
    ) {
        return Vec::new();
    }
    event
        .paths
        .iter()
        .filter(|p| !resolve::is_reserved(p, reserved_dir))
        .cloned()
        .collect()
}

/// Start watching. Returns once the watch is registered; the loop runs
/// until `shutdown` fires.
pub fn spawn(
    config: Arc<GatewayConfig>,
    ingestor: Arc<Ingestor>,
    shutdown: CancellationToken,
) -> Result<JoinHandle<()>> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
        // Runs on notify's thread; a closed receiver just means shutdown.
        let _ = tx.send(event);
    })
    .context("failed to create filesystem watcher")?;
    watcher
        .watch(&config.base_dir, RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch {}", config.base_dir.display()))?;

    let handle = tokio::spawn(async move {
        // Keep the watcher alive for the life of the loop; dropping it
        // unregisters the watch.
        let _watcher = watcher;
        tracing::info!(root = %config.base_dir.display(), "watching for close-write events");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = rx.recv() => match received {
                    None => break,
                    Some(Err(e)) => tracing::warn!(error = %e, "watch notification error"),
                    Some(Ok(event)) => {
                        for path in ingestible_paths(&event, &config.reserved_dir) {
                            let ingestor = Arc::clone(&ingestor);
                            let cancel = shutdown.child_token();
                            tokio::spawn(async move {
                                match ingestor.ingest(path.clone(), cancel).await {
                                    Ok(id) => {
                                        tracing::info!(path = %path.display(), id = %id, "ingested after write");
                                    }
                                    Err(IngestError::Canceled { .. }) => {
                                        tracing::debug!(path = %path.display(), "write-triggered ingestion canceled");
                                    }
                                    Err(e) => {
                                        tracing::warn!(path = %path.display(), error = %e, "write-triggered ingestion failed");
                                    }
                                }
                            });
                        }
                    }
                }
            }
        }
        tracing::info!("watch loop stopped");
    });

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close_write(paths: &[&str]) -> Event {
        let mut event = Event::new(EventKind::Access(AccessKind::Close(AccessMode::Write)));
        for p in paths {
            event.paths.push(PathBuf::from(p));
        }
        event
    }

    #[test]
    fn test_close_write_passes() {
        let event = close_write(&["/data/example/a.png"]);
        let paths = ingestible_paths(&event, Path::new("/data/ipfs"));
        assert_eq!(paths, vec![PathBuf::from("/data/example/a.png")]);
    }

    #[test]
    fn test_other_kinds_ignored() {
        let mut event = Event::new(EventKind::Access(AccessKind::Close(AccessMode::Read)));
        event.paths.push(PathBuf::from("/data/example/a.png"));
        assert!(ingestible_paths(&event, Path::new("/data/ipfs")).is_empty());

        let mut event = Event::new(EventKind::Create(notify::event::CreateKind::File));
        event.paths.push(PathBuf::from("/data/example/a.png"));
        assert!(ingestible_paths(&event, Path::new("/data/ipfs")).is_empty());
    }

    #[test]
    fn test_reserved_subtree_dropped() {
        let event = close_write(&["/data/ipfs/blocks/ab/cd", "/data/example/a.png"]);
        let paths = ingestible_paths(&event, Path::new("/data/ipfs"));
        assert_eq!(paths, vec![PathBuf::from("/data/example/a.png")]);
    }
}
