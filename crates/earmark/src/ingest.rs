//! The single authoritative ingestion path.
//!
//! Every producer of ingestion work (request handler, watcher, bootstrap)
//! lands here. The `Ingestor` owns the in-flight table: at most one upload
//! per path is outstanding at any instant, and concurrent callers for the
//! same path share that one upload's outcome instead of starting their own.
//!
//! Ordering guarantee per path: the stamp is written before the in-flight
//! entry is removed, and the entry is removed before any waiter observes
//! the outcome. A waiter that sees success can trust the stamp is durable.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use caslink::{CasClient, ContentId};
use pathmark::PathCache;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Outcome of one ingestion, shared verbatim with every waiter.
pub type IngestResult = Result<ContentId, IngestError>;

/// Why an ingestion did not produce a usable stamp.
///
/// `Clone` because one outcome is broadcast to all coalesced callers.
#[derive(Debug, Clone, Error)]
pub enum IngestError {
    #[error("no file at {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("{} is not a regular file", .path.display())]
    NotRegular { path: PathBuf },

    #[error("upstream failure for {}: {reason}", .path.display())]
    Upstream { path: PathBuf, reason: String },

    /// The backend assigned `id` but the stamp could not be written. The
    /// identifier is valid and may answer the current caller; the path
    /// stays unstamped so a later lookup re-ingests.
    #[error("failed to stamp {} with {id}: {reason}", .path.display())]
    Stamp {
        path: PathBuf,
        id: ContentId,
        reason: String,
    },

    #[error("ingestion canceled for {}", .path.display())]
    Canceled { path: PathBuf },
}

/// One outstanding upload and the callers attached to it.
struct InFlight {
    tx: broadcast::Sender<IngestResult>,
    upload_cancel: CancellationToken,
    waiters: usize,
}

/// Coordinates uploads and stamps. Cheap to clone; all clones share one
/// in-flight table and one backend connection pool.
#[derive(Clone)]
pub struct Ingestor {
    client: CasClient,
    cache: Arc<dyn PathCache>,
    inflight: Arc<Mutex<HashMap<PathBuf, InFlight>>>,
    mfs: bool,
}

/// Undoes a waiter registration when the caller stops waiting, whether by
/// cancellation or by its future being dropped mid-await.
struct WaiterGuard<'a> {
    ingestor: &'a Ingestor,
    path: &'a Path,
    armed: bool,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.ingestor.abandon(self.path);
        }
    }
}

impl Ingestor {
    pub fn new(client: CasClient, cache: Arc<dyn PathCache>, mfs: bool) -> Self {
        Self {
            client,
            cache,
            inflight: Arc::new(Mutex::new(HashMap::new())),
            mfs,
        }
    }

    /// Ingest the file at `path`: upload its bytes, optionally mirror it
    /// into the backend namespace, stamp the identifier onto the file.
    ///
    /// If an upload for `path` is already running, attaches to it instead
    /// of starting a second one. `cancel` detaches this caller only; the
    /// shared upload is aborted when its last caller detaches.
    pub async fn ingest(&self, path: PathBuf, cancel: CancellationToken) -> IngestResult {
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(IngestError::NotRegular { path }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IngestError::NotFound { path })
            }
            Err(e) => {
                return Err(IngestError::Upstream {
                    path,
                    reason: e.to_string(),
                })
            }
        }

        let mut rx = self.join(&path);
        let mut guard = WaiterGuard {
            ingestor: self,
            path: &path,
            armed: true,
        };

        tokio::select! {
            outcome = rx.recv() => {
                guard.armed = false;
                match outcome {
                    Ok(result) => result,
                    // Sender gone without a broadcast: the shared upload was
                    // abandoned underneath us.
                    Err(_) => Err(IngestError::Canceled { path: path.clone() }),
                }
            }
            _ = cancel.cancelled() => {
                Err(IngestError::Canceled { path: path.clone() })
            }
        }
    }

    /// Attach to the in-flight upload for `path`, starting one if needed.
    fn join(&self, path: &Path) -> broadcast::Receiver<IngestResult> {
        let mut inflight = self.inflight.lock().unwrap();
        if let Some(entry) = inflight.get_mut(path) {
            entry.waiters += 1;
            return entry.tx.subscribe();
        }

        let (tx, rx) = broadcast::channel(1);
        let upload_cancel = CancellationToken::new();
        inflight.insert(
            path.to_path_buf(),
            InFlight {
                tx,
                upload_cancel: upload_cancel.clone(),
                waiters: 1,
            },
        );

        let ingestor = self.clone();
        let upload_path = path.to_path_buf();
        tokio::spawn(async move { ingestor.run_upload(upload_path, upload_cancel).await });
        rx
    }

    /// Detach one waiter. The last one out aborts the transfer and clears
    /// the slot so a later call can retry.
    fn abandon(&self, path: &Path) {
        let mut inflight = self.inflight.lock().unwrap();
        if let Some(entry) = inflight.get_mut(path) {
            entry.waiters -= 1;
            if entry.waiters == 0 {
                entry.upload_cancel.cancel();
                inflight.remove(path);
            }
        }
    }

    /// The shared upload task: one per in-flight entry.
    async fn run_upload(self, path: PathBuf, cancel: CancellationToken) {
        let result = tokio::select! {
            result = self.upload(&path) => result,
            _ = cancel.cancelled() => {
                // The last waiter already removed the entry; dropping the
                // upload future aborts the transfer. Nothing was stamped.
                tracing::debug!(path = %path.display(), "upload abandoned by all callers");
                return;
            }
        };

        let tx = {
            let mut inflight = self.inflight.lock().unwrap();
            match inflight.remove(&path) {
                Some(entry) => entry.tx,
                None => return,
            }
        };
        let _ = tx.send(result);
    }

    async fn upload(&self, path: &Path) -> IngestResult {
        let id = match self.client.add(path).await {
            Ok(id) => id,
            Err(e) => {
                return Err(IngestError::Upstream {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        };

        if self.mfs {
            if let Err(e) = self.client.place(&id, path).await {
                tracing::warn!(path = %path.display(), error = %e, "namespace placement failed");
            }
        }

        if let Err(e) = self.cache.stamp(path, &id) {
            return Err(IngestError::Stamp {
                path: path.to_path_buf(),
                id,
                reason: e.to_string(),
            });
        }

        tracing::info!(path = %path.display(), id = %id, "ingested");
        Ok(id)
    }
}
