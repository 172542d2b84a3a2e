//! The cache capability: lookup and stamp over absolute paths.

use std::io;
use std::path::{Path, PathBuf};

use caslink::ContentId;
use thiserror::Error;

/// What the cache knows about one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheState {
    /// The file is stamped with an identifier; ingestion is complete.
    Present(ContentId),
    /// The file exists but carries no stamp.
    Absent,
    /// No file at this path. Never ingestible until one appears.
    Missing,
}

/// Errors from reading or writing stamps.
#[derive(Debug, Error)]
pub enum PathmarkError {
    #[error("failed to read stamp on {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to stamp {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("stamp on {} is not a valid content identifier", .path.display())]
    Corrupt { path: PathBuf },
}

/// Trait for stamp storage backends.
///
/// This allows for alternative implementations (in-memory for testing,
/// filesystems without user xattr support).
pub trait PathCache: Send + Sync {
    /// Report the cache state for `path`.
    fn lookup(&self, path: &Path) -> Result<CacheState, PathmarkError>;

    /// Durably attach `id` to the file at `path`.
    ///
    /// Overwrites any existing stamp. Callers must only stamp once the
    /// identifier is fully known; a stamp is never provisional.
    fn stamp(&self, path: &Path, id: &ContentId) -> Result<(), PathmarkError>;
}
