//! MemoryCache: map-backed stamps for tests and xattr-less filesystems.
//!
//! Reports the same three states as the xattr backing: `Missing` still means
//! "no file on disk", so code under test sees identical behavior.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use caslink::ContentId;

use crate::cache::{CacheState, PathCache, PathmarkError};

/// In-memory stamp cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    stamps: Mutex<HashMap<PathBuf, ContentId>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stamped paths.
    pub fn len(&self) -> usize {
        self.stamps.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PathCache for MemoryCache {
    fn lookup(&self, path: &Path) -> Result<CacheState, PathmarkError> {
        if let Some(id) = self.stamps.lock().unwrap().get(path) {
            return Ok(CacheState::Present(id.clone()));
        }
        if path.exists() {
            Ok(CacheState::Absent)
        } else {
            Ok(CacheState::Missing)
        }
    }

    fn stamp(&self, path: &Path, id: &ContentId) -> Result<(), PathmarkError> {
        self.stamps
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), id.clone());
        Ok(())
    }
}
