//! XattrCache: stamps stored as a user extended attribute on the file.
//!
//! The underlying syscalls distinguish exactly the two conditions the cache
//! needs: a missing attribute on an existing file (`Ok(None)` from the
//! `xattr` crate, ENODATA underneath) and a missing file (ENOENT, surfaced
//! as `io::ErrorKind::NotFound`). Anything else is a real error.

use std::io;
use std::path::Path;

use caslink::ContentId;

use crate::cache::{CacheState, PathCache, PathmarkError};

/// Default attribute name. The `user.` namespace is writable without
/// privileges on any filesystem mounted with user xattr support.
pub const DEFAULT_ATTR: &str = "user.earmark.cid";

/// Stamp cache backed by a named extended attribute.
#[derive(Debug, Clone)]
pub struct XattrCache {
    attr_name: String,
}

impl XattrCache {
    /// Create a cache using a specific attribute name.
    pub fn new(attr_name: impl Into<String>) -> Self {
        Self {
            attr_name: attr_name.into(),
        }
    }

    /// The attribute name stamps are stored under.
    pub fn attr_name(&self) -> &str {
        &self.attr_name
    }
}

impl Default for XattrCache {
    fn default() -> Self {
        Self::new(DEFAULT_ATTR)
    }
}

impl PathCache for XattrCache {
    fn lookup(&self, path: &Path) -> Result<CacheState, PathmarkError> {
        match xattr::get(path, &self.attr_name) {
            Ok(Some(raw)) => {
                let text = std::str::from_utf8(&raw).map_err(|_| PathmarkError::Corrupt {
                    path: path.to_path_buf(),
                })?;
                let id = ContentId::from_str_checked(text.trim()).map_err(|_| {
                    PathmarkError::Corrupt {
                        path: path.to_path_buf(),
                    }
                })?;
                Ok(CacheState::Present(id))
            }
            Ok(None) => Ok(CacheState::Absent),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(CacheState::Missing),
            Err(source) => Err(PathmarkError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn stamp(&self, path: &Path, id: &ContentId) -> Result<(), PathmarkError> {
        xattr::set(path, &self.attr_name, id.as_str().as_bytes()).map_err(|source| {
            PathmarkError::Write {
                path: path.to_path_buf(),
                source,
            }
        })?;
        tracing::debug!(path = %path.display(), id = %id, "stamped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// user xattrs need filesystem support (tmpfs mounts often lack it);
    /// probe before asserting so the suite passes everywhere.
    fn xattr_supported(dir: &Path) -> bool {
        let probe = dir.join(".xattr-probe");
        std::fs::write(&probe, b"x").unwrap();
        xattr::set(&probe, "user.earmark.probe", b"1").is_ok()
    }

    #[test]
    fn test_three_states() {
        let dir = TempDir::new().unwrap();
        if !xattr_supported(dir.path()) {
            eprintln!("skipping: no user xattr support on test filesystem");
            return;
        }

        let cache = XattrCache::default();
        let file = dir.path().join("a.png");

        assert_eq!(cache.lookup(&file).unwrap(), CacheState::Missing);

        std::fs::write(&file, b"pixels").unwrap();
        assert_eq!(cache.lookup(&file).unwrap(), CacheState::Absent);

        let id: ContentId = "Qm123".parse().unwrap();
        cache.stamp(&file, &id).unwrap();
        assert_eq!(cache.lookup(&file).unwrap(), CacheState::Present(id));
    }

    #[test]
    fn test_stamp_survives_reopen() {
        let dir = TempDir::new().unwrap();
        if !xattr_supported(dir.path()) {
            eprintln!("skipping: no user xattr support on test filesystem");
            return;
        }

        let file = dir.path().join("b.png");
        std::fs::write(&file, b"pixels").unwrap();

        let id: ContentId = "QmDurable".parse().unwrap();
        XattrCache::default().stamp(&file, &id).unwrap();

        // A fresh instance (as after process restart) sees the stamp.
        let fresh = XattrCache::default();
        assert_eq!(fresh.lookup(&file).unwrap(), CacheState::Present(id));
    }

    #[test]
    fn test_restamp_overwrites() {
        let dir = TempDir::new().unwrap();
        if !xattr_supported(dir.path()) {
            eprintln!("skipping: no user xattr support on test filesystem");
            return;
        }

        let cache = XattrCache::default();
        let file = dir.path().join("c.png");
        std::fs::write(&file, b"v1").unwrap();

        cache.stamp(&file, &"QmOld".parse().unwrap()).unwrap();
        cache.stamp(&file, &"QmNew".parse().unwrap()).unwrap();
        assert_eq!(
            cache.lookup(&file).unwrap(),
            CacheState::Present("QmNew".parse().unwrap())
        );
    }

    #[test]
    fn test_corrupt_stamp_is_an_error() {
        let dir = TempDir::new().unwrap();
        if !xattr_supported(dir.path()) {
            eprintln!("skipping: no user xattr support on test filesystem");
            return;
        }

        let cache = XattrCache::default();
        let file = dir.path().join("d.png");
        std::fs::write(&file, b"pixels").unwrap();
        xattr::set(&file, DEFAULT_ATTR, b"not an id/").unwrap();

        assert!(matches!(
            cache.lookup(&file),
            Err(PathmarkError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_custom_attr_name_is_independent() {
        let dir = TempDir::new().unwrap();
        if !xattr_supported(dir.path()) {
            eprintln!("skipping: no user xattr support on test filesystem");
            return;
        }

        let file = dir.path().join("e.png");
        std::fs::write(&file, b"pixels").unwrap();

        let a = XattrCache::new("user.earmark.a");
        let b = XattrCache::new("user.earmark.b");
        a.stamp(&file, &"QmA".parse().unwrap()).unwrap();

        assert_eq!(b.lookup(&file).unwrap(), CacheState::Absent);
    }
}
