//! Request → filesystem path resolution.
//!
//! Host and URL path come off the wire untrusted. Each is reduced to its
//! plain name components before joining, so neither a crafted `Host:
//! ../../etc` nor a `/../secret` path can step outside the serving root.

use std::path::{Component, Path, PathBuf};

/// Reduce one untrusted request component to a relative path made only of
/// plain names. Root markers, `.`, `..`, and drive prefixes are dropped
/// rather than rejected, matching how the original request identity maps
/// onto the tree.
fn sanitize(component: &str) -> PathBuf {
    Path::new(component)
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name),
            _ => None,
        })
        .collect()
}

/// Strip an optional `:port` suffix from a Host header value.
fn host_name(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Resolve `(host, url_path)` to the file it names under `base_dir`.
///
/// The result always stays under `base_dir`; it may still name a file that
/// does not exist.
pub fn resolve(base_dir: &Path, host: &str, url_path: &str) -> PathBuf {
    let decoded = urlencoding::decode(url_path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| url_path.to_string());

    let mut resolved = base_dir.to_path_buf();
    resolved.push(sanitize(host_name(host)));
    resolved.push(sanitize(&decoded));

    debug_assert!(resolved.starts_with(base_dir));
    resolved
}

/// Whether `path` lies inside the backend's reserved storage subtree.
pub fn is_reserved(path: &Path, reserved_dir: &Path) -> bool {
    path.starts_with(reserved_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_request() {
        let path = resolve(Path::new("/data"), "example", "/a/b.png");
        assert_eq!(path, Path::new("/data/example/a/b.png"));
    }

    #[test]
    fn test_host_port_is_stripped() {
        let path = resolve(Path::new("/data"), "example:8089", "/a.png");
        assert_eq!(path, Path::new("/data/example/a.png"));
    }

    #[test]
    fn test_host_cannot_escape_root() {
        let path = resolve(Path::new("/data"), "../../etc", "/passwd");
        assert!(path.starts_with("/data"));
        assert_eq!(path, Path::new("/data/etc/passwd"));
    }

    #[test]
    fn test_path_cannot_escape_root() {
        let path = resolve(Path::new("/data"), "example", "/../secret");
        assert!(path.starts_with("/data"));
        assert_eq!(path, Path::new("/data/example/secret"));
    }

    #[test]
    fn test_encoded_traversal_cannot_escape_root() {
        let path = resolve(Path::new("/data"), "example", "/%2e%2e/%2e%2e/etc/shadow");
        assert!(path.starts_with("/data"));
        assert_eq!(path, Path::new("/data/example/etc/shadow"));
    }

    #[test]
    fn test_absolute_host_is_flattened() {
        let path = resolve(Path::new("/data"), "/etc", "/passwd");
        assert_eq!(path, Path::new("/data/etc/passwd"));
    }

    #[test]
    fn test_empty_components() {
        let path = resolve(Path::new("/data"), "example", "//a///b.png");
        assert_eq!(path, Path::new("/data/example/a/b.png"));
    }

    #[test]
    fn test_encoded_spaces_decode() {
        let path = resolve(Path::new("/data"), "example", "/my%20file.png");
        assert_eq!(path, Path::new("/data/example/my file.png"));
    }

    #[test]
    fn test_reserved_subtree() {
        let reserved = Path::new("/data/ipfs");
        assert!(is_reserved(Path::new("/data/ipfs/blocks/x"), reserved));
        assert!(is_reserved(Path::new("/data/ipfs"), reserved));
        assert!(!is_reserved(Path::new("/data/ipfsx/file"), reserved));
        assert!(!is_reserved(Path::new("/data/example/a.png"), reserved));
    }
}
