//! Durable path→identifier cache for the earmark gateway.
//!
//! The cache table is not kept in process memory: each entry is a named
//! extended attribute on the file it describes. That makes the cache exactly
//! as durable as the filesystem, consistent with the file's existence by
//! construction (deleting the file deletes the entry), and shared for free
//! between processes.
//!
//! Three states are observable for any path, and all three are first-class:
//!
//! - [`CacheState::Present`]: the file carries an identifier — ingestion
//!   finished at some point and the stamp is treated as truth.
//! - [`CacheState::Absent`]: the file exists but has never been stamped.
//! - [`CacheState::Missing`]: there is no file at the path at all.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pathmark::{CacheState, PathCache, XattrCache};
//!
//! # fn demo() -> Result<(), pathmark::PathmarkError> {
//! let cache = XattrCache::default();
//! match cache.lookup(std::path::Path::new("/data/example/a.png"))? {
//!     CacheState::Present(id) => println!("stamped as {}", id),
//!     CacheState::Absent => println!("never ingested"),
//!     CacheState::Missing => println!("no such file"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`MemoryCache`] backs the same trait with a plain map for tests and for
//! filesystems without user extended attributes.

pub mod cache;
pub mod memory;
pub mod xattrs;

pub use cache::{CacheState, PathCache, PathmarkError};
pub use memory::MemoryCache;
pub use xattrs::XattrCache;
