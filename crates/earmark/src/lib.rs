//! earmark - write-through gateway in front of a content-addressable store.
//!
//! Requests arrive as `(Host, path)`, resolve to a file under the serving
//! root, and leave as a permanent redirect to the file's content identifier
//! on the public retrieval host. The first time a path is seen (or written),
//! its bytes are ingested into the backend and the identifier is stamped
//! onto the file as an extended attribute, so every later lookup is a pure
//! metadata read.
//!
//! Three producers feed ingestion work: the HTTP handler ([`gateway`]), the
//! close-write watcher ([`watch`]), and the one-shot warm-up walk
//! ([`bootstrap`]). All three converge on [`ingest::Ingestor`], the only
//! component that talks to the backend or writes stamps.

pub mod bootstrap;
pub mod config;
pub mod gateway;
pub mod ingest;
pub mod resolve;
pub mod watch;
