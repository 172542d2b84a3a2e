//! Client for the content-addressable storage backend (an IPFS node API).
//!
//! The backend assigns every byte stream an immutable content identifier;
//! identical bytes always produce the same identifier. This crate speaks the
//! two calls the gateway needs:
//!
//! - **add**: stream a file's bytes to `/api/v0/add` and decode the assigned
//!   identifier from the JSON reply.
//! - **place**: mirror an already-added file into the node's mutable
//!   namespace (`/api/v0/files/mkdir` + `/api/v0/files/cp`) so the tree is
//!   browsable from the node side. Callers treat this as best-effort.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use caslink::CasClient;
//!
//! # async fn demo() -> Result<(), caslink::CaslinkError> {
//! let client = CasClient::new("http://daemon:5001");
//! let id = client.add(std::path::Path::new("/data/example/a.png")).await?;
//! println!("stored as {}", id);
//! # Ok(())
//! # }
//! ```
//!
//! The client is stateless apart from its connection pool and is cheap to
//! clone; every method takes `&self` and may be called concurrently.

pub mod client;
pub mod id;

pub use client::{CasClient, CaslinkError};
pub use id::{ContentId, IdError};
