//! Gateway configuration.
//!
//! One owned struct, built once at startup and passed by `Arc` to every
//! component. Nothing reads flags or environment after construction.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the gateway and its background tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Backend node API endpoint (e.g. `http://daemon:5001`).
    pub api_endpoint: String,

    /// Public base URL redirects are built against (e.g.
    /// `https://gateway.ipfs.io`).
    pub base_url: String,

    /// Root directory files are served from. Request paths never resolve
    /// outside it.
    pub base_dir: PathBuf,

    /// Retrieval path prefix spliced between base URL and identifier.
    pub prefix: String,

    /// The backend's own storage subtree under `base_dir`. Events and walks
    /// inside it are ignored so the backend's bookkeeping never feeds back
    /// into ingestion.
    pub reserved_dir: PathBuf,

    /// Run the close-write watcher.
    pub watch: bool,

    /// Mirror ingested files into the backend's mutable namespace.
    pub mfs: bool,

    /// `Cache-Control` sent with redirects.
    pub cache_hit: String,

    /// `Cache-Control` sent with misses and errors.
    pub cache_miss: String,

    /// Address the HTTP listener binds.
    pub listen: SocketAddr,
}

impl GatewayConfig {
    /// Retrieval path for an identifier, e.g. `/ipfs/Qm123`.
    pub fn content_path(&self, id: &caslink::ContentId) -> String {
        format!("{}/{}", self.prefix, id)
    }
}
