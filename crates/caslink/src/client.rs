//! CasClient: thin async client for the node's HTTP RPC surface.
//!
//! Every call is a POST against `{endpoint}/api/v0/...`, matching the node's
//! RPC convention. A non-success status or an undecodable reply is an error;
//! the gateway never trusts a half-answered add.

use std::path::{Path, PathBuf};

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tokio_util::io::ReaderStream;

use crate::id::{ContentId, IdError};

/// Errors from talking to the backend.
#[derive(Debug, Error)]
pub enum CaslinkError {
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned {status} from {op}: {body}")]
    Status {
        op: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("backend reply carried an unusable identifier: {0}")]
    BadId(#[from] IdError),
}

/// Reply shape of `/api/v0/add`. The node returns more fields (Name, Size);
/// only the identifier matters here.
#[derive(Debug, Deserialize)]
struct AddReply {
    #[serde(rename = "Hash")]
    hash: String,
}

/// Client for the node API. Cheap to clone; the connection pool is shared.
#[derive(Debug, Clone)]
pub struct CasClient {
    http: reqwest::Client,
    endpoint: String,
}

impl CasClient {
    /// Create a client for the node at `endpoint` (e.g. `http://daemon:5001`).
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }

    /// The configured API endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Stream the file at `path` to the node and return its content identifier.
    ///
    /// Uploads with `pin=false`: the gateway's stamp is the record of
    /// existence, the node is free to manage its own storage. The part
    /// carries an `Abspath` header so a node sharing our filesystem can
    /// ingest without copying.
    ///
    /// Dropping the returned future aborts the transfer.
    pub async fn add(&self, path: &Path) -> Result<ContentId, CaslinkError> {
        let file = tokio::fs::File::open(path).await.map_err(|source| CaslinkError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let length = file
            .metadata()
            .await
            .map_err(|source| CaslinkError::Open {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());

        let mut part_headers = HeaderMap::new();
        if let Ok(abspath) = HeaderValue::from_str(&path.to_string_lossy()) {
            part_headers.insert("Abspath", abspath);
        }

        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let part = multipart::Part::stream_with_length(body, length)
            .file_name(file_name)
            .mime_str("application/octet-stream")?
            .headers(part_headers);
        let form = multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(format!("{}/api/v0/add", self.endpoint))
            .query(&[("pin", "false")])
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CaslinkError::Status {
                op: "add",
                status,
                body,
            });
        }

        let reply: AddReply = response.json().await?;
        let id = ContentId::from_str_checked(&reply.hash)?;
        tracing::debug!(path = %path.display(), id = %id, "added to backend");
        Ok(id)
    }

    /// Mirror an added file into the node's mutable namespace at `dest`.
    ///
    /// Creates the parent directories first (`flush=false` keeps the node
    /// from persisting its root on every call), then copies the content by
    /// identifier. Callers treat failure as advisory.
    pub async fn place(&self, id: &ContentId, dest: &Path) -> Result<(), CaslinkError> {
        let parent = dest
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/".to_string());

        self.invoke(
            "files/mkdir",
            &[("arg", parent.as_str()), ("parents", "true"), ("flush", "false")],
        )
        .await?;

        let source = format!("/ipfs/{}", id);
        let dest = dest.to_string_lossy().into_owned();
        self.invoke("files/cp", &[("arg", source.as_str()), ("arg", dest.as_str())])
            .await?;
        Ok(())
    }

    /// POST an RPC with query parameters, discarding the reply body.
    async fn invoke(
        &self,
        op: &'static str,
        query: &[(&str, &str)],
    ) -> Result<(), CaslinkError> {
        let response = self
            .http
            .post(format!("{}/api/v0/{}", self.endpoint, op))
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CaslinkError::Status { op, status, body });
        }
        Ok(())
    }
}
