//! ContentId: the backend-assigned identifier for a stored byte stream.
//!
//! Identifiers are opaque to us. The backend derives them from content, so
//! two identical files always carry the same identifier, but we never
//! compute one locally. Validation is limited to the shape every encoding
//! shares: a non-empty token with no path separators or whitespace, safe to
//! splice into a retrieval URL.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// An opaque content identifier assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

/// Errors that can occur when working with content identifiers.
#[derive(Debug, Error)]
pub enum IdError {
    #[error("empty content identifier")]
    Empty,

    #[error("content identifier contains {0:?}")]
    InvalidChar(char),
}

impl ContentId {
    /// Create from a string received from the backend (validates shape).
    pub fn from_str_checked(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        if let Some(c) = s.chars().find(|c| c.is_whitespace() || *c == '/') {
            return Err(IdError::InvalidChar(c));
        }
        Ok(Self(s.to_string()))
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_checked(s)
    }
}

impl AsRef<str> for ContentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
