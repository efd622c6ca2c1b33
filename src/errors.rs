//! Error types surfaced by [`ObjectStoreClient`](crate::ObjectStoreClient).
//!
//! Every failure reaches the caller as an explicit `Err`; nothing in the core
//! retries or swallows errors. Idempotent outcomes (bucket already exists,
//! deleting a missing key) are reported as `Ok` by the operations themselves.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The store could not be reached, or refused our credentials.
    #[error("connection to `{endpoint}` failed: {message}")]
    Connection { endpoint: String, message: String },

    /// A bucket, key, or local path that must exist does not.
    #[error("{0} not found")]
    NotFound(String),

    /// The store answered, but the operation failed on its side.
    #[error("{op} failed: {message}")]
    Store { op: &'static str, message: String },

    /// Reading or writing a local file failed.
    #[error("local I/O on `{path}` failed: {source}")]
    LocalIo {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid object key `{key}`: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn store(op: &'static str, message: impl Into<String>) -> Self {
        Self::Store {
            op,
            message: message.into(),
        }
    }

    pub fn local_io(path: impl AsRef<std::path::Path>, source: io::Error) -> Self {
        Self::LocalIo {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// True for [`ClientError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
