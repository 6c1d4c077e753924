//! Object storage abstraction used by the backup upload stage.
//!
//! Storage is treated as an opaque "upload bytes at path" capability. The
//! production implementation is [`S3Store`], which talks to any
//! S3-compatible endpoint.

use std::future::Future;
use std::pin::Pin;

use camino::Utf8Path;
use thiserror::Error;

mod s3;

pub use s3::S3Store;

/// Future returned by object store operations.
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

/// Minimal interface implemented by object stores.
pub trait ObjectStore: Send + Sync {
    /// Uploads the file at `local_path` to `remote_path`.
    fn upload<'a>(&'a self, local_path: &'a Utf8Path, remote_path: &'a str)
    -> StorageFuture<'a, ()>;
}

/// Errors raised by object stores.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum StorageError {
    /// Raised when the local file cannot be read.
    #[error("failed to read {path}: {message}")]
    Read {
        /// Local path that could not be read.
        path: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when the store configuration is unusable.
    #[error("invalid object store configuration: {0}")]
    Config(String),
    /// Raised when the request never produced a response.
    #[error("{message}")]
    Transport {
        /// Transport error string.
        message: String,
    },
    /// Raised when the store answers with a non-success status.
    #[error("object store returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },
}

impl StorageError {
    /// Convenience constructor for transport failures.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}
