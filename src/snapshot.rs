//! Point-in-time snapshots of a running data store.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::debug;

use crate::artifact::Artifact;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Future returned by data-store client calls.
pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DataStoreError>> + Send + 'a>>;

/// Future returned by [`Snapshotter::snapshot`].
pub type SnapshotFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Artifact, SnapshotError>> + Send + 'a>>;

/// Connection to a data-store process. The wire protocol is implemented
/// elsewhere; snapshots only need these commands.
pub trait DataStoreClient: Send + Sync {
    /// Network address used in log events.
    fn address(&self) -> String;

    /// Unix timestamp of the last completed on-disk save.
    fn last_save(&self) -> ClientFuture<'_, i64>;

    /// Asks the data store to start writing a snapshot in the background.
    fn background_save(&self) -> ClientFuture<'_, ()>;

    /// Location of the snapshot file written by background saves.
    fn snapshot_path(&self) -> ClientFuture<'_, Utf8PathBuf>;
}

/// Produces a point-in-time artifact.
pub trait Snapshotter: Send + Sync {
    /// Takes a snapshot and returns the artifact holding it.
    fn snapshot(&self) -> SnapshotFuture<'_>;
}

/// Errors raised by data-store clients.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{command} failed: {message}")]
pub struct DataStoreError {
    /// Command that failed.
    pub command: String,
    /// Error string reported by the client.
    pub message: String,
}

/// Errors raised while taking a snapshot.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SnapshotError {
    /// Raised when the save does not finish before the timeout.
    #[error("snapshot of {address} did not complete within {seconds}s")]
    Timeout {
        /// Data-store address.
        address: String,
        /// Timeout that elapsed.
        seconds: u64,
    },
    /// Raised when a client call fails.
    #[error(transparent)]
    Client(#[from] DataStoreError),
}

/// Snapshotter that triggers a background save and waits for the last-save
/// timestamp to advance.
#[derive(Clone)]
pub struct BackgroundSaveSnapshotter {
    client: Arc<dyn DataStoreClient>,
    timeout: Duration,
    poll_interval: Duration,
}

impl BackgroundSaveSnapshotter {
    /// Binds a snapshotter to `client` with an overall `timeout`.
    #[must_use]
    pub fn new(client: Arc<dyn DataStoreClient>, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Overrides how often the last-save timestamp is polled.
    ///
    /// This is primarily used by tests to keep timeout scenarios fast.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn save_and_wait(&self) -> Result<(), SnapshotError> {
        let previous = self.client.last_save().await?;
        self.client.background_save().await?;
        loop {
            let current = self.client.last_save().await?;
            if current != previous {
                return Ok(());
            }
            debug!(data_store_address = %self.client.address(), "waiting for background save");
            sleep(self.poll_interval).await;
        }
    }

    async fn take(&self) -> Result<Artifact, SnapshotError> {
        match timeout(self.timeout, self.save_and_wait()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(SnapshotError::Timeout {
                    address: self.client.address(),
                    seconds: self.timeout.as_secs(),
                });
            }
        }
        let path = self.client.snapshot_path().await?;
        Ok(Artifact::new(path))
    }
}

impl Snapshotter for BackgroundSaveSnapshotter {
    fn snapshot(&self) -> SnapshotFuture<'_> {
        Box::pin(self.take())
    }
}

impl std::fmt::Debug for BackgroundSaveSnapshotter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundSaveSnapshotter")
            .field("address", &self.client.address())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
