//! Snapshot, rename, and upload a data store, then always clean up.
//!
//! A backup run is two pipelines. The primary pipeline moves the snapshot
//! to a fresh temporary path and uploads it. The cleanup pipeline removes
//! the original and temporary files and runs after the primary pipeline no
//! matter how it ended. Cleanup failures are logged only; the caller sees
//! the primary pipeline's result.

use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::BackupConfig;
use crate::pipeline::{Pipeline, PipelineError, Task};
use crate::snapshot::{BackgroundSaveSnapshotter, DataStoreClient, SnapshotError, Snapshotter};
use crate::storage::{ObjectStore, S3Store, StorageError};
use crate::tasks::{CleanupTask, RenameTask, UploadTask};


/// Name of the primary pipeline.
pub const BACKUP_PIPELINE: &str = "redis-backup";

/// Name of the cleanup pipeline.
pub const CLEANUP_PIPELINE: &str = "cleanup";

const TEMP_DIR_PREFIX: &str = "tandem-backup";

/// Builds a snapshotter bound to a client and timeout.
pub type SnapshotterProvider =
    Arc<dyn Fn(Arc<dyn DataStoreClient>, Duration) -> Box<dyn Snapshotter> + Send + Sync>;

/// Builds the task that moves the snapshot to the given temporary path.
pub type RenameTaskProvider = Arc<dyn Fn(&Utf8Path) -> Box<dyn Task> + Send + Sync>;

/// Builds the task that uploads to the given remote path.
pub type UploadTaskProvider =
    Arc<dyn Fn(Arc<dyn ObjectStore>, &str) -> Box<dyn Task> + Send + Sync>;

/// Builds the task that removes the original and renamed snapshot paths.
pub type CleanupTaskProvider = Arc<dyn Fn(&Utf8Path, &Utf8Path) -> Box<dyn Task> + Send + Sync>;

/// Errors surfaced by [`Backuper::backup`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum BackupError {
    /// Raised when the snapshot could not be taken; nothing needs cleaning.
    #[error("snapshot failed: {0}")]
    Snapshot(#[from] SnapshotError),
    /// Raised when the temporary directory cannot be allocated.
    #[error("failed to allocate temporary path: {0}")]
    TempPath(String),
    /// Raised when the rename or upload stage fails.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// Raised when the object store cannot be constructed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Orchestrates backups. Collaborators are supplied as providers so tests
/// can swap any stage without touching shared state.
#[derive(Clone)]
pub struct Backuper {
    snapshot_timeout: Duration,
    store: Arc<dyn ObjectStore>,
    snapshotter_provider: SnapshotterProvider,
    rename_task_provider: RenameTaskProvider,
    upload_task_provider: UploadTaskProvider,
    cleanup_task_provider: CleanupTaskProvider,
}

impl Backuper {
    /// Creates a backuper with the production providers.
    #[must_use]
    pub fn new(snapshot_timeout: Duration, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            snapshot_timeout,
            store,
            snapshotter_provider: Arc::new(default_snapshotter),
            rename_task_provider: Arc::new(default_rename_task),
            upload_task_provider: Arc::new(default_upload_task),
            cleanup_task_provider: Arc::new(default_cleanup_task),
        }
    }

    /// Creates a backuper uploading to the S3-compatible store described by
    /// `config`.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Storage`] when the store cannot be built.
    pub fn from_config(config: &BackupConfig) -> Result<Self, BackupError> {
        let store = S3Store::new(config)?;
        Ok(Self::new(config.snapshot_timeout(), Arc::new(store)))
    }

    /// Overrides how snapshotters are built.
    #[must_use]
    pub fn with_snapshotter_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn(Arc<dyn DataStoreClient>, Duration) -> Box<dyn Snapshotter> + Send + Sync + 'static,
    {
        self.snapshotter_provider = Arc::new(provider);
        self
    }

    /// Overrides how the rename task is built.
    #[must_use]
    pub fn with_rename_task_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn(&Utf8Path) -> Box<dyn Task> + Send + Sync + 'static,
    {
        self.rename_task_provider = Arc::new(provider);
        self
    }

    /// Overrides how the upload task is built.
    #[must_use]
    pub fn with_upload_task_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn(Arc<dyn ObjectStore>, &str) -> Box<dyn Task> + Send + Sync + 'static,
    {
        self.upload_task_provider = Arc::new(provider);
        self
    }

    /// Overrides how the cleanup task is built.
    #[must_use]
    pub fn with_cleanup_task_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn(&Utf8Path, &Utf8Path) -> Box<dyn Task> + Send + Sync + 'static,
    {
        self.cleanup_task_provider = Arc::new(provider);
        self
    }

    /// Backs up the data store behind `client` to `destination` in object
    /// storage.
    ///
    /// No retries happen here. Callers that need a deadline beyond the
    /// snapshot timeout wrap the whole call.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Snapshot`] when no snapshot could be taken,
    /// [`BackupError::TempPath`] when no temporary path could be allocated,
    /// and [`BackupError::Pipeline`] with the failing stage's error when the
    /// rename or upload fails. Cleanup errors are never returned.
    pub async fn backup(
        &self,
        client: Arc<dyn DataStoreClient>,
        destination: &str,
    ) -> Result<(), BackupError> {
        let span = info_span!("backup", data_store_address = %client.address());
        self.run(client, destination).instrument(span).await
    }

    async fn run(
        &self,
        client: Arc<dyn DataStoreClient>,
        destination: &str,
    ) -> Result<(), BackupError> {
        info!(event = "starting", "backup");

        let snapshotter = (self.snapshotter_provider)(client, self.snapshot_timeout);
        let artifact = snapshotter.snapshot().await.map_err(|err| {
            error!(event = "failed", error = %err, "backup");
            BackupError::from(err)
        })?;

        let original_path = artifact.path().to_owned();
        // The directory lives until this function returns, after cleanup.
        let temp_dir = tempfile::Builder::new()
            .prefix(TEMP_DIR_PREFIX)
            .tempdir()
            .map_err(|err| temp_path_error(&err.to_string()))?;
        let temp_path = Utf8PathBuf::from_path_buf(temp_dir.path().join(Uuid::new_v4().to_string()))
            .map_err(|path| temp_path_error(&format!("non-UTF-8 path {}", path.display())))?;

        let primary = Pipeline::new(
            BACKUP_PIPELINE,
            vec![
                (self.rename_task_provider)(&temp_path),
                (self.upload_task_provider)(Arc::clone(&self.store), destination),
            ],
        );
        let cleanup = Pipeline::new(
            CLEANUP_PIPELINE,
            vec![(self.cleanup_task_provider)(&original_path, &temp_path)],
        );

        let result = primary.run(artifact.clone()).await;
        if let Err(err) = &result {
            error!(event = "failed", error = %err, "backup");
        }

        if let Err(err) = cleanup.run(artifact).await {
            warn!(error = %err, "backup cleanup failed");
        }

        info!(event = "done", "backup");
        result.map(|_| ()).map_err(BackupError::from)
    }
}

fn default_snapshotter(client: Arc<dyn DataStoreClient>, timeout: Duration) -> Box<dyn Snapshotter> {
    Box::new(BackgroundSaveSnapshotter::new(client, timeout))
}

fn default_rename_task(target: &Utf8Path) -> Box<dyn Task> {
    Box::new(RenameTask::new(target))
}

fn default_upload_task(store: Arc<dyn ObjectStore>, remote_path: &str) -> Box<dyn Task> {
    Box::new(UploadTask::new(store, remote_path))
}

fn default_cleanup_task(original: &Utf8Path, renamed: &Utf8Path) -> Box<dyn Task> {
    Box::new(CleanupTask::new(original, renamed))
}

fn temp_path_error(message: &str) -> BackupError {
    error!(event = "failed", error = %message, "backup");
    BackupError::TempPath(message.to_owned())
}

impl std::fmt::Debug for Backuper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backuper")
            .field("snapshot_timeout", &self.snapshot_timeout)
            .finish_non_exhaustive()
    }
}
