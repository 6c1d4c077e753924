//! Transfers the artifact to object storage.

use std::sync::Arc;

use crate::artifact::Artifact;
use crate::pipeline::{Task, TaskError, TaskFuture};
use crate::storage::ObjectStore;

/// Metadata key recording where the artifact was uploaded.
pub const REMOTE_PATH_KEY: &str = "remote_path";

/// Uploads the artifact's bytes to a fixed remote path.
#[derive(Clone)]
pub struct UploadTask {
    store: Arc<dyn ObjectStore>,
    remote_path: String,
}

impl UploadTask {
    /// Creates a task uploading to `remote_path` in `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, remote_path: impl Into<String>) -> Self {
        Self {
            store,
            remote_path: remote_path.into(),
        }
    }

    async fn transfer(&self, artifact: Artifact) -> Result<Artifact, TaskError> {
        self.store
            .upload(artifact.path(), &self.remote_path)
            .await?;
        Ok(artifact.with_metadata(REMOTE_PATH_KEY, self.remote_path.clone()))
    }
}

impl Task for UploadTask {
    fn name(&self) -> &str {
        "upload"
    }

    fn apply(&self, artifact: Artifact) -> TaskFuture<'_> {
        Box::pin(self.transfer(artifact))
    }
}

impl std::fmt::Debug for UploadTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadTask")
            .field("remote_path", &self.remote_path)
            .finish_non_exhaustive()
    }
}
