//! Moves the artifact to a new location.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::artifact::Artifact;
use crate::pipeline::{Task, TaskError, TaskFuture};

/// Moves the artifact file to a fixed target path.
#[derive(Clone, Debug)]
pub struct RenameTask {
    target: Utf8PathBuf,
}

impl RenameTask {
    /// Creates a task that moves artifacts to `target`.
    #[must_use]
    pub fn new(target: impl Into<Utf8PathBuf>) -> Self {
        Self {
            target: target.into(),
        }
    }

    async fn relocate(&self, artifact: Artifact) -> Result<Artifact, TaskError> {
        let from = artifact.path().to_owned();
        move_file(&from, &self.target)
            .await
            .map_err(|err| TaskError::Rename {
                from: from.clone(),
                to: self.target.clone(),
                message: err.to_string(),
            })?;
        Ok(artifact.relocated(self.target.clone()))
    }
}

/// Renames `from` to `to`, copying then removing when a plain rename is
/// refused (for example across filesystems).
async fn move_file(from: &Utf8Path, to: &Utf8Path) -> io::Result<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Err(err),
        Err(err) => {
            debug!(%from, %to, error = %err, "rename refused, copying instead");
            tokio::fs::copy(from, to).await?;
            tokio::fs::remove_file(from).await
        }
    }
}

impl Task for RenameTask {
    fn name(&self) -> &str {
        "rename"
    }

    fn apply(&self, artifact: Artifact) -> TaskFuture<'_> {
        Box::pin(self.relocate(artifact))
    }
}
