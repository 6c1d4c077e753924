//! Removes local snapshot files once a backup attempt has finished.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};

use crate::artifact::Artifact;
use crate::pipeline::{Task, TaskError, TaskFuture};

/// Removes both the original snapshot and its renamed copy. Paths that are
/// already gone count as removed.
#[derive(Clone, Debug)]
pub struct CleanupTask {
    original: Utf8PathBuf,
    renamed: Utf8PathBuf,
}

impl CleanupTask {
    /// Creates a cleanup task for the two snapshot locations.
    #[must_use]
    pub fn new(original: impl Into<Utf8PathBuf>, renamed: impl Into<Utf8PathBuf>) -> Self {
        Self {
            original: original.into(),
            renamed: renamed.into(),
        }
    }

    async fn remove_all(&self, artifact: Artifact) -> Result<Artifact, TaskError> {
        let mut remaining = Vec::new();
        let mut first_error = None;
        for path in [&self.original, &self.renamed] {
            if let Err(err) = remove_if_present(path).await {
                remaining.push(path.clone());
                first_error.get_or_insert_with(|| err.to_string());
            }
        }

        match first_error {
            None => Ok(artifact),
            Some(message) => Err(TaskError::Cleanup {
                paths: remaining,
                message,
            }),
        }
    }
}

async fn remove_if_present(path: &Utf8Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

impl Task for CleanupTask {
    fn name(&self) -> &str {
        "cleanup"
    }

    fn apply(&self, artifact: Artifact) -> TaskFuture<'_> {
        Box::pin(self.remove_all(artifact))
    }
}
