//! Ordered task execution over an [`Artifact`].
//!
//! A [`Pipeline`] applies each [`Task`] to the artifact produced by its
//! predecessor. The first failure stops the run: later tasks are never
//! polled and nothing is compensated. Callers that need compensation run a
//! second pipeline themselves (see [`crate::backup::Backuper`]).

use std::future::Future;
use std::pin::Pin;

use camino::Utf8PathBuf;
use thiserror::Error;
use tracing::{error, info};

use crate::artifact::Artifact;
use crate::storage::StorageError;

#[cfg(test)]
mod tests;

/// Future returned by [`Task::apply`].
pub type TaskFuture<'a> = Pin<Box<dyn Future<Output = Result<Artifact, TaskError>> + Send + 'a>>;

/// Single named unit of pipelined work.
pub trait Task: Send + Sync {
    /// Name used in log events and errors.
    fn name(&self) -> &str;

    /// Transforms the artifact, returning the artifact for the next task.
    fn apply(&self, artifact: Artifact) -> TaskFuture<'_>;
}

/// Errors raised by individual tasks.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TaskError {
    /// Raised when the artifact cannot be moved to its new location.
    #[error("failed to move {from} to {to}: {message}")]
    Rename {
        /// Path the artifact was read from.
        from: Utf8PathBuf,
        /// Destination path.
        to: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// Raised when the object store rejects or cannot receive the upload.
    #[error(transparent)]
    Upload(#[from] StorageError),
    /// Raised when one or more paths could not be removed.
    #[error("failed to remove {joined}: {message}", joined = join_paths(paths))]
    Cleanup {
        /// Paths that are still present.
        paths: Vec<Utf8PathBuf>,
        /// Error string for the first failure.
        message: String,
    },
    /// Free-form failure for tasks without a dedicated variant.
    #[error("{0}")]
    Failed(String),
}

fn join_paths(paths: &[Utf8PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failure of a pipeline run, naming the task that stopped it.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{source}")]
pub struct PipelineError {
    /// Pipeline that was running.
    pub pipeline: String,
    /// Task that failed.
    pub task: String,
    /// Error returned by the task.
    #[source]
    pub source: TaskError,
}

/// Named ordered sequence of tasks.
pub struct Pipeline {
    name: String,
    tasks: Vec<Box<dyn Task>>,
}

impl Pipeline {
    /// Builds a pipeline. Events are emitted inside whatever span the caller
    /// has entered, which acts as the pipeline's logging context.
    #[must_use]
    pub fn new(name: impl Into<String>, tasks: Vec<Box<dyn Task>>) -> Self {
        Self {
            name: name.into(),
            tasks,
        }
    }

    /// Runs every task in order, starting from `artifact`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] for the first task that fails; no later
    /// task runs.
    pub async fn run(&self, artifact: Artifact) -> Result<Artifact, PipelineError> {
        info!(pipeline = %self.name, event = "starting", "pipeline {} starting", self.name);

        let mut current = artifact;
        for task in &self.tasks {
            info!(pipeline = %self.name, task = task.name(), event = "starting", "task starting");
            current = match task.apply(current).await {
                Ok(next) => next,
                Err(err) => {
                    error!(
                        pipeline = %self.name,
                        task = task.name(),
                        event = "failed",
                        error = %err,
                        "pipeline {} failed",
                        self.name
                    );
                    return Err(PipelineError {
                        pipeline: self.name.clone(),
                        task: task.name().to_owned(),
                        source: err,
                    });
                }
            };
            info!(pipeline = %self.name, task = task.name(), event = "done", "task done");
        }

        info!(pipeline = %self.name, event = "done", "pipeline {} completed", self.name);
        Ok(current)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field(
                "tasks",
                &self.tasks.iter().map(|task| task.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
