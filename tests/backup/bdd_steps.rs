//! BDD step definitions for the backup workflow.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use rstest_bdd_macros::{given, then, when};
use tandem::storage::StorageError;
use tandem::{Backuper, RenameTask, Task};
use tokio::runtime::Runtime;

use super::test_helpers::BackupContext;

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("failed to prepare scenario: {0}")]
    Setup(String),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn recorded_rename(renamed: &Arc<Mutex<Option<Utf8PathBuf>>>) -> Option<Utf8PathBuf> {
    renamed
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

#[given("a data store with a snapshot on disk")]
fn snapshot_on_disk(backup_context: BackupContext) -> Result<BackupContext, StepError> {
    std::fs::write(&backup_context.snapshot, b"REDIS0009")
        .map_err(|err| StepError::Setup(err.to_string()))?;
    Ok(backup_context)
}

#[given("a data store whose background save never finishes")]
fn save_never_finishes(backup_context: BackupContext) -> BackupContext {
    backup_context.data_store.never_finish();
    backup_context
}

#[given("the object store fails with \"{message}\"")]
fn store_fails(backup_context: BackupContext, message: String) -> BackupContext {
    backup_context
        .store
        .fail_with(StorageError::transport(message));
    backup_context
}

#[when("I back up to \"{destination}\"")]
fn run_backup(
    backup_context: BackupContext,
    destination: String,
) -> Result<BackupContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Setup(err.to_string()))?;
    let captured = Arc::clone(&backup_context.renamed);
    let backuper = Backuper::new(
        Duration::from_secs(1),
        Arc::new(backup_context.store.clone()),
    )
    .with_rename_task_provider(move |target: &Utf8Path| -> Box<dyn Task> {
        *captured.lock().unwrap_or_else(PoisonError::into_inner) = Some(target.to_owned());
        Box::new(RenameTask::new(target))
    });
    let client = Arc::new(backup_context.data_store.clone());

    let result = runtime.block_on(async move { backuper.backup(client, &destination).await });

    Ok(BackupContext {
        outcome: Some(result.map_err(|err| err.to_string())),
        ..backup_context
    })
}

#[then("the backup succeeds")]
fn backup_succeeds(backup_context: &BackupContext) -> Result<(), StepError> {
    match &backup_context.outcome {
        Some(Ok(())) => Ok(()),
        Some(Err(err)) => Err(StepError::Assertion(format!("backup failed: {err}"))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("the backup fails with \"{expected}\"")]
fn backup_fails(backup_context: &BackupContext, expected: String) -> Result<(), StepError> {
    match &backup_context.outcome {
        Some(Err(err)) if err.contains(&expected) => Ok(()),
        Some(Err(err)) => Err(StepError::Assertion(format!(
            "expected error containing '{expected}', got '{err}'"
        ))),
        Some(Ok(())) => Err(StepError::Assertion(String::from(
            "backup succeeded unexpectedly",
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("the object store received \"{remote}\"")]
fn store_received(backup_context: &BackupContext, remote: String) -> Result<(), StepError> {
    let uploads = backup_context.store.uploads();
    if uploads.iter().any(|(_, key)| *key == remote) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected an upload to {remote}, saw {uploads:?}"
        )))
    }
}

#[then("the object store received nothing")]
fn store_received_nothing(backup_context: &BackupContext) -> Result<(), StepError> {
    let uploads = backup_context.store.uploads();
    if uploads.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("unexpected uploads {uploads:?}")))
    }
}

#[then("no local snapshot files remain")]
fn no_local_files(backup_context: &BackupContext) -> Result<(), StepError> {
    if backup_context.snapshot.exists() {
        return Err(StepError::Assertion(format!(
            "{} still exists",
            backup_context.snapshot
        )));
    }
    let Some(renamed) = recorded_rename(&backup_context.renamed) else {
        return Err(StepError::Assertion(String::from(
            "rename stage was never built",
        )));
    };
    if renamed.exists() {
        return Err(StepError::Assertion(format!("{renamed} still exists")));
    }
    Ok(())
}
