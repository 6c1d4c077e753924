//! Shared fixtures for backup BDD scenarios.

use std::sync::{Arc, Mutex};

use camino::Utf8PathBuf;
use rstest::fixture;
use tandem::test_support::{FakeDataStore, RecordingStore};
use tempfile::TempDir;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct BackupContext {
    pub data_store: FakeDataStore,
    pub store: RecordingStore,
    pub snapshot: Utf8PathBuf,
    pub renamed: Arc<Mutex<Option<Utf8PathBuf>>>,
    pub outcome: Option<Result<(), String>>,
    pub(crate) workspace: Arc<TempDir>,
}

#[derive(Clone, Debug, Error)]
pub enum BackupTestError {
    #[error("failed to create workspace: {0}")]
    Workspace(String),
}

#[fixture]
pub fn backup_context_result() -> Result<BackupContext, BackupTestError> {
    build_backup_context()
}

#[fixture]
pub fn backup_context(
    backup_context_result: Result<BackupContext, BackupTestError>,
) -> BackupContext {
    backup_context_result
        .unwrap_or_else(|err| panic!("backup context fixture should initialise: {err}"))
}

pub fn build_backup_context() -> Result<BackupContext, BackupTestError> {
    let workspace =
        TempDir::new().map_err(|err| BackupTestError::Workspace(format!("tempdir: {err}")))?;
    let snapshot = Utf8PathBuf::from_path_buf(workspace.path().join("dump.rdb")).map_err(|path| {
        BackupTestError::Workspace(format!("non-utf8 tempdir path: {}", path.display()))
    })?;

    Ok(BackupContext {
        data_store: FakeDataStore::new("10.0.0.5:6379", snapshot.clone()),
        store: RecordingStore::new(),
        snapshot,
        renamed: Arc::new(Mutex::new(None)),
        outcome: None,
        workspace: Arc::new(workspace),
    })
}
