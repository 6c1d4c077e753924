//! BDD scenarios for the backup workflow.

use rstest_bdd_macros::scenario;

use super::test_helpers::{BackupContext, backup_context};

#[scenario(
    path = "tests/features/backup.feature",
    name = "Successful backup uploads the snapshot and removes local copies"
)]
fn scenario_successful_backup(backup_context: BackupContext) {
    let _ = backup_context;
}

#[scenario(
    path = "tests/features/backup.feature",
    name = "Upload failure is returned after cleanup"
)]
fn scenario_upload_failure(backup_context: BackupContext) {
    let _ = backup_context;
}

#[scenario(
    path = "tests/features/backup.feature",
    name = "Snapshot timeout skips every stage"
)]
fn scenario_snapshot_timeout(backup_context: BackupContext) {
    let _ = backup_context;
}
