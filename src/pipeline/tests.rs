//! Unit tests for pipeline ordering and failure handling.

use rstest::rstest;

use super::*;
use crate::test_support::{EventLog, LogCapture, ScriptedTask};

fn artifact() -> Artifact {
    Artifact::new("/data/dump.rdb")
}

#[tokio::test]
async fn tasks_run_in_order_threading_the_artifact() {
    let log = EventLog::new();
    let pipeline = Pipeline::new(
        "demo",
        vec![
            ScriptedTask::succeeding("first", &log)
                .relocating_to("/tmp/moved.rdb")
                .boxed(),
            ScriptedTask::succeeding("second", &log).boxed(),
        ],
    );

    let result = pipeline.run(artifact()).await.expect("pipeline succeeds");

    assert_eq!(result.path().as_str(), "/tmp/moved.rdb");
    assert_eq!(
        log.events(),
        vec![
            String::from("first:/data/dump.rdb"),
            String::from("second:/tmp/moved.rdb"),
        ]
    );
}

#[rstest]
#[case::first(0)]
#[case::middle(1)]
#[case::last(2)]
#[tokio::test]
async fn later_tasks_never_run_after_a_failure(#[case] failing: usize) {
    let log = EventLog::new();
    let names = ["alpha", "beta", "gamma"];
    let tasks = names
        .iter()
        .enumerate()
        .map(|(index, name)| {
            if index == failing {
                ScriptedTask::failing(*name, TaskError::Failed(format!("{name} broke")), &log).boxed()
            } else {
                ScriptedTask::succeeding(*name, &log).boxed()
            }
        })
        .collect();
    let pipeline = Pipeline::new("demo", tasks);

    let err = pipeline.run(artifact()).await.expect_err("pipeline fails");

    let failed_name = names.get(failing).copied().expect("case index in range");
    assert_eq!(err.pipeline, "demo");
    assert_eq!(err.task, failed_name);
    assert_eq!(err.to_string(), format!("{failed_name} broke"));
    assert_eq!(log.events().len(), failing + 1);
}

#[tokio::test]
async fn empty_pipeline_returns_its_input() {
    let pipeline = Pipeline::new("noop", Vec::new());

    let result = pipeline.run(artifact()).await.expect("pipeline succeeds");

    assert_eq!(result, artifact());
}

#[tokio::test]
async fn completion_event_is_logged_once() {
    let log = EventLog::new();
    let logs = LogCapture::new();
    let pipeline = Pipeline::new("cleanup", vec![ScriptedTask::succeeding("remove", &log).boxed()]);

    logs.run(pipeline.run(artifact())).await.expect("pipeline succeeds");

    assert_eq!(logs.count_containing("pipeline cleanup starting"), 1);
    assert_eq!(logs.count_containing("pipeline cleanup completed"), 1);
}

#[tokio::test]
async fn failure_is_logged_without_completion() {
    let log = EventLog::new();
    let pipeline = Pipeline::new(
        "redis-backup",
        vec![ScriptedTask::failing("upload", TaskError::Failed(String::from("denied")), &log).boxed()],
    );

    let logs = LogCapture::new();
    logs.run(pipeline.run(artifact())).await.expect_err("pipeline fails");

    assert_eq!(logs.count_containing("pipeline redis-backup failed"), 1);
    assert_eq!(logs.count_containing("pipeline redis-backup completed"), 0);
}

#[test]
fn cleanup_error_lists_every_remaining_path() {
    let err = TaskError::Cleanup {
        paths: vec![Utf8PathBuf::from("/a"), Utf8PathBuf::from("/b")],
        message: String::from("permission denied"),
    };

    assert_eq!(err.to_string(), "failed to remove /a, /b: permission denied");
}
