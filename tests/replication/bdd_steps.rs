//! BDD step definitions for instance replication.

use rstest_bdd_macros::{given, then, when};
use tandem::{Instance, RepositoryError, ReplicatedInstanceCreator, Role, SlaveBrokerClient};

use super::test_helpers::ReplicationContext;

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("failed to prepare scenario: {0}")]
    Setup(String),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[derive(Clone, Copy, Debug)]
enum Operation {
    Create,
    Destroy,
}

#[given("a master broker with a live peer")]
fn master_broker(mut replication_context: ReplicationContext) -> ReplicationContext {
    replication_context.role = Role::Master;
    replication_context
}

#[given("a slave broker with a live peer")]
fn slave_broker(mut replication_context: ReplicationContext) -> ReplicationContext {
    replication_context.role = Role::Slave;
    replication_context
}

#[given("the peer cannot start instances")]
fn peer_cannot_start(replication_context: ReplicationContext) -> ReplicationContext {
    replication_context
        .peer
        .fail_create(RepositoryError::Backend(String::from("no free ports")));
    replication_context
}

#[given("the peer cannot stop instances")]
fn peer_cannot_stop(replication_context: ReplicationContext) -> ReplicationContext {
    replication_context
        .peer
        .fail_destroy(RepositoryError::Backend(String::from("process still running")));
    replication_context
}

#[given("instance \"{instance_id}\" exists on both nodes")]
fn exists_on_both(
    mut replication_context: ReplicationContext,
    instance_id: String,
) -> ReplicationContext {
    let instance = Instance::new(instance_id, 6380, "s3cret");
    replication_context.local = replication_context.local.with_instance(instance.clone());
    replication_context.peer = replication_context.peer.with_instance(instance);
    replication_context
}

fn run(
    replication_context: ReplicationContext,
    instance_id: String,
    operation: Operation,
) -> Result<ReplicationContext, StepError> {
    let client = SlaveBrokerClient::new(replication_context.peer_config())
        .map_err(|err| StepError::Setup(err.to_string()))?;
    let creator = ReplicatedInstanceCreator::new(
        replication_context.local.clone(),
        client,
        replication_context.role,
    );

    let result = replication_context.runtime.block_on(async move {
        match operation {
            Operation::Create => creator.create(&instance_id).await,
            Operation::Destroy => creator.destroy(&instance_id).await,
        }
    });

    Ok(ReplicationContext {
        outcome: Some(result.map_err(|err| err.to_string())),
        ..replication_context
    })
}

#[when("I create instance \"{instance_id}\"")]
fn create_instance(
    replication_context: ReplicationContext,
    instance_id: String,
) -> Result<ReplicationContext, StepError> {
    run(replication_context, instance_id, Operation::Create)
}

#[when("I destroy instance \"{instance_id}\"")]
fn destroy_instance(
    replication_context: ReplicationContext,
    instance_id: String,
) -> Result<ReplicationContext, StepError> {
    run(replication_context, instance_id, Operation::Destroy)
}

#[then("the operation succeeds")]
fn operation_succeeds(replication_context: &ReplicationContext) -> Result<(), StepError> {
    match &replication_context.outcome {
        Some(Ok(())) => Ok(()),
        Some(Err(err)) => Err(StepError::Assertion(format!("operation failed: {err}"))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("the operation fails with \"{expected}\"")]
fn operation_fails(replication_context: &ReplicationContext, expected: String) -> Result<(), StepError> {
    match &replication_context.outcome {
        Some(Err(err)) if err.contains(&expected) => Ok(()),
        Some(Err(err)) => Err(StepError::Assertion(format!(
            "expected error containing '{expected}', got '{err}'"
        ))),
        Some(Ok(())) => Err(StepError::Assertion(String::from(
            "operation succeeded unexpectedly",
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("instance \"{instance_id}\" matches on both nodes")]
fn matches_on_both(
    replication_context: &ReplicationContext,
    instance_id: String,
) -> Result<(), StepError> {
    let local = replication_context.local.get(&instance_id);
    let peer = replication_context.peer.get(&instance_id);
    match (&local, &peer) {
        (Some(left), Some(right)) if left == right => Ok(()),
        _ => Err(StepError::Assertion(format!(
            "local {local:?} and peer {peer:?} differ"
        ))),
    }
}

#[then("instance \"{instance_id}\" exists on the local node only")]
fn local_only(replication_context: &ReplicationContext, instance_id: String) -> Result<(), StepError> {
    let on_local = replication_context.local.contains(&instance_id);
    let on_peer = replication_context.peer.contains(&instance_id);
    if on_local && !on_peer {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected local-only, got local={on_local} peer={on_peer}"
        )))
    }
}

#[then("instance \"{instance_id}\" exists on neither node")]
fn on_neither(replication_context: &ReplicationContext, instance_id: String) -> Result<(), StepError> {
    let on_local = replication_context.local.contains(&instance_id);
    let on_peer = replication_context.peer.contains(&instance_id);
    if on_local || on_peer {
        Err(StepError::Assertion(format!(
            "expected removal, got local={on_local} peer={on_peer}"
        )))
    } else {
        Ok(())
    }
}
