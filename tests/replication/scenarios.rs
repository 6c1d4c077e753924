//! BDD scenarios for instance replication.

use rstest_bdd_macros::scenario;

use super::test_helpers::{ReplicationContext, replication_context};

#[scenario(
    path = "tests/features/replication.feature",
    name = "Master replicates a new instance to its peer"
)]
fn scenario_master_replicates(replication_context: ReplicationContext) {
    let _ = replication_context;
}

#[scenario(
    path = "tests/features/replication.feature",
    name = "Peer failure leaves the instance on the local node only"
)]
fn scenario_peer_create_failure(replication_context: ReplicationContext) {
    let _ = replication_context;
}

#[scenario(
    path = "tests/features/replication.feature",
    name = "Failed peer removal keeps both copies"
)]
fn scenario_peer_destroy_failure(replication_context: ReplicationContext) {
    let _ = replication_context;
}

#[scenario(
    path = "tests/features/replication.feature",
    name = "Master removes the peer copy and then its own"
)]
fn scenario_master_destroy(replication_context: ReplicationContext) {
    let _ = replication_context;
}

#[scenario(
    path = "tests/features/replication.feature",
    name = "Slave brokers never call their peer"
)]
fn scenario_slave_is_local_only(replication_context: ReplicationContext) {
    let _ = replication_context;
}
