//! Shared fixtures for replication BDD scenarios.
//!
//! Each scenario runs a real peer router on `127.0.0.1:0` backed by its own
//! in-memory repository. The runtime lives in the context so the server
//! outlives individual steps.

use std::sync::Arc;
use std::time::Duration;

use rstest::fixture;
use tandem::peer::PeerTls;
use tandem::peer::server::{BasicCredentials, router};
use tandem::test_support::InMemoryRepository;
use tandem::{PeerConfig, Role};
use thiserror::Error;
use tokio::runtime::Runtime;

pub const USERNAME: &str = "broker";
pub const PASSWORD: &str = "correct-horse";

#[derive(Clone, Debug)]
pub struct ReplicationContext {
    pub runtime: Arc<Runtime>,
    pub local: InMemoryRepository,
    pub peer: InMemoryRepository,
    pub peer_url: String,
    pub role: Role,
    pub outcome: Option<Result<(), String>>,
}

impl ReplicationContext {
    pub fn peer_config(&self) -> PeerConfig {
        PeerConfig {
            base_url: self.peer_url.clone(),
            username: String::from(USERNAME),
            password: String::from(PASSWORD),
            tls: PeerTls::Verify,
            timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Debug, Error)]
pub enum ReplicationTestError {
    #[error("failed to start peer: {0}")]
    Peer(String),
}

#[fixture]
pub fn replication_context_result() -> Result<ReplicationContext, ReplicationTestError> {
    build_replication_context()
}

#[fixture]
pub fn replication_context(
    replication_context_result: Result<ReplicationContext, ReplicationTestError>,
) -> ReplicationContext {
    replication_context_result
        .unwrap_or_else(|err| panic!("replication context fixture should initialise: {err}"))
}

pub fn build_replication_context() -> Result<ReplicationContext, ReplicationTestError> {
    let runtime = Runtime::new().map_err(|err| ReplicationTestError::Peer(err.to_string()))?;
    let peer = InMemoryRepository::new();
    let app = router(
        Arc::new(peer.clone()),
        BasicCredentials {
            username: String::from(USERNAME),
            password: String::from(PASSWORD),
        },
    );
    let listener = runtime
        .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
        .map_err(|err| ReplicationTestError::Peer(err.to_string()))?;
    let addr = listener
        .local_addr()
        .map_err(|err| ReplicationTestError::Peer(err.to_string()))?;
    runtime.spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    Ok(ReplicationContext {
        runtime: Arc::new(runtime),
        local: InMemoryRepository::new(),
        peer,
        peer_url: format!("http://{addr}"),
        role: Role::Slave,
        outcome: None,
    })
}
