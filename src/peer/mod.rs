//! Node-to-node provisioning protocol.
//!
//! The master pushes instance descriptors to its peer with
//! `PUT /provisionslave` and removes them with
//! `DELETE /v2/service_instances/{instance_id}`. Both calls carry the
//! brokers' shared HTTP Basic credentials and succeed only on `200 OK`.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

use crate::instance::Instance;

mod client;
pub mod server;

pub use client::SlaveBrokerClient;

/// Path of the peer provisioning endpoint.
pub const PROVISION_PATH: &str = "/provisionslave";

/// Prefix of the peer deprovisioning endpoint.
pub const SERVICE_INSTANCES_PATH: &str = "/v2/service_instances";

/// Future returned by peer operations.
pub type PeerFuture<'a> = Pin<Box<dyn Future<Output = Result<(), PeerError>> + Send + 'a>>;

/// Replicates instance lifecycle changes to the peer node.
pub trait PeerProvisioner: Send + Sync {
    /// Creates the mirror of `instance` on the peer.
    fn create_peer_instance<'a>(&'a self, instance: &'a Instance) -> PeerFuture<'a>;

    /// Destroys the mirror of `instance` on the peer.
    fn destroy_peer_instance<'a>(&'a self, instance: &'a Instance) -> PeerFuture<'a>;
}

/// How peer TLS certificates are treated.
///
/// Both brokers belong to one deployment and commonly present self-signed
/// certificates, so skipping verification is supported but must be chosen
/// explicitly in configuration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PeerTls {
    /// Verify certificates against the system roots.
    Verify,
    /// Accept any certificate the peer presents.
    SkipVerification,
}

/// Connection settings for [`SlaveBrokerClient`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PeerConfig {
    /// Scheme, host, and port of the peer, e.g. `https://10.0.0.2:12350`.
    pub base_url: String,
    /// HTTP Basic user name.
    pub username: String,
    /// HTTP Basic password.
    pub password: String,
    /// Certificate policy.
    pub tls: PeerTls,
    /// Transport timeout per request.
    pub timeout: Duration,
}

/// Errors raised by peer calls.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PeerError {
    /// Raised when the HTTP client cannot be constructed.
    #[error("failed to build peer client: {0}")]
    Client(String),
    /// Raised when the descriptor cannot be encoded.
    #[error("failed to encode instance descriptor: {0}")]
    Encode(String),
    /// Raised when no response was received.
    #[error("slave broker unreachable: {0}")]
    Transport(String),
    /// Raised when the peer answers with anything but `200 OK`.
    #[error("Slave broker error: {status}, {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },
}
