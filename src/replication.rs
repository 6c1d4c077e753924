//! Instance lifecycle with optional replication to the peer node.
//!
//! On the master every create and destroy touches two processes with no
//! transaction spanning them:
//!
//! - create runs locally first and then on the peer. A failed descriptor
//!   lookup or peer call leaves the instance local-only; the [`Reconciler`]
//!   is told about the divergence and the error is returned.
//! - destroy runs on the peer first. A failed peer call aborts before the
//!   local instance is touched, so the master never forgets an instance the
//!   peer still serves.
//!
//! Divergence is repaired out of band by the periodic consistency verifier.

use thiserror::Error;
use tracing::{info, warn};

use crate::instance::{Instance, Role};
use crate::peer::{PeerError, PeerProvisioner};
use crate::repository::{LocalInstanceRepository, RepositoryError};

/// Errors surfaced by [`ReplicatedInstanceCreator`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ReplicationError {
    /// Raised when the local repository fails.
    #[error(transparent)]
    Local(#[from] RepositoryError),
    /// Raised when the peer call fails.
    #[error(transparent)]
    Peer(#[from] PeerError),
}

/// Hook invoked when master and peer disagree after a partial failure.
pub trait Reconciler: Send + Sync {
    /// Called after the local instance was created but the peer refused it.
    fn peer_create_failed(&self, instance: &Instance, error: &PeerError);

    /// Called after the local instance was created but its descriptor could
    /// not be read back, so the peer was never asked.
    fn descriptor_lookup_failed(&self, instance_id: &str, error: &RepositoryError);
}

/// Leaves divergence for the periodic consistency verifier.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeferToVerifier;

impl Reconciler for DeferToVerifier {
    fn peer_create_failed(&self, instance: &Instance, error: &PeerError) {
        warn!(
            instance_id = %instance.id,
            divergence = "local_only",
            error = %error,
            "peer provisioning failed; instance kept locally until verification"
        );
    }

    fn descriptor_lookup_failed(&self, instance_id: &str, error: &RepositoryError) {
        warn!(
            %instance_id,
            divergence = "local_only",
            error = %error,
            "instance lookup failed before peer provisioning; kept locally until verification"
        );
    }
}

/// Coordinates local instance lifecycle with peer replication.
#[derive(Debug)]
pub struct ReplicatedInstanceCreator<R, P, C = DeferToVerifier> {
    local: R,
    peer: P,
    role: Role,
    reconciler: C,
}

impl<R, P> ReplicatedInstanceCreator<R, P>
where
    R: LocalInstanceRepository,
    P: PeerProvisioner,
{
    /// Creates a coordinator that defers divergence to the verifier.
    #[must_use]
    pub const fn new(local: R, peer: P, role: Role) -> Self {
        Self {
            local,
            peer,
            role,
            reconciler: DeferToVerifier,
        }
    }
}

impl<R, P, C> ReplicatedInstanceCreator<R, P, C>
where
    R: LocalInstanceRepository,
    P: PeerProvisioner,
    C: Reconciler,
{
    /// Replaces the divergence hook.
    #[must_use]
    pub fn with_reconciler<D: Reconciler>(self, reconciler: D) -> ReplicatedInstanceCreator<R, P, D> {
        ReplicatedInstanceCreator {
            local: self.local,
            peer: self.peer,
            role: self.role,
            reconciler,
        }
    }

    /// Returns the node's role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Creates the instance locally and, on the master, on the peer.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicationError::Local`] when the local create or lookup
    /// fails (the peer is untouched; a lookup failure after a successful
    /// create is reported to the reconciler) and [`ReplicationError::Peer`] when the
    /// peer refuses the instance (the local instance is kept).
    pub async fn create(&self, instance_id: &str) -> Result<(), ReplicationError> {
        self.local.create(instance_id).await?;
        info!(%instance_id, "instance created locally");

        if !self.role.is_master() {
            return Ok(());
        }

        let instance = match self.local.find_by_id(instance_id).await {
            Ok(instance) => instance,
            Err(err) => {
                self.reconciler.descriptor_lookup_failed(instance_id, &err);
                return Err(err.into());
            }
        };
        if let Err(err) = self.peer.create_peer_instance(&instance).await {
            self.reconciler.peer_create_failed(&instance, &err);
            return Err(err.into());
        }
        info!(%instance_id, "instance replicated to peer");
        Ok(())
    }

    /// Destroys the instance on the peer (master only) and then locally.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicationError::Peer`] when the peer refuses the destroy;
    /// the local instance is left untouched in that case.
    pub async fn destroy(&self, instance_id: &str) -> Result<(), ReplicationError> {
        if self.role.is_master() {
            let instance = self.local.find_by_id(instance_id).await?;
            self.peer.destroy_peer_instance(&instance).await?;
            info!(%instance_id, "instance removed from peer");
        }

        self.local.destroy(instance_id).await?;
        info!(%instance_id, "instance destroyed locally");
        Ok(())
    }

    /// Reports whether the instance exists on this node. Never asks the peer.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicationError::Local`] when the repository lookup fails.
    pub async fn instance_exists(&self, instance_id: &str) -> Result<bool, ReplicationError> {
        Ok(self.local.instance_exists(instance_id).await?)
    }
}
