//! Data-store instance descriptors shared by both broker nodes.

use serde::{Deserialize, Serialize};

/// Descriptor for one provisioned data-store instance.
///
/// The JSON form (`{"id", "port", "password"}`) is the body of the peer
/// provisioning call.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Instance {
    /// Identifier, unique per node.
    pub id: String,
    /// TCP port the data-store process listens on.
    pub port: u16,
    /// Access credential clients authenticate with.
    pub password: String,
}

impl Instance {
    /// Creates a descriptor.
    #[must_use]
    pub fn new(id: impl Into<String>, port: u16, password: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            port,
            password: password.into(),
        }
    }
}

/// Replication role of a broker node.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    /// Initiates peer calls for every create and destroy.
    Master,
    /// Performs local operations only.
    Slave,
}

impl Role {
    /// Returns `true` for [`Role::Master`].
    #[must_use]
    pub const fn is_master(self) -> bool {
        matches!(self, Self::Master)
    }
}
