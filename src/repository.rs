//! Local instance repository seam.
//!
//! Process supervision and persistence live outside this crate; brokers plug
//! their implementation in through [`LocalInstanceRepository`].

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::instance::Instance;

/// Future returned by repository operations.
pub type RepositoryFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, RepositoryError>> + Send + 'a>>;

/// Instances hosted on this node.
pub trait LocalInstanceRepository: Send + Sync {
    /// Allocates a port and credential and starts a new instance.
    fn create<'a>(&'a self, instance_id: &'a str) -> RepositoryFuture<'a, ()>;

    /// Starts a replica using the port and credential chosen by the master.
    fn create_mirror<'a>(&'a self, instance: &'a Instance) -> RepositoryFuture<'a, ()>;

    /// Returns the descriptor of an existing instance.
    fn find_by_id<'a>(&'a self, instance_id: &'a str) -> RepositoryFuture<'a, Instance>;

    /// Stops the instance and removes its state.
    fn destroy<'a>(&'a self, instance_id: &'a str) -> RepositoryFuture<'a, ()>;

    /// Reports whether the instance exists on this node.
    fn instance_exists<'a>(&'a self, instance_id: &'a str) -> RepositoryFuture<'a, bool>;
}

/// Errors raised by local repositories.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RepositoryError {
    /// Raised when the instance is unknown.
    #[error("instance {instance_id} not found")]
    NotFound {
        /// Requested identifier.
        instance_id: String,
    },
    /// Raised when the identifier is already taken.
    #[error("instance {instance_id} already exists")]
    AlreadyExists {
        /// Conflicting identifier.
        instance_id: String,
    },
    /// Disk or process failure reported by the implementation.
    #[error("{0}")]
    Backend(String),
}
