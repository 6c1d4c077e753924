//! Core library for the Tandem replicated broker pair.
//!
//! The crate covers two jobs a data-store service broker runs alongside its
//! catalogue:
//!
//! - snapshot backups, driven by [`Backuper`] as a primary pipeline
//!   (rename then upload) followed by an unconditional cleanup pipeline;
//! - master/slave replication of instance lifecycle through
//!   [`ReplicatedInstanceCreator`], which calls the peer with
//!   [`SlaveBrokerClient`] and is answered by [`peer::server::router`].

pub mod artifact;
pub mod backup;
pub mod config;
pub mod instance;
pub mod peer;
pub mod pipeline;
pub mod replication;
pub mod repository;
pub mod snapshot;
pub mod storage;
pub mod tasks;
pub mod test_support;

pub use artifact::Artifact;
pub use backup::{BackupError, Backuper};
pub use config::{BackupConfig, BrokerConfig};
pub use instance::{Instance, Role};
pub use peer::{PeerConfig, PeerError, PeerProvisioner, SlaveBrokerClient};
pub use pipeline::{Pipeline, PipelineError, Task, TaskError};
pub use replication::{
    DeferToVerifier, Reconciler, ReplicatedInstanceCreator, ReplicationError,
};
pub use repository::{LocalInstanceRepository, RepositoryError};
pub use snapshot::{
    BackgroundSaveSnapshotter, DataStoreClient, DataStoreError, SnapshotError, Snapshotter,
};
pub use storage::{ObjectStore, S3Store, StorageError};
pub use tasks::{CleanupTask, RenameTask, UploadTask};
