//! Command-line interface definitions for the `tandem` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the `tandem` binary.
#[derive(Debug, Parser)]
#[command(
    name = "tandem",
    about = "Operate a replicated broker pair and its snapshot backups",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Drive the peer broker directly.
    #[command(subcommand)]
    Peer(PeerCommand),
    /// Upload one file to the configured object store.
    #[command(name = "upload", about = "Upload one file to the configured object store")]
    Upload(UploadCommand),
}

/// Subcommands of `tandem peer`.
#[derive(Debug, Subcommand)]
pub(crate) enum PeerCommand {
    /// Push an instance descriptor to the peer broker.
    #[command(name = "provision", about = "Push an instance descriptor to the peer broker")]
    Provision(ProvisionCommand),
    /// Remove an instance from the peer broker.
    #[command(name = "deprovision", about = "Remove an instance from the peer broker")]
    Deprovision(DeprovisionCommand),
}

/// Arguments for `tandem peer provision`.
///
/// Used to repair divergence by hand when the master holds an instance its
/// peer does not.
#[derive(Args, Debug)]
pub(crate) struct ProvisionCommand {
    /// Instance identifier.
    #[arg(long, value_name = "ID")]
    pub(crate) id: String,
    /// Port the instance listens on.
    #[arg(long, value_name = "PORT")]
    pub(crate) port: u16,
    /// Access credential of the instance.
    #[arg(long, value_name = "PASSWORD", env = "TANDEM_INSTANCE_PASSWORD")]
    pub(crate) password: String,
}

/// Arguments for `tandem peer deprovision`.
#[derive(Args, Debug)]
pub(crate) struct DeprovisionCommand {
    /// Instance identifier.
    #[arg(long, value_name = "ID")]
    pub(crate) id: String,
}

/// Arguments for `tandem upload`.
#[derive(Args, Debug)]
pub(crate) struct UploadCommand {
    /// Local file to upload.
    #[arg(value_name = "LOCAL")]
    pub(crate) local: String,
    /// Object key inside the configured bucket.
    #[arg(value_name = "REMOTE")]
    pub(crate) remote: String,
}
