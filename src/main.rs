//! Binary entry point for the `tandem` operator CLI.

use std::io::{self, Write};
use std::process;

use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use tandem::config::ConfigError;
use tandem::{
    BackupConfig, BrokerConfig, Instance, ObjectStore, PeerError, S3Store, SlaveBrokerClient,
    StorageError,
};

mod cli;

use cli::{Cli, DeprovisionCommand, PeerCommand, ProvisionCommand, UploadCommand};

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("peer request failed: {0}")]
    Peer(#[from] PeerError),
    #[error("upload failed: {0}")]
    Storage(#[from] StorageError),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli {
        Cli::Peer(command) => {
            let client = peer_client()?;
            match command {
                PeerCommand::Provision(args) => provision(&client, args, io::stdout()).await,
                PeerCommand::Deprovision(DeprovisionCommand { id }) => {
                    deprovision(&client, &id, io::stdout()).await
                }
            }
        }
        Cli::Upload(args) => {
            let config = BackupConfig::load_without_cli_args()?;
            let store = S3Store::new(&config)?;
            upload(&store, args, io::stdout()).await
        }
    }
}

fn peer_client() -> Result<SlaveBrokerClient, CliError> {
    let config = BrokerConfig::load_without_cli_args()?;
    Ok(SlaveBrokerClient::new(config.peer_config()?)?)
}

async fn provision(
    client: &SlaveBrokerClient,
    args: ProvisionCommand,
    mut out: impl Write,
) -> Result<(), CliError> {
    let instance = Instance::new(args.id, args.port, args.password);
    client.create_slave_instance(&instance).await?;
    writeln!(out, "provisioned {} on peer", instance.id).ok();
    Ok(())
}

async fn deprovision(
    client: &SlaveBrokerClient,
    instance_id: &str,
    mut out: impl Write,
) -> Result<(), CliError> {
    client.destroy_slave_instance(instance_id).await?;
    writeln!(out, "deprovisioned {instance_id} on peer").ok();
    Ok(())
}

async fn upload(
    store: &dyn ObjectStore,
    args: UploadCommand,
    mut out: impl Write,
) -> Result<(), CliError> {
    let local = Utf8PathBuf::from(args.local);
    store.upload(&local, &args.remote).await?;
    writeln!(out, "uploaded {local} to {}", args.remote).ok();
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
