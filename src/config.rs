//! Configuration loading via `ortho-config`.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::instance::Role;
use crate::peer::{PeerConfig, PeerTls};

/// Default port the peer broker listens on.
pub const DEFAULT_PEER_PORT: u16 = 12350;

/// Broker node settings: role, peer address, and shared credentials.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "TANDEM",
    discovery(
        app_name = "tandem",
        env_var = "TANDEM_CONFIG_PATH",
        config_file_name = "tandem.toml",
        dotfile_name = ".tandem.toml",
        project_file_name = "tandem.toml"
    )
)]
pub struct BrokerConfig {
    /// Whether this node is the master of the pair. Only the master calls
    /// its peer.
    #[ortho_config(default = false)]
    pub master: bool,
    /// Host name or IP address of the peer broker.
    pub peer_host: String,
    /// Port the peer broker listens on.
    #[ortho_config(default = DEFAULT_PEER_PORT)]
    pub peer_port: u16,
    /// URL scheme used to reach the peer (`http` or `https`).
    #[ortho_config(default = "http".to_owned())]
    pub peer_scheme: String,
    /// HTTP Basic user name shared by both brokers.
    pub broker_username: String,
    /// HTTP Basic password shared by both brokers.
    pub broker_password: String,
    /// Whether peer TLS certificates are accepted without verification.
    /// There is deliberately no default; operators must choose.
    pub peer_tls_skip_verify: Option<bool>,
    /// Transport timeout for peer calls, in seconds.
    #[ortho_config(default = 30)]
    pub peer_timeout_secs: u64,
}

/// Backup job parameters: snapshot timeout and object storage target.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "TANDEM_BACKUP",
    discovery(
        app_name = "tandem",
        env_var = "TANDEM_CONFIG_PATH",
        config_file_name = "tandem.toml",
        dotfile_name = ".tandem.toml",
        project_file_name = "tandem.toml"
    )
)]
pub struct BackupConfig {
    /// Upper bound on how long a snapshot may take, in seconds.
    #[ortho_config(default = 300)]
    pub snapshot_timeout_secs: u64,
    /// Transport timeout for a single upload, in seconds.
    #[ortho_config(default = 600)]
    pub upload_timeout_secs: u64,
    /// Destination bucket.
    pub bucket_name: String,
    /// Base URL of the S3-compatible endpoint.
    pub endpoint: String,
    /// Access key id.
    pub access_key: String,
    /// Secret access key.
    pub secret_key: String,
    /// Signing region.
    #[ortho_config(default = "us-east-1".to_owned())]
    pub region: String,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
    section: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
        section: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
            section,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to [{}] in tandem.toml",
            self.description, self.env_var, self.toml_key, self.section
        ))
    }
}

fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(metadata.missing());
    }
    Ok(())
}

impl BrokerConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("tandem")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Returns the replication role of this node.
    #[must_use]
    pub const fn role(&self) -> Role {
        if self.master { Role::Master } else { Role::Slave }
    }

    /// Performs semantic validation on required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// or the TLS verification policy has not been stated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_field(
            &self.peer_host,
            &FieldMetadata::new("peer broker host", "TANDEM_PEER_HOST", "peer_host", "broker"),
        )?;
        require_field(
            &self.broker_username,
            &FieldMetadata::new(
                "broker user name",
                "TANDEM_BROKER_USERNAME",
                "broker_username",
                "broker",
            ),
        )?;
        require_field(
            &self.broker_password,
            &FieldMetadata::new(
                "broker password",
                "TANDEM_BROKER_PASSWORD",
                "broker_password",
                "broker",
            ),
        )?;
        if self.peer_tls_skip_verify.is_none() {
            return Err(FieldMetadata::new(
                "peer TLS verification policy",
                "TANDEM_PEER_TLS_SKIP_VERIFY",
                "peer_tls_skip_verify",
                "broker",
            )
            .missing());
        }
        if !matches!(self.peer_scheme.as_str(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "peer_scheme must be http or https, got {}",
                self.peer_scheme
            )));
        }
        Ok(())
    }

    /// Builds the peer client settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn peer_config(&self) -> Result<PeerConfig, ConfigError> {
        self.validate()?;
        let tls = if self.peer_tls_skip_verify == Some(true) {
            PeerTls::SkipVerification
        } else {
            PeerTls::Verify
        };
        Ok(PeerConfig {
            base_url: format!("{}://{}:{}", self.peer_scheme, self.peer_host, self.peer_port),
            username: self.broker_username.clone(),
            password: self.broker_password.clone(),
            tls,
            timeout: Duration::from_secs(self.peer_timeout_secs),
        })
    }
}

impl BackupConfig {
    /// Loads configuration without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("tandem")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Snapshot timeout as a [`Duration`].
    #[must_use]
    pub const fn snapshot_timeout(&self) -> Duration {
        Duration::from_secs(self.snapshot_timeout_secs)
    }

    /// Performs semantic validation on required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_field(
            &self.bucket_name,
            &FieldMetadata::new(
                "backup bucket",
                "TANDEM_BACKUP_BUCKET_NAME",
                "bucket_name",
                "backup",
            ),
        )?;
        require_field(
            &self.endpoint,
            &FieldMetadata::new(
                "object storage endpoint",
                "TANDEM_BACKUP_ENDPOINT",
                "endpoint",
                "backup",
            ),
        )?;
        require_field(
            &self.access_key,
            &FieldMetadata::new(
                "object storage access key",
                "TANDEM_BACKUP_ACCESS_KEY",
                "access_key",
                "backup",
            ),
        )?;
        require_field(
            &self.secret_key,
            &FieldMetadata::new(
                "object storage secret key",
                "TANDEM_BACKUP_SECRET_KEY",
                "secret_key",
                "backup",
            ),
        )?;
        require_field(
            &self.region,
            &FieldMetadata::new("signing region", "TANDEM_BACKUP_REGION", "region", "backup"),
        )?;
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a field holds an unsupported value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
