//! S3-compatible object store backed by `aws-sdk-s3` path-style uploads.

use std::time::Duration;

use aws_sdk_s3::Client;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region, RequestChecksumCalculation};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::put_object::PutObjectError;
use aws_sdk_s3::primitives::ByteStream;
use camino::Utf8Path;
use reqwest::Url;
use tracing::debug;

use super::{ObjectStore, StorageError, StorageFuture};
use crate::config::BackupConfig;

/// Uploads backups to a bucket on an S3-compatible endpoint.
#[derive(Clone, Debug)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Constructs a store from backup configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Config`] when the configuration fails
    /// validation or the endpoint is not a URL with a host.
    pub fn new(config: &BackupConfig) -> Result<Self, StorageError> {
        config
            .validate()
            .map_err(|err| StorageError::Config(err.to_string()))?;
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|err| StorageError::Config(format!("endpoint {}: {err}", config.endpoint)))?;
        if endpoint.host_str().is_none() {
            return Err(StorageError::Config(format!(
                "endpoint {} has no host",
                config.endpoint
            )));
        }

        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "tandem-backup",
        );
        let timeouts = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(config.upload_timeout_secs))
            .build();
        let sdk_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(config.endpoint.trim_end_matches('/'))
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .timeout_config(timeouts)
            .build();

        Ok(Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name.clone(),
        })
    }

    async fn put_object(&self, local_path: &Utf8Path, remote_path: &str) -> Result<(), StorageError> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|err| StorageError::Read {
                path: local_path.to_string(),
                message: err.to_string(),
            })?;
        let key = remote_path.trim_start_matches('/');

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|err| storage_error(&err))?;
        debug!(bucket = %self.bucket, key, "object stored");
        Ok(())
    }
}

/// Maps SDK failures to [`StorageError`]. Any failure that carries an HTTP
/// response becomes [`StorageError::Status`].
fn storage_error(err: &SdkError<PutObjectError, HttpResponse>) -> StorageError {
    match err.raw_response() {
        Some(raw) => StorageError::Status {
            status: raw.status().as_u16(),
            body: raw
                .body()
                .bytes()
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .unwrap_or_default(),
        },
        None => StorageError::transport(DisplayErrorContext(err).to_string()),
    }
}

impl ObjectStore for S3Store {
    fn upload<'a>(
        &'a self,
        local_path: &'a Utf8Path,
        remote_path: &'a str,
    ) -> StorageFuture<'a, ()> {
        Box::pin(self.put_object(local_path, remote_path))
    }
}
