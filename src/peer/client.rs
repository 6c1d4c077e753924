//! HTTP client the master uses to drive its peer.

use reqwest::{Client, Method, StatusCode, Url};
use tracing::{info, warn};

use super::{
    PROVISION_PATH, PeerConfig, PeerError, PeerFuture, PeerProvisioner, PeerTls,
    SERVICE_INSTANCES_PATH,
};
use crate::instance::Instance;

/// Authenticated client for the peer broker's provisioning endpoints.
#[derive(Clone, Debug)]
pub struct SlaveBrokerClient {
    http: Client,
    base_url: Url,
    username: String,
    password: String,
}

impl SlaveBrokerClient {
    /// Builds a client from peer settings.
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::Client`] when the base URL is unusable or the TLS
    /// backend cannot be initialised.
    pub fn new(config: PeerConfig) -> Result<Self, PeerError> {
        let skip_verification = config.tls == PeerTls::SkipVerification;
        if skip_verification {
            warn!(peer = %config.base_url, "peer TLS certificate verification is disabled");
        }
        let base_url = Url::parse(&config.base_url)
            .map_err(|err| PeerError::Client(format!("peer url {}: {err}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(PeerError::Client(format!(
                "peer url {} cannot carry a path",
                config.base_url
            )));
        }
        let http = Client::builder()
            .danger_accept_invalid_certs(skip_verification)
            .timeout(config.timeout)
            .build()
            .map_err(|err| PeerError::Client(err.to_string()))?;

        Ok(Self {
            http,
            base_url,
            username: config.username,
            password: config.password,
        })
    }

    /// Sends `PUT /provisionslave` with the instance descriptor as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::Status`] for any response other than `200 OK`
    /// and [`PeerError::Transport`] when the request fails outright.
    pub async fn create_slave_instance(&self, instance: &Instance) -> Result<(), PeerError> {
        let body = serde_json::to_vec(instance).map_err(|err| PeerError::Encode(err.to_string()))?;
        info!(instance_id = %instance.id, "provisioning instance on peer");
        self.send(Method::PUT, self.endpoint(PROVISION_PATH, None), Some(body))
            .await
    }

    /// Sends `DELETE /v2/service_instances/{instance_id}`.
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::Status`] for any response other than `200 OK`
    /// and [`PeerError::Transport`] when the request fails outright.
    pub async fn destroy_slave_instance(&self, instance_id: &str) -> Result<(), PeerError> {
        info!(%instance_id, "deprovisioning instance on peer");
        let url = self.endpoint(SERVICE_INSTANCES_PATH, Some(instance_id));
        self.send(Method::DELETE, url, None).await
    }

    /// Appends `path` and, when given, `instance_id` as one percent-encoded
    /// segment to the base URL.
    fn endpoint(&self, path: &str, instance_id: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(path.split('/').filter(|segment| !segment.is_empty()))
                .extend(instance_id);
        }
        url
    }

    async fn send(&self, method: Method, url: Url, body: Option<Vec<u8>>) -> Result<(), PeerError> {
        let mut request = self
            .http
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password));
        if let Some(payload) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(payload);
        }

        let response = request
            .send()
            .await
            .map_err(|err| PeerError::Transport(err.to_string()))?;
        let status = response.status();
        if status == StatusCode::OK {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        Err(PeerError::Status {
            status: status.as_u16(),
            body: text,
        })
    }
}

impl PeerProvisioner for SlaveBrokerClient {
    fn create_peer_instance<'a>(&'a self, instance: &'a Instance) -> PeerFuture<'a> {
        Box::pin(self.create_slave_instance(instance))
    }

    fn destroy_peer_instance<'a>(&'a self, instance: &'a Instance) -> PeerFuture<'a> {
        Box::pin(self.destroy_slave_instance(&instance.id))
    }
}
