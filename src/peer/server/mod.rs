//! Peer-facing endpoints served by the slave node.
//!
//! Every failure maps to `500 Internal Server Error` carrying the error text,
//! including malformed request bodies; masters only distinguish `200` from
//! everything else.

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, put};
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Basic;
use tracing::{error, info};

use super::{PROVISION_PATH, SERVICE_INSTANCES_PATH};
use crate::instance::Instance;
use crate::repository::LocalInstanceRepository;

/// HTTP Basic credentials the peer must present.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BasicCredentials {
    /// Expected user name.
    pub username: String,
    /// Expected password.
    pub password: String,
}

#[derive(Clone)]
struct PeerState {
    repository: Arc<dyn LocalInstanceRepository>,
    credentials: Arc<BasicCredentials>,
}

/// Builds the router for the peer provisioning endpoints.
pub fn router(
    repository: Arc<dyn LocalInstanceRepository>,
    credentials: BasicCredentials,
) -> Router {
    let state = PeerState {
        repository,
        credentials: Arc::new(credentials),
    };

    Router::new()
        .route(PROVISION_PATH, put(provision).fallback(method_not_allowed))
        .route(
            &format!("{SERVICE_INSTANCES_PATH}/{{instance_id}}"),
            delete(deprovision),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_credentials))
        .with_state(state)
}

async fn require_credentials(
    State(state): State<PeerState>,
    auth: Option<TypedHeader<Authorization<Basic>>>,
    request: Request,
    next: Next,
) -> Response {
    let authorised = auth.is_some_and(|TypedHeader(Authorization(basic))| {
        basic.username() == state.credentials.username
            && basic.password() == state.credentials.password
    });
    if !authorised {
        return (StatusCode::UNAUTHORIZED, "Not Authorized").into_response();
    }
    next.run(request).await
}

async fn provision(State(state): State<PeerState>, body: Bytes) -> Response {
    let instance: Instance = match serde_json::from_slice(&body) {
        Ok(instance) => instance,
        Err(err) => return server_error(format!("Error parsing request body:{err}")),
    };

    match state.repository.instance_exists(&instance.id).await {
        Ok(false) => {}
        Ok(true) => return server_error(String::from("Instance already exists")),
        Err(err) => {
            return server_error(format!(
                "Error checking if instance already exists:{err}"
            ));
        }
    }

    if let Err(err) = state.repository.create_mirror(&instance).await {
        return server_error(format!("Error setting up slave instance: {err}"));
    }

    info!(instance_id = %instance.id, port = instance.port, "mirror instance created");
    StatusCode::OK.into_response()
}

async fn deprovision(State(state): State<PeerState>, Path(instance_id): Path<String>) -> Response {
    match state.repository.destroy(&instance_id).await {
        Ok(()) => {
            info!(%instance_id, "mirror instance destroyed");
            (StatusCode::OK, "{}").into_response()
        }
        Err(err) => server_error(err.to_string()),
    }
}

async fn method_not_allowed() -> Response {
    (StatusCode::METHOD_NOT_ALLOWED, "only PUT method accepted").into_response()
}

fn server_error(message: String) -> Response {
    error!(%message, "peer request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
}
