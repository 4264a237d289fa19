use super::protocol::{
    ENDPOINT_STATE, ENDPOINT_SUBMIT, ENDPOINT_TOPOLOGY, SubmitRecordRequest, SubmitRecordResponse,
    TopologyResponse,
};
use super::router::ContentRouter;
use crate::error::RouteError;
use crate::state::StateSnapshot;

use axum::{
    Extension, Json, Router,
    extract::rejection::JsonRejection,
    http::StatusCode,
    routing::{get, post},
};
use std::sync::Arc;

/// Response `detail` for bodies that are not a valid `SubmitRecordRequest`.
pub const MALFORMED_REQUEST: &str = "malformed request";

/// The node's HTTP surface: record intake plus the inspection endpoints.
pub fn routes(router: Arc<ContentRouter>) -> Router {
    Router::new()
        .route(ENDPOINT_SUBMIT, post(handle_submit))
        .route(ENDPOINT_STATE, get(handle_state))
        .route(ENDPOINT_TOPOLOGY, get(handle_topology))
        .layer(Extension(router))
}

pub async fn handle_submit(
    Extension(router): Extension<Arc<ContentRouter>>,
    body: Result<Json<SubmitRecordRequest>, JsonRejection>,
) -> (StatusCode, Json<SubmitRecordResponse>) {
    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => {
            tracing::warn!("Rejected submit body: {}", rejection.body_text());
            return (
                rejection.status(),
                Json(SubmitRecordResponse::failure(MALFORMED_REQUEST)),
            );
        }
    };
    let id = req.id;

    match router.submit(req).await {
        Ok(outcome) => {
            tracing::debug!("Record {} {}", id, outcome.disposition());
            (StatusCode::OK, Json(SubmitRecordResponse::success()))
        }
        Err(e) => {
            tracing::error!("Record {} {}: {}", id, e.disposition(), e);
            (status_for(&e), Json(SubmitRecordResponse::failure(e.reason())))
        }
    }
}

pub async fn handle_state(
    Extension(router): Extension<Arc<ContentRouter>>,
) -> Result<Json<StateSnapshot>, (StatusCode, String)> {
    router.snapshot().map(Json).map_err(|e| {
        tracing::error!("Failed to snapshot state: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })
}

pub async fn handle_topology(
    Extension(router): Extension<Arc<ContentRouter>>,
) -> Json<TopologyResponse> {
    Json(router.topology_view())
}

fn status_for(error: &RouteError) -> StatusCode {
    match error {
        RouteError::Unroutable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        RouteError::Forwarding(_) => StatusCode::BAD_GATEWAY,
        RouteError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        RouteError::Storage(_) | RouteError::Table(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
