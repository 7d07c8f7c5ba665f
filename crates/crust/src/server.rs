//! Coordinator-mode HTTP surface (§4.6, §6). Every handler is a thin
//! adapter over `CoordinatorHandle` — the actual state mutation happens
//! serially inside the actor task.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bedrock_core::error::CoordError;
use bedrock_core::wire::{
    ClusterStateResponse, CoordinatorHandoffData, DeregisterRequest, HealthResponse,
    HeartbeatRequest, HeartbeatResponse, RegisterRequest, RegisterResponse, ResumeRequest,
};
use tracing::info;

use crate::actor::CoordinatorHandle;

pub struct ApiError(CoordError);

impl From<CoordError> for ApiError {
    fn from(err: CoordError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use axum::http::StatusCode;
        let status = match &self.0 {
            CoordError::Stale { .. } => StatusCode::CONFLICT,
            CoordError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            CoordError::NoWorkerForShard { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.0.to_string()).into_response()
    }
}

pub fn router(handle: CoordinatorHandle) -> Router {
    Router::new()
        .route("/worker/register", post(register))
        .route("/worker/heartbeat", post(heartbeat))
        .route("/worker/deregister", post(deregister))
        .route("/cluster/state", get(cluster_state))
        .route("/health", get(health))
        .route("/coordinator/resume", post(resume))
        .with_state(handle)
}

#[tracing::instrument(skip(handle))]
async fn register(
    State(handle): State<CoordinatorHandle>,
    Json(req): Json<RegisterRequest>,
) -> Json<RegisterResponse> {
    info!(process_id = %req.process_id, url = %req.url, "worker register request");
    Json(handle.register(req.process_id, req.url).await)
}

#[tracing::instrument(skip(handle))]
async fn heartbeat(
    State(handle): State<CoordinatorHandle>,
    Json(req): Json<HeartbeatRequest>,
) -> Result<Json<HeartbeatResponse>, ApiError> {
    Ok(Json(handle.heartbeat(req.process_id, req.epoch).await?))
}

#[tracing::instrument(skip(handle))]
async fn deregister(
    State(handle): State<CoordinatorHandle>,
    Json(req): Json<DeregisterRequest>,
) -> axum::http::StatusCode {
    info!(process_id = %req.process_id, "worker deregister request");
    handle.deregister(req.process_id).await;
    axum::http::StatusCode::OK
}

async fn cluster_state(State(handle): State<CoordinatorHandle>) -> Json<ClusterStateResponse> {
    Json(handle.snapshot().await)
}

async fn health(State(handle): State<CoordinatorHandle>) -> Json<HealthResponse> {
    Json(handle.health().await)
}

/// Step 2 of the resumption protocol (§4.9): the original coordinator asks
/// the active temporary coordinator to hand off state. This handler runs
/// on the *temporary coordinator*, not on the resuming process.
#[tracing::instrument(skip(handle))]
async fn resume(
    State(handle): State<CoordinatorHandle>,
    Json(req): Json<ResumeRequest>,
) -> Json<CoordinatorHandoffData> {
    info!(
        original_coordinator_id = %req.original_coordinator_id,
        original_coordinator_url = %req.original_coordinator_url,
        "original coordinator requesting handoff"
    );
    let snapshot = handle.snapshot().await;
    let next_epoch = snapshot.epoch + 1;

    Json(CoordinatorHandoffData {
        total_shards: snapshot.assignment.total_shards,
        peer_nodes: snapshot.peers,
        succession_order: snapshot.succession_order,
        epoch: next_epoch,
        temporary_coordinator_id: handle.process_id.clone(),
    })
}
