//! Worker-mode HTTP surface (§4.10, §6): cache reads, the coordinator's
//! assignment push, succession broadcasts, and the post-resumption
//! notification. Coordinator-mode routes are mounted separately by `node`
//! when this process is promoted.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bedrock_core::http_client::ShardHttpClient;
use bedrock_core::model::Role;
use bedrock_core::wire::{AssignmentPush, HealthResponse, HealthStatus, ResumedNotification, SuccessionBroadcast};
use tracing::{info, warn};

use crate::node::WorkerContext;
use crate::succession_watch::NodeEvent;

pub fn router(ctx: WorkerContext) -> Router {
    Router::new()
        .route("/cache/guild/:id", get(get_guild))
        .route("/cache/channel/:id", get(get_channel))
        .route("/cache/member/:guild_id/:user_id", get(get_member))
        .route("/coordinator/assignment", post(assignment))
        .route("/cluster/succession", post(succession))
        .route("/coordinator/resumed", post(resumed))
        .route("/health", get(health))
        .with_state(ctx)
}

struct CacheMiss;

impl IntoResponse for CacheMiss {
    fn into_response(self) -> Response {
        axum::http::StatusCode::NOT_FOUND.into_response()
    }
}

async fn get_guild(State(ctx): State<WorkerContext>, Path(id): Path<String>) -> Response {
    match ctx.cache.get_guild(&id).await {
        Some(guild) => Json(guild).into_response(),
        None => CacheMiss.into_response(),
    }
}

async fn get_channel(State(ctx): State<WorkerContext>, Path(id): Path<String>) -> Response {
    match ctx.cache.get_channel(&id).await {
        Some(channel) => Json(channel).into_response(),
        None => CacheMiss.into_response(),
    }
}

async fn get_member(State(ctx): State<WorkerContext>, Path((guild_id, user_id)): Path<(String, String)>) -> Response {
    match ctx.cache.get_member(&guild_id, &user_id).await {
        Some(member) => Json(member).into_response(),
        None => CacheMiss.into_response(),
    }
}

#[tracing::instrument(skip(ctx))]
async fn assignment(State(ctx): State<WorkerContext>, Json(push): Json<AssignmentPush>) -> axum::http::StatusCode {
    let local_epoch = *ctx.known_epoch.read().await;
    if push.epoch < local_epoch {
        warn!(push_epoch = push.epoch, local_epoch, "rejecting stale assignment push");
        return axum::http::StatusCode::CONFLICT;
    }

    info!(epoch = push.epoch, shards = push.assigned_shards.len(), "received assignment push");
    *ctx.known_epoch.write().await = push.epoch;
    ctx.shard_manager.write().await.apply_assignment(push.assigned_shards, push.total_shards).await;
    axum::http::StatusCode::OK
}

#[tracing::instrument(skip(ctx))]
async fn succession(State(ctx): State<WorkerContext>, Json(broadcast): Json<SuccessionBroadcast>) -> axum::http::StatusCode {
    info!(
        new_coordinator_id = %broadcast.new_coordinator_id,
        new_coordinator_url = %broadcast.new_coordinator_url,
        epoch = broadcast.epoch,
        "received succession broadcast, repointing at new coordinator"
    );
    ctx.coordinator.set_url(broadcast.new_coordinator_url).await;
    axum::http::StatusCode::OK
}

/// §4.9 step 4: verifies the claimed resumed coordinator via `/health`
/// before accepting the notice, so a peer cannot redirect this worker by
/// merely claiming resumption. Step 5: if this process was itself the
/// temporary coordinator, it demotes back to a plain worker.
#[tracing::instrument(skip(ctx))]
async fn resumed(State(ctx): State<WorkerContext>, Json(notice): Json<ResumedNotification>) -> axum::http::StatusCode {
    let http = ShardHttpClient::default();
    let health_url = format!("{}/health", notice.resumed_coordinator_url);

    let verified = match http.get::<HealthResponse>(&health_url).await {
        Ok(health) if health.role == Role::Coordinator => true,
        Ok(health) => {
            warn!(%health_url, role = ?health.role, "rejecting resumption notice: claimed coordinator is not in Coordinator role");
            false
        }
        Err(err) => {
            warn!(%health_url, error = %err, "rejecting resumption notice: could not verify claimed coordinator");
            false
        }
    };

    if !verified {
        return axum::http::StatusCode::BAD_REQUEST;
    }

    info!(
        resumed_coordinator_id = %notice.resumed_coordinator_id,
        previous_coordinator_id = %notice.previous_coordinator_id,
        message = %notice.message,
        "original coordinator resumed authority"
    );

    if let Some(rank) = notice
        .succession_order
        .iter()
        .find(|e| e.process_id == ctx.process_id)
        .map(|e| e.rank)
    {
        ctx.coordinator.set_rank(rank).await;
    }
    ctx.coordinator.set_url(notice.resumed_coordinator_url.clone()).await;

    if *ctx.role.read().await == Role::TemporaryCoordinator {
        let _ = ctx
            .events
            .send(NodeEvent::Demote {
                resumed_url: notice.resumed_coordinator_url,
            })
            .await;
    }

    axum::http::StatusCode::OK
}

async fn health(State(ctx): State<WorkerContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        role: *ctx.role.read().await,
        epoch: *ctx.known_epoch.read().await,
    })
}
