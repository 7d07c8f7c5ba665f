//! The unified node entrypoint (§9 "dynamic dispatch on role"). Every
//! instance runs this same binary; `ROLE` decides whether it starts life
//! serving the coordinator's control plane or a worker's shard and cache
//! routes, and a worker can become a temporary coordinator at runtime
//! without restarting the process.

use std::collections::BTreeSet;
use std::sync::Arc;

use bedrock_core::http_client::ShardHttpClient;
use bedrock_core::local_cache::LocalCache;
use bedrock_core::model::{ProcessId, Role};
use bedrock_core::wire::{
    CoordinatorHandoffData, DeregisterRequest, HeartbeatRequest, PeerSummary, RegisterRequest,
    ResumedNotification, SuccessionBroadcast,
};
use crust::{CoordinatorConfig, CoordinatorHandle, HeartbeatMonitor, ResumptionHandler};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::WorkerConfig;
use crate::shard_manager::ShardManager;
use crate::succession_watch::{broadcast_succession, CoordinatorPointer, NodeEvent, SuccessionWatchdog};

/// Marks a startup failure as specifically "could not reach the
/// coordinator at join" (§6 exit code 2), distinct from other startup
/// failures (missing env vars, bind failure) which exit 1.
#[derive(Debug)]
pub struct CoordinatorContactFailure(pub anyhow::Error);

impl std::fmt::Display for CoordinatorContactFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to contact coordinator at join: {}", self.0)
    }
}

impl std::error::Error for CoordinatorContactFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

#[derive(Clone)]
pub struct WorkerContext {
    pub process_id: ProcessId,
    pub shard_manager: Arc<RwLock<ShardManager>>,
    pub cache: Arc<LocalCache>,
    pub coordinator: CoordinatorPointer,
    pub role: Arc<RwLock<Role>>,
    /// Epoch of the last accepted `/coordinator/assignment` push. Out-of-order
    /// pushes carrying a lower epoch are rejected with 409 (§5, §6).
    pub known_epoch: Arc<RwLock<u64>>,
    /// Lets HTTP handlers (e.g. `/coordinator/resumed`) hand control back to
    /// the node's main loop instead of mutating server/task state inline.
    pub events: mpsc::Sender<NodeEvent>,
    /// Heartbeat-monitor task running while this process acts as
    /// (temporary) coordinator, so demotion can stop it.
    pub coordinator_monitor: Arc<RwLock<Option<JoinHandle<()>>>>,
}

/// Entrypoint used by `main`: reads `ROLE` (`coordinator` or `worker`,
/// default `worker`) and runs the matching startup sequence.
pub async fn run() -> anyhow::Result<()> {
    let role = std::env::var("ROLE").unwrap_or_else(|_| "worker".to_string());
    match role.as_str() {
        "coordinator" => run_as_coordinator().await,
        _ => run_as_worker().await,
    }
}

async fn run_as_coordinator() -> anyhow::Result<()> {
    let config = CoordinatorConfig::from_env()?;
    let total_shards = config.resolve_total_shards().await?;

    let resumption = ResumptionHandler::new();
    let handoff = resumption
        .try_resume(&config.process_id, &config.public_url, &config.resume_candidate_urls)
        .await;

    let handle = crust::spawn(config.process_id.clone(), config.public_url.clone(), total_shards, Role::Coordinator);

    if let Some((temp_coordinator_url, handoff_data)) = handoff {
        info!(%temp_coordinator_url, epoch = handoff_data.epoch, "resuming authority from temporary coordinator");
        notify_peers_of_resumption(&handle, &handoff_data).await;
        handle.install_handoff(handoff_data).await;
    }

    serve_coordinator(handle, config.bind_addr.clone(), config.heartbeat_interval, config.dead_peer_grace()).await
}

async fn notify_peers_of_resumption(handle: &CoordinatorHandle, handoff: &CoordinatorHandoffData) {
    let http = ShardHttpClient::default();
    let notification = ResumedNotification {
        resumed_coordinator_id: handle.process_id.clone(),
        resumed_coordinator_url: handle.url.clone(),
        previous_coordinator_id: handoff.temporary_coordinator_id.clone(),
        succession_order: handoff.succession_order.clone(),
        timestamp: chrono::Utc::now(),
        message: "original coordinator has resumed authority".to_string(),
    };

    for peer in &handoff.peer_nodes {
        let url = format!("{}/coordinator/resumed", peer.url);
        if let Err(err) = http.post_ack(&url, &notification).await {
            warn!(%url, error = %err, "failed to notify peer of coordinator resumption");
        }
    }
}

async fn serve_coordinator(
    handle: CoordinatorHandle,
    bind_addr: String,
    heartbeat_interval: std::time::Duration,
    dead_peer_grace: std::time::Duration,
) -> anyhow::Result<()> {
    let monitor = HeartbeatMonitor::new(handle.clone(), heartbeat_interval, dead_peer_grace);
    tokio::spawn(monitor.run());

    let router = crust::server::router(handle);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(%bind_addr, "coordinator listening");
    axum::serve(listener, router).await?;
    Ok(())
}

async fn run_as_worker() -> anyhow::Result<()> {
    let config = WorkerConfig::from_env()?;
    let http = ShardHttpClient::default();

    let register_resp = http
        .post::<_, bedrock_core::wire::RegisterResponse>(
            &format!("{}/worker/register", config.coordinator_url),
            &RegisterRequest {
                process_id: config.process_id.clone(),
                url: config.public_url.clone(),
            },
        )
        .await
        .map_err(|e| anyhow::Error::new(CoordinatorContactFailure(e.into())))?;

    info!(
        assigned = register_resp.assigned_shards.len(),
        total = register_resp.total_shards,
        rank = register_resp.succession_rank,
        "registered with coordinator"
    );

    let cache = Arc::new(LocalCache::new());
    let shard_manager = Arc::new(RwLock::new(ShardManager::new(
        config.process_id.clone(),
        config.discord_token.clone(),
        register_resp.total_shards,
        config.max_concurrency,
        cache.clone(),
    )));
    shard_manager
        .write()
        .await
        .apply_assignment(register_resp.assigned_shards, register_resp.total_shards)
        .await;

    let coordinator = CoordinatorPointer::new(config.coordinator_url.clone(), register_resp.succession_rank);
    let peers = Arc::new(RwLock::new(peers_excluding_self(&register_resp.peers, &config.process_id)));
    let role = Arc::new(RwLock::new(Role::Worker));
    let known_epoch = Arc::new(RwLock::new(register_resp.epoch));

    let (events_tx, mut events_rx) = mpsc::channel(8);

    let ctx = WorkerContext {
        process_id: config.process_id.clone(),
        shard_manager: shard_manager.clone(),
        cache,
        coordinator: coordinator.clone(),
        role: role.clone(),
        known_epoch: known_epoch.clone(),
        events: events_tx.clone(),
        coordinator_monitor: Arc::new(RwLock::new(None)),
    };

    tokio::spawn(heartbeat_loop(config.clone(), coordinator.clone(), shard_manager.clone(), known_epoch.clone()));

    let watchdog = SuccessionWatchdog::new(coordinator.clone(), peers.clone());
    tokio::spawn(watchdog.run(events_tx));

    let mut server = spawn_worker_server(ctx.clone(), config.bind_addr.clone()).await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received shutdown signal");
                graceful_shutdown(&config, &coordinator, &shard_manager, &mut server).await;
                return Ok(());
            }
            event = events_rx.recv() => {
                match event {
                    Some(NodeEvent::PromoteSelf) => {
                        server.abort();
                        server = promote_to_temporary_coordinator(&config, &ctx, &peers).await?;
                    }
                    Some(NodeEvent::Demote { resumed_url }) => {
                        info!(%resumed_url, "demoting to worker, original coordinator has resumed authority");
                        server.abort();
                        if let Some(monitor) = ctx.coordinator_monitor.write().await.take() {
                            monitor.abort();
                        }
                        *ctx.role.write().await = Role::Worker;
                        coordinator.set_url(resumed_url).await;
                        server = spawn_worker_server(ctx.clone(), config.bind_addr.clone()).await?;
                    }
                    None => {
                        warn!("succession watchdog channel closed");
                    }
                }
            }
        }
    }
}

fn peers_excluding_self(peers: &[PeerSummary], self_id: &str) -> Vec<PeerSummary> {
    peers.iter().filter(|p| p.process_id != self_id).cloned().collect()
}

/// §5: on SIGTERM, deregister from the coordinator and close gateway
/// sessions within `shutdown_deadline`; a breach aborts the process instead
/// of lingering on a hung HTTP call or shard teardown.
async fn graceful_shutdown(
    config: &WorkerConfig,
    coordinator: &CoordinatorPointer,
    shard_manager: &Arc<RwLock<ShardManager>>,
    server: &mut JoinHandle<()>,
) {
    server.abort();

    let work = async {
        let http = ShardHttpClient::default();
        let url = coordinator.current_url().await;
        let req = DeregisterRequest {
            process_id: config.process_id.clone(),
        };
        if let Err(err) = http.post_ack(&format!("{url}/worker/deregister"), &req).await {
            warn!(%url, error = %err, "failed to deregister from coordinator during shutdown");
        }

        shard_manager.write().await.shutdown().await;
    };

    if tokio::time::timeout(config.shutdown_deadline, work).await.is_err() {
        error!(deadline_secs = config.shutdown_deadline.as_secs(), "graceful shutdown deadline exceeded, aborting");
        std::process::exit(1);
    }
}

async fn heartbeat_loop(
    config: WorkerConfig,
    coordinator: CoordinatorPointer,
    shard_manager: Arc<RwLock<ShardManager>>,
    known_epoch: Arc<RwLock<u64>>,
) {
    let http = ShardHttpClient::default();
    let mut ticker = tokio::time::interval(config.heartbeat_interval);

    loop {
        ticker.tick().await;
        let url = coordinator.current_url().await;
        let current_epoch = *known_epoch.read().await;
        let req = HeartbeatRequest {
            process_id: config.process_id.clone(),
            epoch: current_epoch,
            shard_lag: None,
        };

        match http
            .post::<_, bedrock_core::wire::HeartbeatResponse>(&format!("{url}/worker/heartbeat"), &req)
            .await
        {
            Ok(resp) => {
                if resp.epoch != current_epoch {
                    *known_epoch.write().await = resp.epoch;
                    let current: BTreeSet<_> = shard_manager.read().await.active_shards();
                    if current != resp.assigned_shards {
                        let total_shards = shard_manager.read().await.total_shards();
                        shard_manager
                            .write()
                            .await
                            .apply_assignment(resp.assigned_shards, total_shards)
                            .await;
                    }
                }
            }
            Err(err) => error!(%url, error = %err, "heartbeat to coordinator failed"),
        }
    }
}

async fn spawn_worker_server(ctx: WorkerContext, bind_addr: String) -> anyhow::Result<JoinHandle<()>> {
    let router = crate::server::router(ctx);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(%bind_addr, "worker listening");
    Ok(tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router).await {
            error!(error = %err, "worker HTTP server exited");
        }
    }))
}

/// Promotes this process from `Worker` to `TemporaryCoordinator`: spins up
/// the coordinator actor seeded from the last cluster state this worker
/// saw, broadcasts the change to every known peer, and re-serves with both
/// worker and coordinator routes mounted.
async fn promote_to_temporary_coordinator(
    config: &WorkerConfig,
    ctx: &WorkerContext,
    peers: &Arc<RwLock<Vec<PeerSummary>>>,
) -> anyhow::Result<JoinHandle<()>> {
    *ctx.role.write().await = Role::TemporaryCoordinator;
    info!(process_id = %config.process_id, "promoting self to temporary coordinator");

    let total_shards = ctx.shard_manager.read().await.total_shards();
    let handle = crust::spawn(config.process_id.clone(), config.public_url.clone(), total_shards, Role::TemporaryCoordinator);

    // §5: "a successor always starts at previous_epoch + 1" — and S6's split-vote
    // resolution depends on every promoting worker advertising its real last-known
    // epoch rather than a constant, or epoch comparison can never pick a winner.
    let next_epoch = *ctx.known_epoch.read().await + 1;

    let known_peers = peers.read().await.clone();
    let handoff_seed = CoordinatorHandoffData {
        total_shards,
        peer_nodes: known_peers.clone(),
        succession_order: Vec::new(),
        epoch: next_epoch,
        temporary_coordinator_id: config.process_id.clone(),
    };
    handle.install_handoff(handoff_seed).await;

    let http = ShardHttpClient::default();
    let broadcast = SuccessionBroadcast {
        new_coordinator_id: config.process_id.clone(),
        new_coordinator_url: config.public_url.clone(),
        epoch: next_epoch,
    };
    broadcast_succession(&http, &known_peers, &broadcast).await;

    let monitor = HeartbeatMonitor::new(handle.clone(), config.heartbeat_interval, bedrock_core::model::DEFAULT_DEAD_PEER_GRACE);
    *ctx.coordinator_monitor.write().await = Some(tokio::spawn(monitor.run()));

    let worker_router = crate::server::router(ctx.clone());
    let coordinator_router = crust::server::router(handle);
    let router = worker_router.merge(coordinator_router);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(bind_addr = %config.bind_addr, "temporary coordinator listening");
    Ok(tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router).await {
            error!(error = %err, "temporary coordinator HTTP server exited");
        }
    }))
}
