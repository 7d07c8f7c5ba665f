//! The coordinator's authoritative state, confined to a single serialized
//! event loop (§5, §9 "global mutable state"): registration, rebalance, and
//! failover decisions are all linearized through one actor task rather than
//! shared mutable globals.

use bedrock_core::assign::ShardAssigner;
use bedrock_core::error::{CoordError, Result};
use bedrock_core::http_client::ShardHttpClient;
use bedrock_core::model::{
    ClusterAssignment, Epoch, PeerNode, PeerState, ProcessId, Role, SuccessionOrder,
};
use bedrock_core::registry::PeerRegistry;
use bedrock_core::succession::SuccessionEngine;
use bedrock_core::wire::{
    AssignmentPush, ClusterStateResponse, CoordinatorHandoffData, HealthResponse, HealthStatus,
    HeartbeatResponse, PeerSummary, RegisterResponse,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

enum Command {
    Register {
        process_id: ProcessId,
        url: String,
        reply: oneshot::Sender<RegisterResponse>,
    },
    Heartbeat {
        process_id: ProcessId,
        epoch: Epoch,
        reply: oneshot::Sender<std::result::Result<HeartbeatResponse, CoordError>>,
    },
    Deregister {
        process_id: ProcessId,
        reply: oneshot::Sender<()>,
    },
    PeerLost {
        process_id: ProcessId,
    },
    PushFailed {
        process_id: ProcessId,
    },
    Snapshot {
        reply: oneshot::Sender<ClusterStateResponse>,
    },
    Health {
        reply: oneshot::Sender<HealthResponse>,
    },
    InstallHandoff {
        handoff: CoordinatorHandoffData,
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable front for the coordinator actor; every axum handler and
/// background task talks to coordinator state exclusively through this
/// handle.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Command>,
    pub registry: PeerRegistry,
    pub process_id: ProcessId,
    pub url: String,
}

impl CoordinatorHandle {
    pub async fn register(&self, process_id: ProcessId, url: String) -> RegisterResponse {
        let (reply, rx) = oneshot::channel();
        let _ = self
            .tx
            .send(Command::Register {
                process_id,
                url,
                reply,
            })
            .await;
        rx.await.expect("coordinator actor dropped")
    }

    pub async fn heartbeat(&self, process_id: ProcessId, epoch: Epoch) -> Result<HeartbeatResponse> {
        let (reply, rx) = oneshot::channel();
        let _ = self
            .tx
            .send(Command::Heartbeat {
                process_id,
                epoch,
                reply,
            })
            .await;
        rx.await.expect("coordinator actor dropped")
    }

    pub async fn deregister(&self, process_id: ProcessId) {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(Command::Deregister { process_id, reply }).await;
        let _ = rx.await;
    }

    pub async fn peer_lost(&self, process_id: ProcessId) {
        let _ = self.tx.send(Command::PeerLost { process_id }).await;
    }

    pub async fn snapshot(&self) -> ClusterStateResponse {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(Command::Snapshot { reply }).await;
        rx.await.expect("coordinator actor dropped")
    }

    pub async fn health(&self) -> HealthResponse {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(Command::Health { reply }).await;
        rx.await.expect("coordinator actor dropped")
    }

    pub async fn install_handoff(&self, handoff: CoordinatorHandoffData) {
        let (reply, rx) = oneshot::channel();
        let _ = self
            .tx
            .send(Command::InstallHandoff { handoff, reply })
            .await;
        let _ = rx.await;
    }
}

struct State {
    #[allow(dead_code)]
    process_id: ProcessId,
    role: Role,
    total_shards: u32,
    epoch: Epoch,
    assignment: ClusterAssignment,
    succession_order: SuccessionOrder,
    registry: PeerRegistry,
    http: ShardHttpClient,
    handle_tx: mpsc::Sender<Command>,
}

impl State {
    fn bump_epoch(&mut self) -> Epoch {
        self.epoch += 1;
        self.epoch
    }

    async fn rebalance_and_push(&mut self) {
        let workers = self.registry.workers().await;
        let new_assignment = ShardAssigner::assign(&workers, self.total_shards);

        if !ShardAssigner::differs(&self.assignment, &new_assignment) {
            return;
        }

        // Invariant 1 (§8): every accepted assignment is a partition of
        // [0, total_shards). `ShardAssigner` is built to guarantee this, so
        // a violation here means the algorithm itself is broken, not a
        // transient peer fault — that is exactly what `Fatal` covers (§7).
        if !new_assignment.is_partition() {
            error!(total_shards = self.total_shards, "computed assignment is not a partition of [0, total_shards), terminating");
            std::process::exit(3);
        }

        let epoch = self.bump_epoch();
        self.assignment = new_assignment.clone();
        self.succession_order = SuccessionEngine::compute_order(&workers);

        for worker in &workers {
            let shards = self.assignment.shards_for(&worker.process_id);
            self.registry
                .set_assignment(&worker.process_id, shards.clone())
                .await;

            let http = self.http.clone();
            let url = format!("{}/coordinator/assignment", worker.url);
            let push = AssignmentPush {
                assigned_shards: shards,
                total_shards: self.total_shards,
                epoch,
            };
            let process_id = worker.process_id.clone();
            let handle_tx = self.handle_tx.clone();
            let registry = self.registry.clone();

            tokio::spawn(async move {
                if let Err(err) = http.post_ack(&url, &push).await {
                    error!(process_id = %process_id, %url, error = %err, "failed to push assignment, marking peer suspect");
                    registry.mark_state(&process_id, PeerState::Suspect).await;
                    let _ = handle_tx.send(Command::PushFailed { process_id }).await;
                }
            });
        }
    }

    async fn park_shards_of(&mut self, process_id: &str) {
        if let Some(shards) = self.assignment.map.remove(process_id) {
            self.assignment.pending.extend(shards);
            self.bump_epoch();
        }
    }

    async fn peer_summaries(&self) -> Vec<PeerSummary> {
        self.registry.snapshot().await.iter().map(PeerSummary::from).collect()
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Register { process_id, url, reply } => {
                let existing = self.registry.get(&process_id).await;
                let is_new = existing.is_none();
                let mut peer = existing
                    .unwrap_or_else(|| PeerNode::new(process_id.clone(), url.clone(), Role::Worker));
                peer.url = url;
                peer.state = PeerState::Active;
                self.registry.upsert(peer).await;

                if is_new {
                    info!(process_id = %process_id, "worker registered");
                }

                self.rebalance_and_push().await;

                let shards = self.assignment.shards_for(&process_id);
                let rank = self.succession_order.rank_of(&process_id).unwrap_or(0);
                let peers = self.peer_summaries().await;

                let _ = reply.send(RegisterResponse {
                    total_shards: self.total_shards,
                    assigned_shards: shards,
                    epoch: self.epoch,
                    peers,
                    succession_rank: rank,
                });
            }
            Command::Heartbeat { process_id, epoch, reply } => {
                if let Some(mut peer) = self.registry.get(&process_id).await {
                    peer.state = PeerState::Active;
                    self.registry.upsert(peer).await;
                }

                if epoch < self.epoch {
                    warn!(process_id = %process_id, epoch, local_epoch = self.epoch, "stale heartbeat, pushing fresh assignment");
                }

                let _ = reply.send(Ok(HeartbeatResponse {
                    epoch: self.epoch,
                    assigned_shards: self.assignment.shards_for(&process_id),
                }));
            }
            Command::Deregister { process_id, reply } => {
                self.registry.remove(&process_id).await;
                self.park_shards_of(&process_id).await;
                self.rebalance_and_push().await;
                let _ = reply.send(());
            }
            Command::PeerLost { process_id } => {
                warn!(process_id = %process_id, "peer declared dead by heartbeat monitor");
                // The registry entry itself is left in place, marked `Dead`, until
                // the heartbeat monitor evicts it after the grace period; only its
                // shards move immediately.
                self.park_shards_of(&process_id).await;
                self.rebalance_and_push().await;
            }
            Command::PushFailed { process_id } => {
                self.park_shards_of(&process_id).await;
            }
            Command::Snapshot { reply } => {
                let peers = self.peer_summaries().await;
                let _ = reply.send(ClusterStateResponse {
                    assignment: self.assignment.clone(),
                    succession_order: self.succession_order.0.clone(),
                    peers,
                    epoch: self.epoch,
                });
            }
            Command::Health { reply } => {
                let degraded = !self.assignment.pending.is_empty()
                    || self
                        .registry
                        .snapshot()
                        .await
                        .iter()
                        .any(|p| p.state == PeerState::Suspect);
                let _ = reply.send(HealthResponse {
                    status: if degraded {
                        HealthStatus::Degraded
                    } else {
                        HealthStatus::Healthy
                    },
                    role: self.role,
                    epoch: self.epoch,
                });
            }
            Command::InstallHandoff { handoff, reply } => {
                info!(epoch = handoff.epoch, peers = handoff.peer_nodes.len(), "installing coordinator handoff");
                self.total_shards = handoff.total_shards;
                self.epoch = handoff.epoch;
                self.succession_order = SuccessionOrder(handoff.succession_order);

                // The handoff is the only record of cluster membership a freshly
                // started (or freshly promoted) coordinator has; seed the registry
                // from it before recomputing the assignment.
                for summary in &handoff.peer_nodes {
                    let mut peer = self.registry.get(&summary.process_id).await.unwrap_or_else(|| {
                        PeerNode::new(summary.process_id.clone(), summary.url.clone(), Role::Worker)
                    });
                    peer.url = summary.url.clone();
                    peer.assigned_shards = summary.assigned_shards.clone();
                    peer.state = PeerState::Active;
                    self.registry.upsert(peer).await;
                }

                let workers = self.registry.workers().await;
                self.assignment = ShardAssigner::assign(&workers, self.total_shards);
                // The incoming `succession_order` is whatever the handoff source had
                // (empty on self-promotion, see node.rs); recompute from the freshly
                // seeded registry so `/worker/register` and `/cluster/state` don't
                // hand out `succession_rank = 0` to every worker (§4.8 split-brain).
                self.succession_order = SuccessionEngine::compute_order(&workers);
                let _ = reply.send(());
            }
        }
    }
}

/// Spawns the actor loop and returns the handle every handler clones.
pub fn spawn(
    process_id: ProcessId,
    self_url: String,
    total_shards: u32,
    role: Role,
) -> CoordinatorHandle {
    let (tx, mut rx) = mpsc::channel::<Command>(1024);
    let registry = PeerRegistry::new();
    let http = ShardHttpClient::default();

    let handle = CoordinatorHandle {
        tx: tx.clone(),
        registry: registry.clone(),
        process_id: process_id.clone(),
        url: self_url,
    };

    let mut state = State {
        process_id,
        role,
        total_shards,
        epoch: 0,
        assignment: ClusterAssignment::empty(total_shards),
        succession_order: SuccessionOrder::default(),
        registry,
        http,
        handle_tx: tx,
    };

    tokio::spawn(async move {
        while let Some(cmd) = rx.recv().await {
            state.handle(cmd).await;
        }
    });

    handle
}
