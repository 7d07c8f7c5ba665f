//! Worker-side coordinator watchdog (§4.8, §4.9). Each worker probes the
//! coordinator it last registered with; on three consecutive misses it
//! waits `SuccessionEngine::promotion_delay(rank)` before declaring itself
//! the temporary coordinator, giving lower-ranked peers first refusal.
//! Before acting it re-checks once, both for the original coordinator
//! having recovered and for a lower-ranked peer having already promoted.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bedrock_core::http_client::ShardHttpClient;
use bedrock_core::model::Role;
use bedrock_core::succession::SuccessionEngine;
use bedrock_core::wire::{HealthResponse, PeerSummary, SuccessionBroadcast};
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};

const PROBE_INTERVAL: Duration = Duration::from_secs(15);
const MISSES_BEFORE_PROMOTION_CONSIDERED: u32 = 3;

pub enum NodeEvent {
    /// The coordinator went unreachable long enough and no peer preempted
    /// us; node.rs should self-promote.
    PromoteSelf,
    /// The original coordinator resumed authority and this process (which
    /// was acting as temporary coordinator) verified it via `/health`;
    /// node.rs should tear down the coordinator routes and go back to
    /// being a plain worker pointed at `resumed_url` (§4.9 step 5).
    Demote { resumed_url: String },
}

/// Shared, mutable view of where the worker currently believes the
/// coordinator lives and where it ranks in the succession order. Updated
/// both by registration responses and by `/cluster/succession` broadcasts.
#[derive(Clone)]
pub struct CoordinatorPointer {
    pub url: Arc<RwLock<String>>,
    pub rank: Arc<RwLock<u32>>,
}

impl CoordinatorPointer {
    pub fn new(url: String, rank: u32) -> Self {
        Self {
            url: Arc::new(RwLock::new(url)),
            rank: Arc::new(RwLock::new(rank)),
        }
    }

    pub async fn set_url(&self, url: String) {
        *self.url.write().await = url;
    }

    pub async fn set_rank(&self, rank: u32) {
        *self.rank.write().await = rank;
    }

    pub async fn current_url(&self) -> String {
        self.url.read().await.clone()
    }
}

pub struct SuccessionWatchdog {
    pointer: CoordinatorPointer,
    http: ShardHttpClient,
    peers: Arc<RwLock<Vec<PeerSummary>>>,
    misses: AtomicU32,
}

impl SuccessionWatchdog {
    pub fn new(pointer: CoordinatorPointer, peers: Arc<RwLock<Vec<PeerSummary>>>) -> Self {
        Self {
            pointer,
            http: ShardHttpClient::default(),
            peers,
            misses: AtomicU32::new(0),
        }
    }

    pub async fn run(self, events: mpsc::Sender<NodeEvent>) {
        let mut ticker = tokio::time::interval(PROBE_INTERVAL);
        loop {
            ticker.tick().await;
            if self.probe_coordinator().await {
                self.misses.store(0, Ordering::SeqCst);
                continue;
            }

            let misses = self.misses.fetch_add(1, Ordering::SeqCst) + 1;
            if misses < MISSES_BEFORE_PROMOTION_CONSIDERED {
                warn!(misses, "missed coordinator health probe");
                continue;
            }

            let rank = *self.pointer.rank.read().await;
            let delay = SuccessionEngine::promotion_delay(rank);
            info!(rank, delay_secs = delay.as_secs(), "coordinator presumed dead, waiting promotion delay");
            tokio::time::sleep(delay).await;

            if self.probe_coordinator().await {
                info!("coordinator recovered during promotion delay, standing down");
                self.misses.store(0, Ordering::SeqCst);
                continue;
            }

            if let Some(preempting) = self.find_active_coordinator().await {
                info!(url = %preempting, "another peer already promoted, adopting it as coordinator");
                self.pointer.set_url(preempting).await;
                self.misses.store(0, Ordering::SeqCst);
                continue;
            }

            info!("no peer preempted promotion, self-promoting to temporary coordinator");
            let _ = events.send(NodeEvent::PromoteSelf).await;
            return;
        }
    }

    async fn probe_coordinator(&self) -> bool {
        let url = self.pointer.current_url().await;
        self.http.get::<HealthResponse>(&format!("{url}/health")).await.is_ok()
    }

    async fn find_active_coordinator(&self) -> Option<String> {
        for peer in self.peers.read().await.iter() {
            if let Ok(health) = self.http.get::<HealthResponse>(&format!("{}/health", peer.url)).await {
                if matches!(health.role, Role::Coordinator | Role::TemporaryCoordinator) {
                    return Some(peer.url.clone());
                }
            }
        }
        None
    }
}

/// Sent by the newly promoted temporary coordinator to every known peer so
/// they repoint at it instead of waiting out their own promotion delay.
pub async fn broadcast_succession(http: &ShardHttpClient, peers: &[PeerSummary], broadcast: &SuccessionBroadcast) {
    for peer in peers {
        let url = format!("{}/cluster/succession", peer.url);
        if let Err(err) = http.post_ack(&url, broadcast).await {
            warn!(%url, error = %err, "failed to notify peer of succession");
        }
    }
}
