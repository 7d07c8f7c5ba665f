//! Coordinator-side liveness probing. Runs as an independent scheduled
//! task; on three consecutive misses it declares the peer dead and
//! notifies the coordinator actor, which triggers reassignment. The dead
//! peer's registry record itself is only cleared once it has stayed dead
//! past the configured grace period.

use std::time::Duration;

use bedrock_core::http_client::ShardHttpClient;
use bedrock_core::model::PeerState;
use bedrock_core::wire::HealthResponse;
use tracing::{info, warn};

use crate::actor::CoordinatorHandle;

pub struct HeartbeatMonitor {
    handle: CoordinatorHandle,
    http: ShardHttpClient,
    interval: Duration,
    dead_peer_grace: Duration,
}

impl HeartbeatMonitor {
    pub fn new(handle: CoordinatorHandle, interval: Duration, dead_peer_grace: Duration) -> Self {
        Self {
            handle,
            http: ShardHttpClient::default(),
            interval,
            dead_peer_grace,
        }
    }

    /// Runs forever, probing every known peer once per tick and sweeping
    /// peers that have been `Dead` for longer than the grace period.
    /// Intended to be driven from a dedicated `tokio::spawn`.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            self.probe_all().await;
            self.evict_expired().await;
        }
    }

    async fn evict_expired(&self) {
        let evicted = self.handle.registry.evict_expired_dead(self.dead_peer_grace).await;
        for peer in evicted {
            info!(process_id = %peer.process_id, "evicted dead peer after grace period");
        }
    }

    async fn probe_all(&self) {
        let peers = self.handle.registry.snapshot().await;
        for peer in peers {
            let url = format!("{}/health", peer.url);
            match self.http.get::<HealthResponse>(&url).await {
                Ok(_) => {
                    self.handle.registry.record_probe_success(&peer.process_id).await;
                }
                Err(err) => self.record_miss(&peer.process_id, &err.to_string()).await,
            }
        }
    }

    async fn record_miss(&self, process_id: &str, cause: &str) {
        let Some(new_state) = self.handle.registry.record_probe_failure(process_id).await else {
            return;
        };

        warn!(process_id, cause, state = ?new_state, "missed health probe");

        if new_state == PeerState::Dead {
            info!(process_id, "peer declared dead, triggering reassignment");
            self.handle.peer_lost(process_id.to_string()).await;
        }
    }
}
