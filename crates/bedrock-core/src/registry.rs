use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::model::{PeerNode, PeerState, ProcessId, ShardId};

/// Concurrent map keyed by `process_id`. All operations are safe under
/// concurrent mutation; `snapshot` returns a point-in-time copy so readers
/// never block writers for longer than the copy itself.
#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    inner: Arc<RwLock<HashMap<ProcessId, PeerNode>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, peer: PeerNode) {
        self.inner.write().await.insert(peer.process_id.clone(), peer);
    }

    /// Idempotent: removing an absent peer is a no-op.
    pub async fn remove(&self, process_id: &str) -> Option<PeerNode> {
        self.inner.write().await.remove(process_id)
    }

    pub async fn get(&self, process_id: &str) -> Option<PeerNode> {
        self.inner.read().await.get(process_id).cloned()
    }

    pub async fn snapshot(&self) -> Vec<PeerNode> {
        self.inner.read().await.values().cloned().collect()
    }

    /// All peers whose role is `Worker` (excludes the coordinator and any
    /// temporary coordinator, matching the succession-order invariant that
    /// the coordinator is excluded) and that are not already `Dead` —
    /// a dead peer keeps its registry entry until evicted but is never a
    /// rebalance target.
    pub async fn workers(&self) -> Vec<PeerNode> {
        self.inner
            .read()
            .await
            .values()
            .filter(|p| matches!(p.role, crate::model::Role::Worker) && p.state != PeerState::Dead)
            .cloned()
            .collect()
    }

    pub async fn find_by_shard(&self, shard_id: ShardId) -> Option<PeerNode> {
        self.inner
            .read()
            .await
            .values()
            .find(|p| p.assigned_shards.contains(&shard_id))
            .cloned()
    }

    pub async fn mark_state(&self, process_id: &str, state: PeerState) {
        if let Some(peer) = self.inner.write().await.get_mut(process_id) {
            peer.state = state;
        }
    }

    /// Resets the consecutive-miss counter and marks the peer `Active`,
    /// called after a successful liveness probe.
    pub async fn record_probe_success(&self, process_id: &str) {
        if let Some(peer) = self.inner.write().await.get_mut(process_id) {
            peer.missed_probes = 0;
            peer.state = PeerState::Active;
            peer.last_seen = std::time::Instant::now();
        }
    }

    /// `Active -> Suspect` on the first miss; `Suspect -> Dead` once three
    /// consecutive misses have accumulated (§4.5). Returns the peer's state
    /// after the update, or `None` if the peer is no longer registered.
    pub async fn record_probe_failure(&self, process_id: &str) -> Option<PeerState> {
        let mut guard = self.inner.write().await;
        let peer = guard.get_mut(process_id)?;
        peer.missed_probes += 1;
        peer.state = if peer.missed_probes >= 3 {
            PeerState::Dead
        } else {
            PeerState::Suspect
        };
        Some(peer.state)
    }

    pub async fn set_assignment(&self, process_id: &str, shards: std::collections::BTreeSet<ShardId>) {
        if let Some(peer) = self.inner.write().await.get_mut(process_id) {
            peer.assigned_shards = shards;
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Removes every `Dead` peer whose last successful probe is older than
    /// `grace`, returning the evicted entries. A dead peer's shards are
    /// reassigned as soon as it is declared dead; this only clears the
    /// stale record itself, per the default 60s grace period.
    pub async fn evict_expired_dead(&self, grace: std::time::Duration) -> Vec<PeerNode> {
        let mut guard = self.inner.write().await;
        let expired: Vec<ProcessId> = guard
            .values()
            .filter(|p| p.state == PeerState::Dead && p.last_seen.elapsed() >= grace)
            .map(|p| p.process_id.clone())
            .collect();

        expired.iter().filter_map(|id| guard.remove(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;

    #[tokio::test]
    async fn upsert_then_remove_is_idempotent() {
        let registry = PeerRegistry::new();
        registry
            .upsert(PeerNode::new("a".into(), "http://a".into(), Role::Worker))
            .await;
        assert_eq!(registry.len().await, 1);

        assert!(registry.remove("a").await.is_some());
        assert!(registry.remove("a").await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn find_by_shard_returns_owning_peer() {
        let registry = PeerRegistry::new();
        let mut peer = PeerNode::new("a".into(), "http://a".into(), Role::Worker);
        peer.assigned_shards.insert(3);
        registry.upsert(peer).await;

        let found = registry.find_by_shard(3).await;
        assert_eq!(found.unwrap().process_id, "a");
        assert!(registry.find_by_shard(7).await.is_none());
    }

    #[tokio::test]
    async fn dead_peer_excluded_from_workers_until_evicted() {
        let registry = PeerRegistry::new();
        registry
            .upsert(PeerNode::new("a".into(), "http://a".into(), Role::Worker))
            .await;
        registry.record_probe_failure("a").await;
        registry.record_probe_failure("a").await;
        let state = registry.record_probe_failure("a").await;
        assert_eq!(state, Some(PeerState::Dead));

        assert!(registry.workers().await.is_empty());
        assert_eq!(registry.len().await, 1, "dead peer stays registered until evicted");

        let evicted = registry.evict_expired_dead(std::time::Duration::from_secs(0)).await;
        assert_eq!(evicted.len(), 1);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn suspect_peer_still_eligible_for_assignment() {
        let registry = PeerRegistry::new();
        registry
            .upsert(PeerNode::new("a".into(), "http://a".into(), Role::Worker))
            .await;
        registry.record_probe_failure("a").await;

        assert_eq!(registry.workers().await.len(), 1);
    }
}
