use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Integer in `[0, total_shards)`.
pub type ShardId = u32;

/// Stable string identifier assigned at process start; globally unique
/// within a cluster.
pub type ProcessId = String;

/// Monotonically increasing version stamp on authoritative state.
pub type Epoch = u64;

pub fn new_process_id() -> ProcessId {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Coordinator,
    Worker,
    TemporaryCoordinator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerState {
    Joining,
    Active,
    Suspect,
    Dead,
}

/// Created when a peer first registers; mutated only by the coordinator;
/// destroyed after it has been `Dead` for at least the grace period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerNode {
    pub process_id: ProcessId,
    pub url: String,
    pub role: Role,
    pub assigned_shards: BTreeSet<ShardId>,
    pub join_timestamp: chrono::DateTime<chrono::Utc>,
    pub state: PeerState,

    /// Instant of the last successful contact, used by the heartbeat
    /// monitor's missed-probe counting. Not serialized; it has no meaning
    /// outside the process holding it.
    #[serde(skip, default = "Instant::now")]
    pub last_seen: Instant,

    /// Count of consecutive missed liveness probes, reset on success.
    #[serde(skip)]
    pub missed_probes: u32,
}

impl PeerNode {
    pub fn new(process_id: ProcessId, url: String, role: Role) -> Self {
        Self {
            process_id,
            url,
            role,
            assigned_shards: BTreeSet::new(),
            join_timestamp: chrono::Utc::now(),
            state: PeerState::Joining,
            last_seen: Instant::now(),
            missed_probes: 0,
        }
    }
}

/// Default grace period a `Dead` peer is retained before eviction.
pub const DEFAULT_DEAD_PEER_GRACE: Duration = Duration::from_secs(60);

/// `{total_shards: N, map: process_id -> set<ShardId>}`. Invariant: the
/// union of all `assigned_shards` values equals `[0, N)` exactly; shards
/// belonging to no registered worker are parked in `pending`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub total_shards: u32,
    pub map: BTreeMap<ProcessId, BTreeSet<ShardId>>,
    pub pending: BTreeSet<ShardId>,
}

impl ClusterAssignment {
    pub fn empty(total_shards: u32) -> Self {
        Self {
            total_shards,
            map: BTreeMap::new(),
            pending: (0..total_shards).collect(),
        }
    }

    pub fn shards_for(&self, process_id: &str) -> BTreeSet<ShardId> {
        self.map.get(process_id).cloned().unwrap_or_default()
    }

    /// Invariant 1 (§8): the union of all assigned shards, plus pending,
    /// equals `[0, total_shards)` exactly, with no overlaps.
    pub fn is_partition(&self) -> bool {
        let mut seen = BTreeSet::new();
        for shards in self.map.values() {
            for &s in shards {
                if !seen.insert(s) {
                    return false;
                }
            }
        }
        for &s in &self.pending {
            if !seen.insert(s) {
                return false;
            }
        }
        seen.len() as u32 == self.total_shards && seen.iter().all(|&s| s < self.total_shards)
    }
}

/// One entry of the total succession ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessionEntry {
    pub process_id: ProcessId,
    pub url: String,
    pub rank: u32,
}

/// Ordered list sorted by `(join_timestamp ascending, process_id ascending)`.
/// The coordinator itself is excluded; ranks are dense `0..k-1`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuccessionOrder(pub Vec<SuccessionEntry>);

impl SuccessionOrder {
    pub fn rank_of(&self, process_id: &str) -> Option<u32> {
        self.0
            .iter()
            .find(|e| e.process_id == process_id)
            .map(|e| e.rank)
    }

    pub fn is_dense(&self) -> bool {
        let mut ranks: Vec<u32> = self.0.iter().map(|e| e.rank).collect();
        ranks.sort_unstable();
        ranks.iter().enumerate().all(|(i, &r)| i as u32 == r)
    }
}

/// Transferred atomically during resumption or failover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorHandoff {
    pub total_shards: u32,
    pub peers: Vec<PeerNode>,
    pub assignment: ClusterAssignment,
    pub succession_order: SuccessionOrder,
    pub epoch: Epoch,
}
