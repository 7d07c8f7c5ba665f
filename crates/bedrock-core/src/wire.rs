//! Control-plane payloads (§6). All JSON, snake_case keys.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::{ClusterAssignment, Epoch, PeerNode, ProcessId, ShardId, SuccessionEntry};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerSummary {
    pub process_id: ProcessId,
    pub url: String,
    pub assigned_shards: BTreeSet<ShardId>,
}

impl From<&PeerNode> for PeerSummary {
    fn from(peer: &PeerNode) -> Self {
        Self {
            process_id: peer.process_id.clone(),
            url: peer.url.clone(),
            assigned_shards: peer.assigned_shards.clone(),
        }
    }
}

/// `POST /worker/register`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub process_id: ProcessId,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub total_shards: u32,
    pub assigned_shards: BTreeSet<ShardId>,
    pub epoch: Epoch,
    pub peers: Vec<PeerSummary>,
    pub succession_rank: u32,
}

/// `POST /worker/heartbeat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub process_id: ProcessId,
    pub epoch: Epoch,
    #[serde(default)]
    pub shard_lag: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub epoch: Epoch,
    pub assigned_shards: BTreeSet<ShardId>,
}

/// `POST /worker/deregister`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeregisterRequest {
    pub process_id: ProcessId,
}

/// `GET /cluster/state`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterStateResponse {
    pub assignment: ClusterAssignment,
    pub succession_order: Vec<SuccessionEntry>,
    pub peers: Vec<PeerSummary>,
    pub epoch: Epoch,
}

/// `POST /coordinator/assignment`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentPush {
    pub assigned_shards: BTreeSet<ShardId>,
    pub total_shards: u32,
    pub epoch: Epoch,
}

/// `POST /cluster/succession`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessionBroadcast {
    pub new_coordinator_id: ProcessId,
    pub new_coordinator_url: String,
    pub epoch: Epoch,
}

/// `POST /coordinator/resume`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeRequest {
    pub original_coordinator_id: ProcessId,
    pub original_coordinator_url: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorHandoffData {
    pub total_shards: u32,
    pub peer_nodes: Vec<PeerSummary>,
    pub succession_order: Vec<SuccessionEntry>,
    pub epoch: Epoch,
    pub temporary_coordinator_id: ProcessId,
}

/// `POST /coordinator/resumed`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumedNotification {
    pub resumed_coordinator_id: ProcessId,
    pub resumed_coordinator_url: String,
    pub previous_coordinator_id: ProcessId,
    pub succession_order: Vec<SuccessionEntry>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub role: crate::model::Role,
    pub epoch: Epoch,
}
