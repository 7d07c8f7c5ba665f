use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use bedrock_core::local_cache::LocalCache;
use bedrock_core::model::ShardId;
use tokio::task::JoinHandle;
use tracing::info;

use crate::{discord, runner};

/// Manages Discord shards assigned to this worker. Unlike a static range
/// fixed at process start, the assigned set changes at runtime as the
/// coordinator pushes `AssignmentPush` updates; `apply_assignment` diffs
/// the new set against what is running and starts/stops shards to match.
///
/// Each shard runs in its own async task, decoding gateway events into
/// `cache` so the worker's `/cache/*` routes have something to answer with.
pub struct ShardManager {
    process_id: String,
    discord_token: String,
    total_shards: u32,
    shard_handles: HashMap<ShardId, JoinHandle<()>>,
    gateway_config: Arc<twilight_gateway::Config>,
    startup_semaphore: Arc<tokio::sync::Semaphore>,
    cache: Arc<LocalCache>,
}

impl ShardManager {
    pub fn new(process_id: String, discord_token: String, total_shards: u32, max_concurrency: u32, cache: Arc<LocalCache>) -> Self {
        let gateway_config = discord::gateway_config(&discord_token);
        let startup_semaphore = Arc::new(tokio::sync::Semaphore::new(max_concurrency.max(1) as usize));

        Self {
            process_id,
            discord_token,
            total_shards,
            shard_handles: HashMap::new(),
            gateway_config,
            startup_semaphore,
            cache,
        }
    }

    pub fn active_shards(&self) -> BTreeSet<ShardId> {
        self.shard_handles.keys().copied().collect()
    }

    pub fn total_shards(&self) -> u32 {
        self.total_shards
    }

    /// Reconciles the running shard set against a freshly pushed
    /// assignment. `total_shards` changing rebuilds the gateway config for
    /// shards started from here on, matching what the coordinator pushes
    /// after a reshard.
    pub async fn apply_assignment(&mut self, assigned: BTreeSet<ShardId>, total_shards: u32) {
        if total_shards != self.total_shards {
            info!(old = self.total_shards, new = total_shards, "total shard count changed, rebuilding gateway config");
            self.total_shards = total_shards;
            self.gateway_config = discord::gateway_config(&self.discord_token);
        }

        let current: HashSet<ShardId> = self.shard_handles.keys().copied().collect();
        let target: HashSet<ShardId> = assigned;

        for shard_id in current.difference(&target) {
            self.stop_shard(*shard_id).await;
        }
        for shard_id in target.difference(&current) {
            self.start_shard(*shard_id, 0).await;
            tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        }

        info!(process_id = %self.process_id, active = ?self.active_shards(), "shard assignment applied");
    }

    async fn start_shard(&mut self, shard_id_u32: ShardId, restart_delay_secs: u64) {
        if self.shard_handles.contains_key(&shard_id_u32) {
            return;
        }

        let gateway_config = self.gateway_config.clone();
        let total_shards = self.total_shards;
        let semaphore = self.startup_semaphore.clone();
        let cache = self.cache.clone();
        let process_id = self.process_id.clone();

        let handle = tokio::spawn(async move {
            let shard_id = twilight_model::gateway::ShardId::new(shard_id_u32, total_shards);
            if restart_delay_secs > 0 {
                tokio::time::sleep(std::time::Duration::from_secs(restart_delay_secs)).await;
            }
            loop {
                let _permit = semaphore.acquire().await.expect("shard startup semaphore closed");
                tracing::info!(shard_id = shard_id.number(), process_id = %process_id, "acquired startup permit, starting runner");

                let shard = twilight_gateway::Shard::with_config(shard_id, (*gateway_config).clone());
                if let Err(err) = runner::run(shard, cache.clone()).await {
                    tracing::error!(shard_id = shard_id.number(), process_id = %process_id, error = %err, "shard runner failed, restarting");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                }
            }
        });

        self.shard_handles.insert(shard_id_u32, handle);
        info!(shard_id = shard_id_u32, "started shard runner");
    }

    async fn stop_shard(&mut self, shard_id_u32: ShardId) {
        if let Some(handle) = self.shard_handles.remove(&shard_id_u32) {
            handle.abort();
            info!(shard_id = shard_id_u32, "stopped shard runner");
        }
    }

    pub async fn shutdown(&mut self) {
        info!("shutting down all shard runners");
        for (shard_id, handle) in self.shard_handles.drain() {
            handle.abort();
            info!(shard_id, "stopped shard runner");
        }
    }
}
