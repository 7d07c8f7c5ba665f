use twilight_model::channel::Channel;
use twilight_model::guild::{Guild, Member};

use crate::http_client::ShardHttpClient;
use crate::registry::PeerRegistry;
use crate::shard::ShardCalculator;

/// Routes cache lookups to the worker owning the target shard. Lookups are
/// best-effort reads: any transport failure or missing owner yields `None`
/// rather than propagating an error, so callers never need to special-case
/// cluster churn.
#[derive(Clone)]
pub struct DistributedCache {
    registry: PeerRegistry,
    http: ShardHttpClient,
    total_shards: u32,
}

impl DistributedCache {
    pub fn new(registry: PeerRegistry, http: ShardHttpClient, total_shards: u32) -> Self {
        Self {
            registry,
            http,
            total_shards,
        }
    }

    pub async fn get_guild(&self, guild_id: &str) -> Option<Guild> {
        let url = self.route(guild_id, "guild", guild_id).await?;
        self.fetch(&url).await
    }

    pub async fn get_channel(&self, channel_id: &str, guild_id: &str) -> Option<Channel> {
        let url = self.route(guild_id, "channel", channel_id).await?;
        self.fetch(&url).await
    }

    pub async fn get_member(&self, user_id: &str, guild_id: &str) -> Option<Member> {
        let owner = self.owning_worker(guild_id).await?;
        let url = format!("{}/cache/member/{}/{}", owner.url, guild_id, user_id);
        self.fetch(&url).await
    }

    async fn owning_worker(&self, guild_id: &str) -> Option<crate::model::PeerNode> {
        let shard_id = match ShardCalculator::shard_id(guild_id, self.total_shards as i64) {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(guild_id, error = %err, "failed to compute shard for cache lookup");
                return None;
            }
        };

        let owner = self.registry.find_by_shard(shard_id).await;
        if owner.is_none() {
            tracing::warn!(shard_id, "no worker owns this shard, cache lookup cannot be routed");
        }
        owner
    }

    async fn route(&self, guild_id: &str, kind: &str, entity_id: &str) -> Option<String> {
        let owner = self.owning_worker(guild_id).await?;
        Some(format!("{}/cache/{}/{}", owner.url, kind, entity_id))
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, url: &str) -> Option<T> {
        match self.http.get_opt::<T>(url).await {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(url, error = %err, "transport failure during cache lookup");
                None
            }
        }
    }
}
