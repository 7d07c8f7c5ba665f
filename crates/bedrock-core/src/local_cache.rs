//! Per-worker store of decoded gateway entities for the shards it owns.
//! Populated by the gateway event runner, read by the worker's cache HTTP
//! handlers (§4.10). Keyed by string id to match the wire format used at
//! the HTTP boundary; there is no cross-shard invalidation beyond what the
//! gateway itself sends.

use std::collections::HashMap;

use tokio::sync::RwLock;
use twilight_model::channel::Channel;
use twilight_model::guild::{Guild, Member};

#[derive(Default)]
pub struct LocalCache {
    guilds: RwLock<HashMap<String, Guild>>,
    channels: RwLock<HashMap<String, Channel>>,
    members: RwLock<HashMap<(String, String), Member>>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_guild(&self, guild: Guild) {
        self.guilds.write().await.insert(guild.id.to_string(), guild);
    }

    pub async fn get_guild(&self, id: &str) -> Option<Guild> {
        self.guilds.read().await.get(id).cloned()
    }

    pub async fn remove_guild(&self, id: &str) {
        self.guilds.write().await.remove(id);
    }

    pub async fn put_channel(&self, channel: Channel) {
        self.channels.write().await.insert(channel.id.to_string(), channel);
    }

    pub async fn get_channel(&self, id: &str) -> Option<Channel> {
        self.channels.read().await.get(id).cloned()
    }

    pub async fn remove_channel(&self, id: &str) {
        self.channels.write().await.remove(id);
    }

    pub async fn put_member(&self, guild_id: &str, member: Member) {
        let key = (guild_id.to_string(), member.user.id.to_string());
        self.members.write().await.insert(key, member);
    }

    pub async fn get_member(&self, guild_id: &str, user_id: &str) -> Option<Member> {
        self.members
            .read()
            .await
            .get(&(guild_id.to_string(), user_id.to_string()))
            .cloned()
    }

    pub async fn remove_member(&self, guild_id: &str, user_id: &str) {
        self.members.write().await.remove(&(guild_id.to_string(), user_id.to_string()));
    }

    /// Drops every entity belonging to `guild_id`, called when a shard stops
    /// owning a guild (guild delete, or the shard itself is reassigned away).
    pub async fn evict_guild(&self, guild_id: &str) {
        self.guilds.write().await.remove(guild_id);
        self.channels.write().await.retain(|_, c| {
            c.guild_id.map(|g| g.to_string()).as_deref() != Some(guild_id)
        });
        self.members.write().await.retain(|(g, _), _| g != guild_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_guild(id: u64) -> Guild {
        serde_json::from_value(serde_json::json!({
            "id": id.to_string(),
            "name": "test",
            "icon": null,
            "splash": null,
            "discovery_splash": null,
            "owner_id": "1",
            "region": null,
            "afk_channel_id": null,
            "afk_timeout": 60,
            "verification_level": 0,
            "default_message_notifications": 0,
            "explicit_content_filter": 0,
            "roles": [],
            "emojis": [],
            "features": [],
            "mfa_level": 0,
            "application_id": null,
            "system_channel_id": null,
            "system_channel_flags": 0,
            "rules_channel_id": null,
            "max_presences": null,
            "max_members": null,
            "vanity_url_code": null,
            "description": null,
            "banner": null,
            "premium_tier": 0,
            "premium_subscription_count": null,
            "preferred_locale": "en-US",
            "public_updates_channel_id": null,
            "max_video_channel_users": null,
            "approximate_member_count": null,
            "approximate_presence_count": null,
            "nsfw_level": 0,
            "premium_progress_bar_enabled": false,
            "stickers": [],
            "safety_alerts_channel_id": null
        }))
        .expect("sample guild fixture should deserialize")
    }

    #[tokio::test]
    async fn put_and_get_guild_round_trips() {
        let cache = LocalCache::new();
        cache.put_guild(sample_guild(42)).await;
        assert!(cache.get_guild("42").await.is_some());
        assert!(cache.get_guild("7").await.is_none());
    }

    #[tokio::test]
    async fn evict_guild_clears_its_entry() {
        let cache = LocalCache::new();
        cache.put_guild(sample_guild(42)).await;
        cache.evict_guild("42").await;
        assert!(cache.get_guild("42").await.is_none());
    }
}
