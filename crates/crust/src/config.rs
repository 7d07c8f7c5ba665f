use std::time::Duration;

use bedrock_core::env::{duration_ms_or, var_or};
use bedrock_core::model::{new_process_id, ProcessId};
use tracing::info;

/// Configuration for a process starting in the coordinator role.
#[derive(Clone)]
pub struct CoordinatorConfig {
    /// Unique identifier for this process (`PROCESS_ID`, auto-generated
    /// otherwise).
    pub process_id: ProcessId,
    /// Address this HTTP surface binds to.
    pub bind_addr: String,
    /// URL other peers should use to reach this process.
    pub public_url: String,
    /// Total shard count; if unset, derived from Discord's gateway info at
    /// startup.
    pub total_shards: Option<u32>,
    /// Discord bot token, used only for the gateway-info lookup.
    pub discord_token: Option<String>,
    pub heartbeat_interval: Duration,
    /// Candidate URLs to probe for an already-active temporary coordinator
    /// before this process claims authority (§4.9). Comma-separated in
    /// `RESUME_CANDIDATE_URLS`; empty means "start fresh, no resumption".
    pub resume_candidate_urls: Vec<String>,
}

impl CoordinatorConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let process_id = std::env::var("PROCESS_ID").unwrap_or_else(|_| new_process_id());
        let bind_addr = var_or("BIND_ADDR", "0.0.0.0:7000");
        let public_url = var_or("PUBLIC_URL", &format!("http://{bind_addr}"));
        let total_shards = std::env::var("TOTAL_SHARDS").ok().and_then(|v| v.parse().ok());
        let discord_token = std::env::var("DISCORD_TOKEN").ok();
        let heartbeat_interval = duration_ms_or("HEARTBEAT_INTERVAL_MS", 15_000);
        let resume_candidate_urls = std::env::var("RESUME_CANDIDATE_URLS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        info!(
            process_id = %process_id,
            bind_addr = %bind_addr,
            public_url = %public_url,
            ?total_shards,
            heartbeat_interval_ms = heartbeat_interval.as_millis() as u64,
            "loaded coordinator configuration"
        );

        Ok(Self {
            process_id,
            bind_addr,
            public_url,
            total_shards,
            discord_token,
            heartbeat_interval,
            resume_candidate_urls,
        })
    }

    /// Resolves `total_shards`, deriving it from Discord's gateway-info
    /// endpoint when the operator did not pin a value.
    pub async fn resolve_total_shards(&self) -> anyhow::Result<u32> {
        if let Some(total) = self.total_shards {
            return Ok(total);
        }

        let token = self
            .discord_token
            .clone()
            .ok_or_else(|| anyhow::anyhow!("DISCORD_TOKEN must be set when TOTAL_SHARDS is not"))?;
        let client = twilight_http::Client::new(token);
        let (shards, _max_concurrency) = crate::discord::get_gateway_info(&client).await?;
        Ok(shards)
    }

    pub fn dead_peer_grace(&self) -> Duration {
        duration_ms_or("DEAD_PEER_GRACE_MS", 60_000)
    }
}
