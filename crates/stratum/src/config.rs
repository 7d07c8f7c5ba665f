use std::time::Duration;

use bedrock_core::env::{duration_ms_or, var_or};
use bedrock_core::model::{new_process_id, ProcessId};
use tracing::info;

/// Configuration for a process starting in the worker role (§6 env table).
#[derive(Clone)]
pub struct WorkerConfig {
    pub process_id: ProcessId,
    pub discord_token: String,
    /// Base URL of the process this worker registers against at startup.
    pub coordinator_url: String,
    pub bind_addr: String,
    pub public_url: String,
    pub heartbeat_interval: Duration,
    pub max_concurrency: u32,
    /// §5: time budget for a graceful SIGTERM shutdown (deregister + close
    /// gateway sessions) before the process aborts outright.
    pub shutdown_deadline: Duration,
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let process_id = std::env::var("PROCESS_ID").unwrap_or_else(|_| new_process_id());
        let discord_token =
            std::env::var("DISCORD_TOKEN").map_err(|_| anyhow::anyhow!("DISCORD_TOKEN must be set"))?;
        let coordinator_url = std::env::var("SHARD_COORDINATOR_URL")
            .map_err(|_| anyhow::anyhow!("SHARD_COORDINATOR_URL must be set"))?;
        let bind_addr = var_or("BIND_ADDR", "0.0.0.0:7100");
        let public_url = var_or("PUBLIC_URL", &format!("http://{bind_addr}"));
        let heartbeat_interval = duration_ms_or("HEARTBEAT_INTERVAL_MS", 15_000);
        let max_concurrency: u32 = std::env::var("MAX_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);
        let shutdown_deadline = duration_ms_or("SHUTDOWN_DEADLINE_MS", 30_000);

        info!(
            process_id = %process_id,
            coordinator_url = %coordinator_url,
            bind_addr = %bind_addr,
            public_url = %public_url,
            max_concurrency,
            "loaded worker configuration"
        );

        Ok(Self {
            process_id,
            discord_token,
            coordinator_url,
            bind_addr,
            public_url,
            heartbeat_interval,
            max_concurrency,
            shutdown_deadline,
        })
    }
}
