//! Standalone distributed-cache query client (§4.10). Asks a coordinator
//! for a peer-registry snapshot, then routes a single cache lookup
//! straight to the worker that owns the target shard, the way any
//! external caller of `DistributedCache` would.
//!
//! Replaces this crate's former role as a NATS work-queue consumer — the
//! coordination core's control plane is HTTP/JSON end-to-end, so there is
//! no queue to drain here.

use bedrock_core::cache::DistributedCache;
use bedrock_core::http_client::ShardHttpClient;
use bedrock_core::model::{PeerNode, Role};
use bedrock_core::registry::PeerRegistry;
use bedrock_core::wire::ClusterStateResponse;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: mantle <guild ID> | mantle channel ID GUILD_ID | mantle member GUILD_ID USER_ID";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;

    if let Err(err) = run().await {
        error!(error = %err, "lookup failed");
        return Err(err);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let kind = args.next().ok_or_else(|| anyhow::anyhow!(USAGE))?;

    let coordinator_url =
        std::env::var("SHARD_COORDINATOR_URL").unwrap_or_else(|_| "http://127.0.0.1:7000".to_string());

    let http = ShardHttpClient::default();
    let state: ClusterStateResponse = http
        .get(&format!("{coordinator_url}/cluster/state"))
        .await
        .map_err(|e| anyhow::anyhow!("failed to fetch cluster state from {coordinator_url}: {e}"))?;

    info!(
        total_shards = state.assignment.total_shards,
        peers = state.peers.len(),
        "fetched cluster state snapshot"
    );

    let registry = PeerRegistry::new();
    for peer in &state.peers {
        let mut node = PeerNode::new(peer.process_id.clone(), peer.url.clone(), Role::Worker);
        node.assigned_shards = peer.assigned_shards.clone();
        registry.upsert(node).await;
    }

    let cache = DistributedCache::new(registry, ShardHttpClient::default(), state.assignment.total_shards);

    match kind.as_str() {
        "guild" => {
            let guild_id = args.next().ok_or_else(|| anyhow::anyhow!(USAGE))?;
            print_result(cache.get_guild(&guild_id).await)
        }
        "channel" => {
            let channel_id = args.next().ok_or_else(|| anyhow::anyhow!(USAGE))?;
            let guild_id = args.next().ok_or_else(|| anyhow::anyhow!(USAGE))?;
            print_result(cache.get_channel(&channel_id, &guild_id).await)
        }
        "member" => {
            let guild_id = args.next().ok_or_else(|| anyhow::anyhow!(USAGE))?;
            let user_id = args.next().ok_or_else(|| anyhow::anyhow!(USAGE))?;
            print_result(cache.get_member(&user_id, &guild_id).await)
        }
        other => {
            anyhow::bail!("unknown lookup kind {other:?}\n{USAGE}")
        }
    }
}

fn print_result<T: serde::Serialize>(value: Option<T>) -> anyhow::Result<()> {
    match value {
        Some(v) => println!("{}", serde_json::to_string_pretty(&v)?),
        None => println!("null"),
    }
    Ok(())
}

fn init_logging() -> anyhow::Result<()> {
    let subscriber = EnvFilter::from_default_env()
        .add_directive(Level::INFO.into())
        .add_directive("mantle=trace".parse()?);

    tracing_subscriber::fmt().with_env_filter(subscriber).init();
    Ok(())
}
