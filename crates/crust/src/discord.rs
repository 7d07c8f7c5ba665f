//! Discord gateway-info lookup, used only to derive `TOTAL_SHARDS` at
//! coordinator startup when the operator does not pin it (§6 env table).

use bedrock_core::error::{CoordError, Result};
use tracing::info;
use twilight_http::Client as DiscordClient;

/// Returns `(recommended_shards, max_concurrency)` from Discord's
/// `GET /gateway/bot`.
pub async fn get_gateway_info(client: &DiscordClient) -> Result<(u32, u32)> {
    let info = client
        .gateway()
        .authed()
        .await
        .map_err(|e| CoordError::InvalidState(format!("failed to get gateway info: {e}")))?
        .model()
        .await
        .map_err(|e| CoordError::InvalidState(format!("failed to deserialize gateway info: {e}")))?;

    info!(
        shards = info.shards,
        max_concurrency = info.session_start_limit.max_concurrency,
        "retrieved Discord gateway information"
    );

    Ok((info.shards, info.session_start_limit.max_concurrency as u32))
}
