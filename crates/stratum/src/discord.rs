use std::sync::Arc;

use twilight_gateway::{Config as GatewayConfig, ConfigBuilder as GatewayConfigBuilder};
use twilight_model::gateway::Intents;

/// Builds the gateway configuration every shard this worker owns shares.
/// Unlike a static worker range, the set of shard ids actually handled here
/// changes at runtime as assignments are pushed by the coordinator; only
/// the token and intents are fixed at startup.
pub fn gateway_config(discord_token: &str) -> Arc<GatewayConfig> {
    Arc::new(
        GatewayConfigBuilder::new(discord_token.to_string(), Intents::GUILDS | Intents::GUILD_MEMBERS)
            .build(),
    )
}
