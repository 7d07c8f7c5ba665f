use std::sync::Arc;

use anyhow::Result;
use bedrock_core::local_cache::LocalCache;
use futures_util::StreamExt;
use tracing::{error, info, span, trace, Level};
use twilight_gateway::{error::ReceiveMessageErrorType, EventTypeFlags, Message, Shard};
use twilight_model::gateway::event::Event;
use twilight_model::gateway::payload::incoming::GuildCreate;

const WANTED_EVENTS: EventTypeFlags = EventTypeFlags::GUILD_CREATE
    .union(EventTypeFlags::GUILD_UPDATE)
    .union(EventTypeFlags::GUILD_DELETE)
    .union(EventTypeFlags::CHANNEL_CREATE)
    .union(EventTypeFlags::CHANNEL_UPDATE)
    .union(EventTypeFlags::CHANNEL_DELETE)
    .union(EventTypeFlags::MEMBER_ADD)
    .union(EventTypeFlags::MEMBER_REMOVE)
    .union(EventTypeFlags::READY);

/// Runs a Discord shard, decoding gateway payloads into `cache` so this
/// worker's `/cache/*` routes can answer lookups for the guilds its shards
/// own. Returns on reconnect errors so the caller restarts the shard;
/// other receive errors are logged and the loop continues.
pub async fn run(mut shard: Shard, cache: Arc<LocalCache>) -> Result<()> {
    let runner_span = span!(Level::INFO, "discord_shard_runner", shard.id = shard.id().number());
    let _enter = runner_span.enter();

    info!("starting Discord shard runner");

    loop {
        let next = shard.next().await;
        let Some(event) = next else {
            info!("shard stream ended");
            return Ok(());
        };

        let event_span = span!(Level::TRACE, "discord_event_handling");
        let _enter_event = event_span.enter();

        match event {
            Ok(Message::Text(text)) => {
                match twilight_gateway::parse(text, WANTED_EVENTS) {
                    Ok(Some(event)) => apply_event(&cache, event).await,
                    Ok(None) => {}
                    Err(err) => trace!(error = %err, "failed to decode gateway payload"),
                }
            }
            Ok(Message::Close(frame)) => {
                trace!(?frame, "shard connection closed");
            }
            Err(err) => {
                error!(error = %err, "error receiving message from Discord");
                if matches!(err.kind(), ReceiveMessageErrorType::Reconnect) {
                    return Err(err.into());
                }
            }
        }
    }
}

async fn apply_event(cache: &LocalCache, event: Event) {
    match event {
        Event::GuildCreate(guild_create) => match *guild_create {
            GuildCreate::Available(guild) => cache.put_guild(guild).await,
            GuildCreate::Unavailable(_) => {}
        },
        Event::GuildDelete(deleted) => cache.evict_guild(&deleted.id.to_string()).await,
        Event::ChannelCreate(channel) => cache.put_channel(*channel).await,
        Event::ChannelUpdate(channel) => cache.put_channel(*channel).await,
        Event::ChannelDelete(channel) => cache.remove_channel(&channel.id.to_string()).await,
        Event::MemberAdd(member_add) => {
            cache.put_member(&member_add.guild_id.to_string(), member_add.member.clone()).await
        }
        Event::MemberRemove(member_remove) => {
            cache
                .remove_member(&member_remove.guild_id.to_string(), &member_remove.user.id.to_string())
                .await
        }
        Event::Ready(ready) => info!(shard = ready.shard.map(|s| s.number()), "shard ready"),
        other => trace!(kind = ?other.kind(), "unhandled gateway event"),
    }
}
