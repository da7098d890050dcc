//! Voice-state updates for the reminder scheduler.

use crate::bot::{BotData, directory::to_member};
use poise::serenity_prelude as serenity;
use tracing::debug;

/// Forwards a join/leave transition in the configured guild to the scheduler.
pub async fn on_voice_state_update(
    ctx: &serenity::Context,
    data: &BotData,
    old: Option<&serenity::VoiceState>,
    new: &serenity::VoiceState,
) {
    if new.guild_id != Some(data.guild_id()) {
        return;
    }

    let member = new.member.as_ref().map(to_member).or_else(|| {
        ctx.cache
            .guild(data.guild_id())
            .and_then(|guild| guild.members.get(&new.user_id).map(to_member))
    });
    let Some(member) = member else {
        debug!(user_id = %new.user_id, "Voice update for uncached member");
        return;
    };

    let before = old.and_then(|state| state.channel_id).map(serenity::ChannelId::get);
    let after = new.channel_id.map(serenity::ChannelId::get);
    data.scheduler
        .lock()
        .await
        .on_voice_state_change(&member, before, after);
}
