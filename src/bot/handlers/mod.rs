//! Discord interaction handlers
//!
//! This module provides handlers for Discord interactions and gateway events that are
//! not slash commands: autocomplete, attendance artifact components and voice-state
//! updates feeding the reminder scheduler.

/// Autocomplete handlers for skill groups
pub mod autocomplete;
/// Attendance artifact buttons and select menu
pub mod components;
/// Voice-state updates for the reminder scheduler
pub mod voice;

use crate::{
    bot::BotData,
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;

/// Entry point for gateway events, registered as the poise `event_handler`.
#[allow(clippy::unnecessary_wraps)] // poise event_handler signature
pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, BotData, Error>,
    data: &BotData,
) -> Result<()> {
    match event {
        serenity::FullEvent::VoiceStateUpdate { old, new } => {
            voice::on_voice_state_update(ctx, data, old.as_ref(), new).await;
        }
        serenity::FullEvent::InteractionCreate {
            interaction: serenity::Interaction::Component(component),
        } => {
            components::handle_component(ctx, data, component).await;
        }
        _ => {}
    }
    Ok(())
}
