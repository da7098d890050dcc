//! Background reminder task.
//!
//! One task drives both the occupancy scan and the daily reset through a single
//! `tokio::select!`, so a tick never observes a half-finished reset.

use crate::{
    bot::{directory::CacheDirectory, ui::to_embed},
    config::AppConfig,
    core::{
        directory::{GuildDirectory, VoicePresence},
        reminder::{Reminder, ReminderScheduler},
    },
    errors::Result,
};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at};
use tracing::{error, info, warn};

/// Spawns the reminder loop on the current runtime.
pub fn spawn_reminder_task(
    ctx: serenity::Context,
    config: Arc<AppConfig>,
    scheduler: Arc<Mutex<ReminderScheduler>>,
) {
    tokio::spawn(async move {
        run_reminder_loop(ctx, config, scheduler).await;
    });
}

fn current_presences(ctx: &serenity::Context, config: &AppConfig) -> Result<Vec<VoicePresence>> {
    let guild_id = serenity::GuildId::new(config.guild.guild_id);
    CacheDirectory::new(&ctx.cache, guild_id).voice_presences()
}

async fn run_reminder_loop(
    ctx: serenity::Context,
    config: Arc<AppConfig>,
    scheduler: Arc<Mutex<ReminderScheduler>>,
) {
    let mut check = interval(config.reminder.check_interval());
    check.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let epoch = config.reminder.epoch();
    let mut reset = interval_at(Instant::now() + epoch, epoch);

    match current_presences(&ctx, &config) {
        Ok(presences) => scheduler.lock().await.initialize(&presences),
        Err(e) => warn!("Could not read voice state at startup: {e}"),
    }
    info!(
        check_secs = config.reminder.check_interval_secs,
        epoch_hours = config.reminder.epoch_hours,
        "Reminder task started"
    );

    loop {
        tokio::select! {
            _ = check.tick() => {
                let presences = match current_presences(&ctx, &config) {
                    Ok(presences) => presences,
                    Err(e) => {
                        warn!("Skipping reminder check: {e}");
                        continue;
                    }
                };
                let (due, threshold) = {
                    let mut scheduler = scheduler.lock().await;
                    (scheduler.tick(&presences), scheduler.threshold())
                };
                for reminder in due {
                    deliver(&ctx, &config, &reminder, threshold).await;
                }
            }
            _ = reset.tick() => {
                let presences = current_presences(&ctx, &config).unwrap_or_else(|e| {
                    warn!("Resetting reminders without voice state: {e}");
                    Vec::new()
                });
                scheduler.lock().await.reset_epoch(&presences);
            }
        }
    }
}

/// Posts one reminder; failures are logged and the member stays in the cooldown set.
async fn deliver(
    ctx: &serenity::Context,
    config: &AppConfig,
    reminder: &Reminder,
    threshold: chrono::Duration,
) {
    let channel = serenity::ChannelId::new(config.guild.attendance_channel_id);
    let message = serenity::CreateMessage::new()
        .content(reminder.content())
        .embed(to_embed(&reminder.page(threshold)));

    match channel.send_message(&ctx.http, message).await {
        Ok(_) => info!(member = %reminder.display_name, "Sent attendance reminder"),
        Err(e) => error!(member = %reminder.display_name, "Failed to send reminder: {e}"),
    }
}
