//! Bot layer - Discord-specific interface and command handlers
//!
//! This module provides the Discord interface for the `AttendanceBuddy` application:
//! slash commands, component and voice-state handlers, the reminder task, and the
//! framework setup that wires them to the shared [`BotData`].

/// Permission checks shared by commands and components
pub mod checks;
/// Discord command implementations (attendance, users, general)
pub mod commands;
/// Serenity cache adapter for the guild directory
pub mod directory;
/// Discord interaction and gateway event handlers
pub mod handlers;
/// Background reminder task
pub mod tasks;
/// Embeds and message components built from core display pages
pub mod ui;

use crate::{
    config::AppConfig,
    core::{attendance::SessionRegistry, clock::Clock, reminder::ReminderScheduler},
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

/// Shared data available to all bot commands and handlers.
pub struct BotData {
    /// Database connection for all database operations
    pub database: DatabaseConnection,
    /// Guild configuration
    pub config: Arc<AppConfig>,
    /// Live attendance sessions
    pub sessions: Arc<SessionRegistry>,
    /// Reminder state, shared with the background task
    pub scheduler: Arc<Mutex<ReminderScheduler>>,
    /// Time source for sessions, reports and reminders
    pub clock: Arc<dyn Clock>,
}

impl BotData {
    /// Creates the shared context for all commands.
    pub fn new(
        database: DatabaseConnection,
        config: Arc<AppConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let sessions =
            SessionRegistry::new(Arc::clone(&clock), config.attendance.session_timeout());
        let scheduler = ReminderScheduler::from_config(Arc::clone(&clock), &config);
        Self {
            database,
            config,
            sessions: Arc::new(sessions),
            scheduler: Arc::new(Mutex::new(scheduler)),
            clock,
        }
    }

    /// The configured guild
    #[must_use]
    pub fn guild_id(&self) -> serenity::GuildId {
        serenity::GuildId::new(self.config.guild.guild_id)
    }
}

/// Poise context used by every command
pub type Context<'a> = poise::Context<'a, BotData, Error>;

/// Replies ephemerally with the user-facing text of `error`.
async fn reply_with_error(ctx: Context<'_>, error: &Error) {
    let reply = poise::CreateReply::default()
        .content(error.user_message())
        .ephemeral(true);
    if let Err(e) = ctx.send(reply).await {
        error!("Failed to send error message: {e}");
    }
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Error in command `{}`: {error:?}", ctx.command().name);
            reply_with_error(ctx, &error).await;
        }
        poise::FrameworkError::CommandCheckFailed { error, ctx, .. } => {
            let error = error.unwrap_or(Error::PermissionDenied);
            warn!(
                user = %ctx.author().name,
                "Check failed for `{}`: {error}",
                ctx.command().name
            );
            reply_with_error(ctx, &error).await;
        }
        poise::FrameworkError::EventHandler { error, event, .. } => {
            error!("Error handling {}: {error:?}", event.snake_case_name());
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {e}");
            }
        }
    }
}

/// Builds the poise framework and runs the client until it stops.
#[instrument(skip_all)]
pub async fn run_bot(token: String, data: BotData) -> Result<()> {
    let guild_id = data.guild_id();
    let config = Arc::clone(&data.config);
    let scheduler = Arc::clone(&data.scheduler);

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::take(),
                commands::report(),
                commands::sync_users(),
                commands::ping(),
                commands::help(),
            ],
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, framework, data| {
                Box::pin(handlers::event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                poise::builtins::register_in_guild(ctx, &framework.options().commands, guild_id)
                    .await?;
                info!("Registered commands in guild {guild_id}");
                tasks::spawn_reminder_task(ctx.clone(), config, scheduler);
                Ok(data)
            })
        })
        .build();

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_VOICE_STATES;

    info!("Setting up Serenity client for Poise framework...");
    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .inspect_err(|e| error!("Error creating client: {e:?}"))?;

    info!("Starting bot client...");
    client
        .start()
        .await
        .inspect_err(|e| error!("Client error: {e:?}"))?;
    Ok(())
}

pub use commands::*;
