//! Attendance artifact buttons and select menu.
//!
//! Every click is checked against the allow-list, resolved through the session
//! registry and applied under the session's lock. The artifact is re-rendered from the
//! session state while the lock is still held, so responses never go out of order.

use crate::{
    bot::{
        BotData,
        checks::{ensure_allowed, role_ids},
        directory::CacheDirectory,
        ui::{SessionAction, parse_component_id, session_rows, to_embed},
    },
    core::{
        attendance::{AttendanceSession, ExcuseOutcome, render_session},
        directory::GuildDirectory,
    },
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;
use serenity::{
    ComponentInteraction, ComponentInteractionDataKind, CreateInteractionResponse,
    CreateInteractionResponseFollowup, CreateInteractionResponseMessage,
};
use tracing::{error, info, warn};

/// Handles a component interaction; errors are logged and reported to the clicker.
pub async fn handle_component(
    ctx: &serenity::Context,
    data: &BotData,
    it: &ComponentInteraction,
) {
    let Some((action, session_id)) = parse_component_id(&it.data.custom_id) else {
        return;
    };

    if let Err(e) = dispatch(ctx, data, it, action, session_id).await {
        match &e {
            Error::Validation { .. }
            | Error::PermissionDenied
            | Error::NotInVoice
            | Error::NotAbsent { .. }
            | Error::SessionExpired
            | Error::SessionClosed { .. } => {
                warn!(session_id, ?action, user = %it.user.name, "Rejected interaction: {e}");
            }
            _ => error!(session_id, ?action, "Component interaction failed: {e:?}"),
        }
        respond_ephemeral(ctx, it, &e.user_message()).await;
    }
}

async fn dispatch(
    ctx: &serenity::Context,
    data: &BotData,
    it: &ComponentInteraction,
    action: SessionAction,
    session_id: u64,
) -> Result<()> {
    let roles = it.member.as_ref().map(|member| role_ids(member));
    ensure_allowed(&data.config, roles.as_deref())?;
    let handle = data.sessions.get(session_id).await?;
    let mut session = handle.lock().await;

    match action {
        SessionAction::Excuse => show_picker(ctx, data, it, &mut session).await,
        SessionAction::Pick => excuse_selected(ctx, data, it, &mut session).await,
        SessionAction::Log => log_attendance(ctx, data, it, &mut session).await,
    }
}

fn updated_artifact(
    session: &AttendanceSession,
    picking: bool,
) -> Result<CreateInteractionResponse> {
    let (page, controls) = render_session(session, picking)?;
    Ok(CreateInteractionResponse::UpdateMessage(
        CreateInteractionResponseMessage::new()
            .embed(to_embed(&page))
            .components(session_rows(session.id(), &controls)),
    ))
}

async fn show_picker(
    ctx: &serenity::Context,
    data: &BotData,
    it: &ComponentInteraction,
    session: &mut AttendanceSession,
) -> Result<()> {
    session.touch(data.sessions.now())?;
    it.create_response(&ctx.http, updated_artifact(session, true)?)
        .await?;
    Ok(())
}

async fn excuse_selected(
    ctx: &serenity::Context,
    data: &BotData,
    it: &ComponentInteraction,
    session: &mut AttendanceSession,
) -> Result<()> {
    let ComponentInteractionDataKind::StringSelect { values } = &it.data.kind else {
        return Err(Error::validation("Unexpected component type."));
    };
    let member_id = values
        .first()
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or_else(|| Error::validation("No student was selected."))?;

    let message = match session.mark_excused(member_id, data.sessions.now())? {
        ExcuseOutcome::Excused { name } => {
            info!(session_id = session.id(), member = %name, "Marked absence as excused");
            format!("Marked {name} as excused.")
        }
        ExcuseOutcome::AlreadyExcused { name } => format!("{name} is already excused."),
    };

    it.create_response(&ctx.http, updated_artifact(session, false)?)
        .await?;
    send_followup(ctx, it, &message).await;
    Ok(())
}

async fn log_attendance(
    ctx: &serenity::Context,
    data: &BotData,
    it: &ComponentInteraction,
    session: &mut AttendanceSession,
) -> Result<()> {
    let now = data.sessions.now();
    session.ensure_editable(now)?;

    let occupants = {
        let directory = CacheDirectory::new(&ctx.cache, data.guild_id());
        let channel_id = directory
            .member_voice_channel(it.user.id.get())?
            .ok_or(Error::NotInVoice)?;
        directory.voice_occupants(channel_id)?
    };

    let result = session
        .commit(&data.database, it.user.id.get(), &occupants, now)
        .await;

    // The artifact reflects the terminal state either way
    it.create_response(&ctx.http, updated_artifact(session, false)?)
        .await?;

    let message = match result {
        Ok(summary) => format!(
            "Successfully logged attendance to the database! Present: {}, Absent: {} (Excused: {})",
            summary.present, summary.absent, summary.excused
        ),
        Err(e) => e.user_message(),
    };
    send_followup(ctx, it, &message).await;
    Ok(())
}

async fn send_followup(ctx: &serenity::Context, it: &ComponentInteraction, content: &str) {
    let followup = CreateInteractionResponseFollowup::new()
        .content(content)
        .ephemeral(true);
    if let Err(e) = it.create_followup(&ctx.http, followup).await {
        error!("Failed to send follow-up message: {e}");
    }
}

async fn respond_ephemeral(ctx: &serenity::Context, it: &ComponentInteraction, content: &str) {
    let response = CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    );
    if let Err(e) = it.create_response(&ctx.http, response).await {
        error!("Failed to send error response: {e}");
    }
}
