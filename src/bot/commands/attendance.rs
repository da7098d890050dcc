//! Attendance Discord commands - `take` and `report`.
//!
//! `/take` snapshots who is in voice and posts the interactive attendance artifact to
//! the attendance channel; the buttons on it are handled in `bot::handlers::components`.
//! `/report` pages through the absences of a season.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{
            BotData,
            checks::require_allowed_role,
            directory::CacheDirectory,
            handlers::autocomplete,
            ui::{session_rows, to_embed},
        },
        core::{
            attendance::{AbsenceSnapshot, TakeRequest, render_session},
            clock::Clock,
            report::{self, ReportGranularity},
        },
        errors::{Error, Result},
    };
    use poise::serenity_prelude as serenity;
    use tracing::info;

    /// Report lookback offered to `/report`
    #[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
    pub enum Granularity {
        #[name = "Daily"]
        Daily,
        #[name = "Weekly"]
        Weekly,
    }

    impl From<Granularity> for ReportGranularity {
        fn from(value: Granularity) -> Self {
            match value {
                Granularity::Daily => Self::Daily,
                Granularity::Weekly => Self::Weekly,
            }
        }
    }

    /// Take attendance for the voice channel you are in.
    ///
    /// Everyone holding the skill group's role(s) is checked against your current voice
    /// channel. The result is posted to the attendance channel with controls to mark
    /// excused absences and to log the session.
    #[poise::command(slash_command, guild_only, check = "require_allowed_role")]
    pub async fn take(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Name of the session (e.g. Agent Masterclass)"] session_name: String,
        #[description = "Skill group to track"]
        #[autocomplete = "autocomplete::autocomplete_skill_group"]
        skill_group: String,
        #[description = "Season number"]
        #[min = 1]
        season: i32,
    ) -> Result<()> {
        ctx.defer_ephemeral().await?;
        let data = ctx.data();

        let request = TakeRequest {
            session_name,
            skill_group,
            season,
            requester_id: ctx.author().id.get(),
        };
        let snapshot = {
            let cache = ctx.serenity_context().cache.as_ref();
            let directory = CacheDirectory::new(cache, data.guild_id());
            AbsenceSnapshot::take(&request, &directory, &data.config, data.sessions.now())?
        };
        info!(
            session = snapshot.session_name(),
            group = snapshot.skill_group(),
            season,
            absent = snapshot.absent().len(),
            "Attendance taken"
        );

        let session = data.sessions.open(snapshot).await;
        let (session_id, message) = {
            let session = session.lock().await;
            let (page, controls) = render_session(&session, false)?;
            let message = serenity::CreateMessage::new()
                .embed(to_embed(&page))
                .components(session_rows(session.id(), &controls));
            (session.id(), message)
        };

        let channel = serenity::ChannelId::new(data.config.guild.attendance_channel_id);
        if let Err(e) = channel.send_message(ctx.http(), message).await {
            data.sessions.remove(session_id).await;
            return Err(e.into());
        }

        ctx.send(
            poise::CreateReply::default()
                .content(format!("Attendance taken! Check <#{channel}> to review and log it."))
                .ephemeral(true),
        )
        .await?;
        Ok(())
    }

    /// Generate an attendance report for the specified period.
    ///
    /// Lists every session with absences in the window, grouped by date, session name
    /// and skill group, with excused and unexcused absentees.
    #[poise::command(slash_command, guild_only, check = "require_allowed_role")]
    pub async fn report(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Report period"] granularity: Granularity,
        #[description = "Season number"]
        #[min = 1]
        season: i32,
    ) -> Result<()> {
        ctx.defer().await?;
        let data = ctx.data();
        let cache = ctx.serenity_context().cache.as_ref();
        let directory = CacheDirectory::new(cache, data.guild_id());

        let pages = report::generate_report(
            &data.database,
            &directory,
            season,
            granularity.into(),
            data.clock.now(),
        )
        .await?;

        for page in &pages {
            ctx.send(poise::CreateReply::default().embed(to_embed(page)))
                .await?;
        }
        Ok(())
    }
}

pub use inner::*;
