//! Roster Discord commands - `sync_users`.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, checks::require_allowed_role, directory::CacheDirectory},
        core::{directory::GuildDirectory, users},
        errors::{Error, Result},
    };

    /// Sync guild members with the user roster.
    ///
    /// Students and coaches are inserted or updated; roster entries that no longer
    /// qualify are flagged inactive.
    #[poise::command(slash_command, guild_only, check = "require_allowed_role")]
    pub async fn sync_users(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.defer_ephemeral().await?;
        let data = ctx.data();

        let members =
            CacheDirectory::new(ctx.serenity_context().cache.as_ref(), data.guild_id()).members()?;
        let outcome = users::sync_users(&data.database, &members, &data.config).await?;

        ctx.send(
            poise::CreateReply::default()
                .content(format!(
                    "Users synced successfully!\nAdded: {}\nUpdated: {}\nDeactivated: {}",
                    outcome.added, outcome.updated, outcome.deactivated
                ))
                .ephemeral(true),
        )
        .await?;
        Ok(())
    }
}

pub use inner::*;
