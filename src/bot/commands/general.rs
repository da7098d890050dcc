//! General Discord commands - ping and help.
//! These commands don't touch the database or the guild cache.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        errors::{Error, Result},
    };

    /// Responds with "Pong!" to test bot connectivity.
    #[poise::command(slash_command)]
    pub async fn ping(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say("Pong!").await?;
        Ok(())
    }

    /// Displays help information about available commands.
    #[poise::command(slash_command)]
    pub async fn help(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let groups = ctx.data().config.skill_group_choices().join(", ");
        let help_text = format!(
            "**AttendanceBuddy Help**\n\
            Here is a summary of all available commands.\n\n\
            **Attendance Commands**\n\
            • `/take <session_name> <skill_group> <season>` - Takes attendance for your voice channel and posts it for review.\n\
            • `/report <Daily|Weekly> <season>` - Lists absences for the last day or week.\n\n\
            **Roster Commands**\n\
            • `/sync_users` - Syncs students and coaches from guild roles.\n\n\
            **Utility Commands**\n\
            • `/ping` - Checks if the bot is responsive.\n\
            • `/help` - Shows this help message.\n\n\
            Skill groups: {groups}"
        );

        ctx.say(help_text).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
