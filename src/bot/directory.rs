//! Serenity cache adapter for [`GuildDirectory`].
//!
//! Every call takes a fresh guild reference from the cache and returns owned data, so
//! no cache guard ever lives across an `.await`.

use crate::{
    core::directory::{GuildDirectory, Member, VoicePresence},
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;

/// Converts a cached serenity member into the core representation
pub fn to_member(member: &serenity::Member) -> Member {
    Member {
        id: member.user.id.get(),
        display_name: member.display_name().to_string(),
        role_ids: member.roles.iter().map(|role| role.get()).collect(),
        is_bot: member.user.bot,
    }
}

/// Read-only view of one guild in the serenity cache.
pub struct CacheDirectory<'a> {
    cache: &'a serenity::Cache,
    guild_id: serenity::GuildId,
}

impl<'a> CacheDirectory<'a> {
    /// View of `guild_id` in `cache`
    pub const fn new(cache: &'a serenity::Cache, guild_id: serenity::GuildId) -> Self {
        Self { cache, guild_id }
    }

    fn with_guild<T>(&self, f: impl FnOnce(&serenity::Guild) -> T) -> Result<T> {
        let guild = self.cache.guild(self.guild_id).ok_or_else(|| {
            Error::validation(format!("Guild {} is not available.", self.guild_id))
        })?;
        Ok(f(&guild))
    }
}

impl GuildDirectory for CacheDirectory<'_> {
    fn members(&self) -> Result<Vec<Member>> {
        self.with_guild(|guild| guild.members.values().map(to_member).collect())
    }

    fn member(&self, member_id: u64) -> Result<Option<Member>> {
        self.with_guild(|guild| {
            guild
                .members
                .get(&serenity::UserId::new(member_id))
                .map(to_member)
        })
    }

    fn members_with_role(&self, role_id: u64) -> Result<Vec<Member>> {
        let role = serenity::RoleId::new(role_id);
        self.with_guild(|guild| {
            guild
                .members
                .values()
                .filter(|m| m.roles.contains(&role))
                .map(to_member)
                .collect()
        })
    }

    fn voice_occupants(&self, channel_id: u64) -> Result<Vec<Member>> {
        let channel = serenity::ChannelId::new(channel_id);
        self.with_guild(|guild| {
            guild
                .voice_states
                .values()
                .filter(|state| state.channel_id == Some(channel))
                .filter_map(|state| guild.members.get(&state.user_id))
                .map(to_member)
                .collect()
        })
    }

    fn member_voice_channel(&self, member_id: u64) -> Result<Option<u64>> {
        self.with_guild(|guild| {
            guild
                .voice_states
                .get(&serenity::UserId::new(member_id))
                .and_then(|state| state.channel_id)
                .map(serenity::ChannelId::get)
        })
    }

    fn voice_presences(&self) -> Result<Vec<VoicePresence>> {
        self.with_guild(|guild| {
            guild
                .voice_states
                .values()
                .filter_map(|state| {
                    let channel_id = state.channel_id?;
                    let member = guild.members.get(&state.user_id)?;
                    let channel_name = guild
                        .channels
                        .get(&channel_id)
                        .map_or_else(|| format!("Channel {channel_id}"), |c| c.name.clone());
                    Some(VoicePresence {
                        member: to_member(member),
                        channel_id: channel_id.get(),
                        channel_name,
                    })
                })
                .collect()
        })
    }

    fn role_name(&self, role_id: u64) -> Result<Option<String>> {
        self.with_guild(|guild| {
            guild
                .roles
                .get(&serenity::RoleId::new(role_id))
                .map(|role| role.name.clone())
        })
    }

    fn channel_name(&self, channel_id: u64) -> Result<Option<String>> {
        self.with_guild(|guild| {
            guild
                .channels
                .get(&serenity::ChannelId::new(channel_id))
                .map(|channel| channel.name.clone())
        })
    }
}
