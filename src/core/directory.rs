//! Guild Directory - read-only view over members, roles and voice state.
//!
//! The workflow, scheduler and reconciliation code only see the guild through
//! [`GuildDirectory`]. Production uses the serenity cache adapter in
//! `bot::directory`; tests use `test_utils::FakeDirectory`.

use crate::errors::Result;

/// A guild member as seen by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Discord user id
    pub id: u64,
    /// Nickname or username
    pub display_name: String,
    /// Roles the member holds
    pub role_ids: Vec<u64>,
    /// Whether the account is a bot
    pub is_bot: bool,
}

impl Member {
    /// Whether the member holds any of `role_ids`
    #[must_use]
    pub fn has_any_role(&self, role_ids: &[u64]) -> bool {
        self.role_ids.iter().any(|role| role_ids.contains(role))
    }
}

/// A member currently connected to a voice channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoicePresence {
    /// The connected member
    pub member: Member,
    /// Voice channel id
    pub channel_id: u64,
    /// Voice channel name, for messages
    pub channel_name: String,
}

/// Read-only access to the configured guild.
///
/// Lookups of a guild, role or channel that does not exist fail with
/// `Error::Validation`.
pub trait GuildDirectory {
    /// Every cached member of the guild
    fn members(&self) -> Result<Vec<Member>>;

    /// A single member, if cached
    fn member(&self, member_id: u64) -> Result<Option<Member>>;

    /// Members holding `role_id`
    fn members_with_role(&self, role_id: u64) -> Result<Vec<Member>>;

    /// Members connected to voice channel `channel_id`
    fn voice_occupants(&self, channel_id: u64) -> Result<Vec<Member>>;

    /// Voice channel the member is connected to, if any
    fn member_voice_channel(&self, member_id: u64) -> Result<Option<u64>>;

    /// Every member connected to any voice channel of the guild
    fn voice_presences(&self) -> Result<Vec<VoicePresence>>;

    /// Name of a role, `None` if the role does not exist
    fn role_name(&self, role_id: u64) -> Result<Option<String>>;

    /// Name of a channel, `None` if the channel does not exist
    fn channel_name(&self, channel_id: u64) -> Result<Option<String>>;
}
