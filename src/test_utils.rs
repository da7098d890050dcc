//! Shared test utilities for `AttendanceBuddy`.
//!
//! Provides an in-memory database, a canned guild configuration, an in-memory
//! [`FakeDirectory`] standing in for the serenity cache, and a [`ManualClock`] so
//! time-based behaviour can be driven without sleeping.

use crate::{
    config::{AppConfig, settings::parse_config},
    core::{
        clock::Clock,
        directory::{GuildDirectory, Member, VoicePresence},
        ledger::NewSession,
    },
    errors::Result,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use sea_orm::DatabaseConnection;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Guild of [`test_config`]
pub const GUILD: u64 = 100;
/// Attendance channel of [`test_config`]
pub const ATTENDANCE_CHANNEL: u64 = 200;
/// Allow-listed coach role
pub const COACH_ROLE: u64 = 300;
/// "Advanced" skill-group role
pub const ADVANCED_ROLE: u64 = 401;
/// "Mechanics" skill-group role
pub const MECHANICS_ROLE: u64 = 402;
/// Role mapped to the student user type
pub const STUDENT_ROLE: u64 = 500;
/// Role mapped to the manager user type
pub const MANAGER_ROLE: u64 = 600;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Configuration with two skill groups, one coach role and the default timings.
#[allow(clippy::unwrap_used)]
pub fn test_config() -> AppConfig {
    parse_config(&format!(
        r#"
        [guild]
        guild_id = {GUILD}
        attendance_channel_id = {ATTENDANCE_CHANNEL}
        allowed_role_ids = [{COACH_ROLE}]

        [skill_groups]
        Advanced = {ADVANCED_ROLE}
        Mechanics = {MECHANICS_ROLE}

        [[user_roles]]
        role_id = {COACH_ROLE}
        user_type = "coach"

        [[user_roles]]
        role_id = {STUDENT_ROLE}
        user_type = "student"

        [[user_roles]]
        role_id = {MANAGER_ROLE}
        user_type = "manager"
        "#
    ))
    .unwrap()
}

/// Fixed instant used as t=0 in time-based tests.
#[allow(clippy::unwrap_used)]
pub fn test_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 18, 0, 0).unwrap()
}

/// Session insert with a fixed requester (id 999).
pub fn test_session(
    session_name: &str,
    skill_group: &str,
    season: i32,
    timestamp: DateTime<Utc>,
) -> NewSession {
    NewSession {
        session_name: session_name.to_string(),
        requester_id: 999,
        skill_group: skill_group.to_string(),
        season,
        timestamp,
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Clock frozen at `start`
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward
    #[allow(clippy::unwrap_used)]
    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }

    /// Jumps to an absolute instant
    #[allow(clippy::unwrap_used)]
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap() = to;
    }
}

impl Clock for ManualClock {
    #[allow(clippy::unwrap_used)]
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// In-memory guild: members, roles, channels and who sits in which voice channel.
#[derive(Debug, Default, Clone)]
pub struct FakeDirectory {
    members: BTreeMap<u64, Member>,
    roles: HashMap<u64, String>,
    channels: HashMap<u64, String>,
    voice: BTreeMap<u64, u64>,
}

impl FakeDirectory {
    /// Guild with every role and the attendance channel of `config`
    pub fn for_config(config: &AppConfig) -> Self {
        let mut directory = Self::default();
        for (name, role_id) in &config.skill_groups {
            directory.roles.insert(*role_id, name.clone());
        }
        for role_id in &config.guild.allowed_role_ids {
            directory.roles.insert(*role_id, "Coach".to_string());
        }
        for entry in &config.user_roles {
            directory
                .roles
                .entry(entry.role_id)
                .or_insert_with(|| entry.user_type.as_str().to_string());
        }
        directory
            .channels
            .insert(config.guild.attendance_channel_id, "attendance".to_string());
        directory
    }

    /// Adds a human member
    pub fn add_member(&mut self, id: u64, name: &str, role_ids: &[u64]) {
        self.members.insert(
            id,
            Member {
                id,
                display_name: name.to_string(),
                role_ids: role_ids.to_vec(),
                is_bot: false,
            },
        );
    }

    /// Adds a bot account
    pub fn add_bot(&mut self, id: u64, name: &str, role_ids: &[u64]) {
        self.add_member(id, name, role_ids);
        if let Some(member) = self.members.get_mut(&id) {
            member.is_bot = true;
        }
    }

    /// Adds a voice channel
    pub fn add_voice_channel(&mut self, id: u64, name: &str) {
        self.channels.insert(id, name.to_string());
    }

    /// Deletes a role from the guild
    pub fn remove_role(&mut self, role_id: u64) {
        self.roles.remove(&role_id);
    }

    /// Deletes a channel from the guild
    pub fn remove_channel(&mut self, channel_id: u64) {
        self.channels.remove(&channel_id);
    }

    /// Connects a member to a voice channel (moving them if already connected)
    pub fn join_voice(&mut self, member_id: u64, channel_id: u64) {
        self.voice.insert(member_id, channel_id);
    }

    /// Disconnects a member from voice
    pub fn leave_voice(&mut self, member_id: u64) {
        self.voice.remove(&member_id);
    }
}

impl GuildDirectory for FakeDirectory {
    fn members(&self) -> Result<Vec<Member>> {
        Ok(self.members.values().cloned().collect())
    }

    fn member(&self, member_id: u64) -> Result<Option<Member>> {
        Ok(self.members.get(&member_id).cloned())
    }

    fn members_with_role(&self, role_id: u64) -> Result<Vec<Member>> {
        Ok(self
            .members
            .values()
            .filter(|m| m.role_ids.contains(&role_id))
            .cloned()
            .collect())
    }

    fn voice_occupants(&self, channel_id: u64) -> Result<Vec<Member>> {
        Ok(self
            .voice
            .iter()
            .filter(|(_, channel)| **channel == channel_id)
            .filter_map(|(member_id, _)| self.members.get(member_id).cloned())
            .collect())
    }

    fn member_voice_channel(&self, member_id: u64) -> Result<Option<u64>> {
        Ok(self.voice.get(&member_id).copied())
    }

    fn voice_presences(&self) -> Result<Vec<VoicePresence>> {
        Ok(self
            .voice
            .iter()
            .filter_map(|(member_id, channel_id)| {
                let member = self.members.get(member_id)?.clone();
                Some(VoicePresence {
                    member,
                    channel_id: *channel_id,
                    channel_name: self.channels.get(channel_id).cloned().unwrap_or_default(),
                })
            })
            .collect())
    }

    fn role_name(&self, role_id: u64) -> Result<Option<String>> {
        Ok(self.roles.get(&role_id).cloned())
    }

    fn channel_name(&self, channel_id: u64) -> Result<Option<String>> {
        Ok(self.channels.get(&channel_id).cloned())
    }
}
