//! Guild configuration loading from config.toml
//!
//! The bot serves exactly one guild. Everything guild-specific (channel and role ids,
//! skill-group roles, reminder timings) lives in a TOML file that is deserialized into
//! [`AppConfig`] and handed to the components that need it.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

/// Name of the synthetic skill group that unions every configured group.
pub const COMBINED_GROUP: &str = "Combined";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Lowest to highest priority; decides a member's type when several roles match
    #[serde(default = "default_role_priority")]
    pub role_priority: Vec<UserType>,
    /// Guild wiring
    pub guild: GuildSettings,
    /// Skill-group name to role id
    pub skill_groups: BTreeMap<String, u64>,
    /// Role id to user type, used by `/sync_users`
    #[serde(default)]
    pub user_roles: Vec<UserRoleConfig>,
    /// Reminder scheduler timings
    #[serde(default)]
    pub reminder: ReminderSettings,
    /// Attendance workflow timings
    #[serde(default)]
    pub attendance: AttendanceSettings,
}

/// The single guild the bot serves
#[derive(Debug, Clone, Deserialize)]
pub struct GuildSettings {
    /// Guild id
    pub guild_id: u64,
    /// Channel where attendance artifacts and reminders are posted
    pub attendance_channel_id: u64,
    /// Roles allowed to run commands; also the roles watched for reminders
    pub allowed_role_ids: Vec<u64>,
}

/// Maps a Discord role to a roster user type
#[derive(Debug, Clone, Deserialize)]
pub struct UserRoleConfig {
    /// Discord role id
    pub role_id: u64,
    /// Type granted by the role
    pub user_type: UserType,
}

/// Roster user types known to the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    /// Tracked attendee
    Student,
    /// Graduate continuing in the program
    Graduate,
    /// Community manager
    Manager,
    /// Guild admin
    Admin,
    /// Session coach
    Coach,
}

impl UserType {
    /// Value stored in the `user.user_type` column
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Graduate => "graduate",
            Self::Manager => "manager",
            Self::Admin => "admin",
            Self::Coach => "coach",
        }
    }
}

fn default_role_priority() -> Vec<UserType> {
    vec![
        UserType::Student,
        UserType::Graduate,
        UserType::Manager,
        UserType::Admin,
        UserType::Coach,
    ]
}

/// Reminder scheduler timings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReminderSettings {
    /// Seconds between occupancy scans
    pub check_interval_secs: u64,
    /// Seconds of continuous voice presence before a reminder is sent
    pub threshold_secs: u64,
    /// Hours between cooldown resets
    pub epoch_hours: u64,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            check_interval_secs: 30,
            threshold_secs: 300,
            epoch_hours: 24,
        }
    }
}

impl ReminderSettings {
    /// Period of the occupancy scan
    #[must_use]
    pub const fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Period of the cooldown reset
    #[must_use]
    pub const fn epoch(&self) -> Duration {
        Duration::from_secs(self.epoch_hours.saturating_mul(60 * 60))
    }

    /// Presence needed before reminding
    #[must_use]
    pub fn threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.threshold_secs).unwrap_or(i64::MAX))
    }
}

/// Attendance workflow timings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AttendanceSettings {
    /// Idle seconds after which an attendance artifact stops accepting clicks
    pub session_timeout_secs: u64,
}

impl Default for AttendanceSettings {
    fn default() -> Self {
        Self {
            session_timeout_secs: 300,
        }
    }
}

impl AttendanceSettings {
    /// Idle expiry of an attendance session
    #[must_use]
    pub fn session_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.session_timeout_secs).unwrap_or(i64::MAX))
    }
}

/// A skill group resolved against the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedGroup {
    /// Name stored in the ledger (`"Advanced"`, `"Combined"`, ...)
    pub name: String,
    /// Role ids whose holders are tracked
    pub role_ids: Vec<u64>,
}

impl AppConfig {
    /// Checks cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.skill_groups.is_empty() {
            return Err(config_error("at least one skill group must be configured"));
        }
        if self
            .skill_groups
            .keys()
            .any(|name| name.eq_ignore_ascii_case(COMBINED_GROUP))
        {
            return Err(config_error(
                "'Combined' is reserved for the union of all skill groups",
            ));
        }
        if self.guild.allowed_role_ids.is_empty() {
            return Err(config_error("allowed_role_ids must not be empty"));
        }
        if self.reminder.check_interval_secs == 0
            || self.reminder.threshold_secs == 0
            || self.reminder.epoch_hours == 0
        {
            return Err(config_error("reminder intervals must be positive"));
        }
        if self.attendance.session_timeout_secs == 0 {
            return Err(config_error("session_timeout_secs must be positive"));
        }
        Ok(())
    }

    /// Whether any of `role_ids` is on the command allow-list.
    #[must_use]
    pub fn is_allowed(&self, role_ids: &[u64]) -> bool {
        role_ids
            .iter()
            .any(|role| self.guild.allowed_role_ids.contains(role))
    }

    /// Skill-group names offered to `/take`, including `Combined`.
    #[must_use]
    pub fn skill_group_choices(&self) -> Vec<String> {
        self.skill_groups
            .keys()
            .cloned()
            .chain(std::iter::once(COMBINED_GROUP.to_string()))
            .collect()
    }

    /// Resolves a skill-group name (case-insensitive) to the roles it tracks.
    pub fn resolve_skill_group(&self, name: &str) -> Result<ResolvedGroup> {
        let name = name.trim();
        if name.eq_ignore_ascii_case(COMBINED_GROUP) {
            return Ok(ResolvedGroup {
                name: COMBINED_GROUP.to_string(),
                role_ids: self.skill_groups.values().copied().collect(),
            });
        }
        self.skill_groups
            .iter()
            .find(|(group, _)| group.eq_ignore_ascii_case(name))
            .map(|(group, role_id)| ResolvedGroup {
                name: group.clone(),
                role_ids: vec![*role_id],
            })
            .ok_or_else(|| {
                Error::validation(format!(
                    "Unknown skill group '{name}'. Choose one of: {}",
                    self.skill_group_choices().join(", ")
                ))
            })
    }

    /// Role id to user type lookup table
    #[must_use]
    pub fn user_role_types(&self) -> HashMap<u64, UserType> {
        self.user_roles
            .iter()
            .map(|entry| (entry.role_id, entry.user_type))
            .collect()
    }

    /// Position of `user_type` in `role_priority` (unlisted types rank lowest).
    #[must_use]
    pub fn priority_of(&self, user_type: UserType) -> Option<usize> {
        self.role_priority.iter().position(|t| *t == user_type)
    }
}

fn config_error(message: &str) -> Error {
    Error::Config {
        message: message.to_string(),
    }
}

/// Parses and validates configuration from TOML text
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing or inconsistent
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;
    parse_config(&contents)
}

/// Loads configuration from `CONFIG_PATH`, or ./config.toml when unset
pub fn load_default_config() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    tracing::debug!("Loading configuration from {path}");
    load_config(path)
}
