//! Unified error type for the attendance bot.
//!
//! Every failure in the crate funnels into [`Error`]. The user-facing variants
//! (`Validation`, `PermissionDenied`, `NotInVoice`, `NotAbsent`, `SessionExpired`,
//! `SessionClosed`, `Persistence`) carry a terse message meant for Discord, while the
//! infrastructure variants are logged and replaced by a generic retry message.

use thiserror::Error;

/// All errors produced by the attendance bot.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {message}")]
    Config {
        /// What was wrong with the configuration
        message: String,
    },

    /// Bad or missing input (unknown skill group, missing role or channel)
    #[error("{message}")]
    Validation {
        /// Message shown to the caller
        message: String,
    },

    /// The caller does not hold any allow-listed role
    #[error("You don't have permission to use this command!")]
    PermissionDenied,

    /// The caller must be in a voice channel for this operation
    #[error("You're not in a voice channel!")]
    NotInVoice,

    /// The selected member is not on the snapshot's absence list
    #[error("{member} is not on the absence list for this session.")]
    NotAbsent {
        /// Display name (or id) of the member
        member: String,
    },

    /// The attendance session idled out or is unknown to this process
    #[error("This attendance session has expired. Run /take again to start a new one.")]
    SessionExpired,

    /// The attendance session already reached a terminal state
    #[error("Attendance for this session was already {state}. Run /take again to start a new one.")]
    SessionClosed {
        /// Terminal state name ("logged" or "abandoned after a failed save")
        state: &'static str,
    },

    /// Writing the attendance ledger failed and was rolled back
    #[error("Failed to log attendance to the database. Please run /take again or contact an administrator.")]
    Persistence {
        /// Underlying storage error, for logs
        message: String,
    },

    /// Raw database error outside the ledger commit path
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Missing or unreadable environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Formatting into a `String` failed
    #[error("Formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),

    /// Serenity/Poise framework error
    #[error("Serenity/Poise framework error: {0}")]
    Framework(Box<poise::serenity_prelude::Error>),
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::Framework(Box::new(value))
    }
}

impl Error {
    /// Builds a [`Error::Validation`] from anything printable.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Text shown to the Discord user for this error.
    ///
    /// Caller-facing errors are shown verbatim; infrastructure errors are replaced by a
    /// generic message so internals never leak into the channel.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { .. }
            | Self::PermissionDenied
            | Self::NotInVoice
            | Self::NotAbsent { .. }
            | Self::SessionExpired
            | Self::SessionClosed { .. }
            | Self::Persistence { .. } => self.to_string(),
            Self::Config { .. }
            | Self::Database(_)
            | Self::EnvVar(_)
            | Self::Fmt(_)
            | Self::Framework(_) => {
                "An error occurred while processing the command. Please try again.".to_string()
            }
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
