/// Database configuration and connection management
pub mod database;

/// Guild configuration loading from config.toml
pub mod settings;

pub use settings::{AppConfig, COMBINED_GROUP, ResolvedGroup, UserType, load_default_config};
