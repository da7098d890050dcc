//! User entity - Guild roster mirrored by `/sync_users`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name at the time of the last sync
    pub name: String,
    /// Discord user ID
    #[sea_orm(unique)]
    pub discord_id: String,
    /// `"student"` or `"coach"`
    pub user_type: String,
    /// Skill group derived from roles, if any
    pub skill_group: Option<String>,
    /// False once the member stops qualifying (left the guild or lost the role)
    pub is_active: bool,
}

/// `User` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
