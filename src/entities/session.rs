//! Session entity - One row per committed "take attendance" invocation.
//!
//! Sessions are written once, inside the same database transaction as their ledger
//! entries, and never modified afterwards.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Session database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "session")]
pub struct Model {
    /// Unique identifier for the session
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Name given by the coach (e.g., "Agent Masterclass")
    pub session_name: String,
    /// Discord user ID of the coach who logged the session
    pub requester_id: String,
    /// Skill group the attendance was taken for (e.g., "Advanced", "Combined")
    pub skill_group: String,
    /// Season number
    pub season: i32,
    /// When the session was logged
    pub created_date: DateTimeUtc,
    /// Kept equal to `created_date`; sessions are immutable
    pub modified_date: DateTimeUtc,
}

/// Defines relationships between Session and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One session has many ledger entries
    #[sea_orm(has_many = "super::ledger::Entity")]
    Ledger,
}

impl Related<super::ledger::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ledger.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
