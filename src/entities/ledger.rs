//! Ledger entity - Per-member, per-session attendance record.
//!
//! Invariant: `is_excused` implies `!is_present`. Entries are inserted in one batch when a
//! session is committed and are never updated.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ledger database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ledger")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Session this entry belongs to
    pub session_id: i64,
    /// Discord user ID of the tracked member
    pub student_id: String,
    /// In voice when the session was logged
    pub is_present: bool,
    /// Absence marked as excused; always false when `is_present`
    pub is_excused: bool,
    /// Time the entry was logged (same as the session's `created_date`)
    pub event_date: DateTimeUtc,
}

/// Defines relationships between Ledger and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each entry belongs to one session
    #[sea_orm(
        belongs_to = "super::session::Entity",
        from = "Column::SessionId",
        to = "super::session::Column::Id"
    )]
    Session,
}

impl Related<super::session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
