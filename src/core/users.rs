//! Roster reconciliation for `/sync_users`.
//!
//! Mirrors qualifying guild members into the `user` table. Rows are only touched when
//! something changed, so re-running on an unchanged guild is a no-op.

use crate::{
    config::{AppConfig, UserType},
    core::directory::Member,
    entities::{User, user},
    errors::Result,
};
use sea_orm::{Set, TransactionTrait, prelude::*};
use std::collections::{HashMap, HashSet};
use tracing::{info, instrument};

/// How a qualifying member should look in the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// Discord id
    pub discord_id: String,
    /// Display name
    pub name: String,
    /// Highest-priority type, always student or coach
    pub user_type: UserType,
    /// First configured skill group the member holds
    pub skill_group: Option<String>,
}

/// Row counts of one reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// New users inserted
    pub added: usize,
    /// Existing users whose fields changed (including reactivation)
    pub updated: usize,
    /// Users flagged inactive because they no longer qualify
    pub deactivated: usize,
}

/// Maps a member to its roster entry, or `None` when it does not qualify.
///
/// Bots never qualify. Among the member's configured role types the highest in
/// `role_priority` wins; only students and coaches are kept.
#[must_use]
pub fn classify(member: &Member, config: &AppConfig) -> Option<RosterEntry> {
    if member.is_bot {
        return None;
    }
    let role_types = config.user_role_types();
    let user_type = member
        .role_ids
        .iter()
        .filter_map(|role| role_types.get(role).copied())
        .max_by_key(|t| config.priority_of(*t))?;
    if !matches!(user_type, UserType::Student | UserType::Coach) {
        return None;
    }

    let skill_group = config
        .skill_groups
        .iter()
        .find(|(_, role_id)| member.role_ids.contains(role_id))
        .map(|(name, _)| name.clone());

    Some(RosterEntry {
        discord_id: member.id.to_string(),
        name: member.display_name.clone(),
        user_type,
        skill_group,
    })
}

/// Reconciles `members` into the `user` table in one transaction.
#[instrument(skip_all, fields(members = members.len()))]
pub async fn sync_users(
    db: &DatabaseConnection,
    members: &[Member],
    config: &AppConfig,
) -> Result<SyncOutcome> {
    let wanted: HashMap<String, RosterEntry> = members
        .iter()
        .filter_map(|m| classify(m, config))
        .map(|entry| (entry.discord_id.clone(), entry))
        .collect();

    let txn = db.begin().await?;
    let existing = User::find().all(&txn).await?;
    let known: HashSet<String> = existing.iter().map(|u| u.discord_id.clone()).collect();
    let mut outcome = SyncOutcome::default();

    for row in existing {
        match wanted.get(&row.discord_id) {
            Some(entry) => {
                let unchanged = row.name == entry.name
                    && row.user_type == entry.user_type.as_str()
                    && row.skill_group == entry.skill_group
                    && row.is_active;
                if unchanged {
                    continue;
                }
                let mut model: user::ActiveModel = row.into();
                model.name = Set(entry.name.clone());
                model.user_type = Set(entry.user_type.as_str().to_string());
                model.skill_group = Set(entry.skill_group.clone());
                model.is_active = Set(true);
                model.update(&txn).await?;
                outcome.updated += 1;
            }
            None if row.is_active => {
                let mut model: user::ActiveModel = row.into();
                model.is_active = Set(false);
                model.update(&txn).await?;
                outcome.deactivated += 1;
            }
            None => {}
        }
    }

    for entry in wanted.values().filter(|e| !known.contains(&e.discord_id)) {
        user::ActiveModel {
            name: Set(entry.name.clone()),
            discord_id: Set(entry.discord_id.clone()),
            user_type: Set(entry.user_type.as_str().to_string()),
            skill_group: Set(entry.skill_group.clone()),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        outcome.added += 1;
    }

    txn.commit().await?;
    info!(
        added = outcome.added,
        updated = outcome.updated,
        deactivated = outcome.deactivated,
        "User sync complete"
    );
    Ok(outcome)
}
