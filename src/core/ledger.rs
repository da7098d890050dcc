//! Ledger Store - durable session and attendance rows.
//!
//! A session row and all of its ledger entries are written in one database transaction:
//! either every row lands or none does. Reads for reports return absence rows already
//! grouped per (date, session name, skill group).

use crate::{
    entities::{Ledger, Session, ledger, session},
    errors::Result,
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{DatabaseTransaction, QueryOrder, Set, TransactionTrait, prelude::*};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Session row to insert.
#[derive(Debug, Clone)]
pub struct NewSession {
    /// Session name given by the coach
    pub session_name: String,
    /// Discord id of the committer
    pub requester_id: u64,
    /// Skill group name
    pub skill_group: String,
    /// Season number
    pub season: i32,
    /// Commit time, used for the session and all its entries
    pub timestamp: DateTime<Utc>,
}

/// Ledger entry to insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewLedgerEntry {
    /// Discord id of the tracked member
    pub student_id: u64,
    /// Present at commit time
    pub is_present: bool,
    /// Absence marked as excused; never set together with `is_present`
    pub is_excused: bool,
}

/// Inserts a session and its ledger entries atomically.
///
/// Any failure rolls the transaction back before the error is returned, so a failed call
/// leaves no partial rows behind.
#[instrument(skip(db, entries), fields(session = %new_session.session_name, entries = entries.len()))]
pub async fn record_attendance(
    db: &DatabaseConnection,
    new_session: NewSession,
    entries: &[NewLedgerEntry],
) -> Result<session::Model> {
    let txn = db.begin().await?;
    match insert_rows(&txn, new_session, entries).await {
        Ok(session_row) => {
            txn.commit().await?;
            debug!(session_id = session_row.id, "Attendance committed");
            Ok(session_row)
        }
        Err(e) => {
            txn.rollback().await?;
            Err(e)
        }
    }
}

async fn insert_rows(
    txn: &DatabaseTransaction,
    new_session: NewSession,
    entries: &[NewLedgerEntry],
) -> Result<session::Model> {
    let session_row = session::ActiveModel {
        session_name: Set(new_session.session_name),
        requester_id: Set(new_session.requester_id.to_string()),
        skill_group: Set(new_session.skill_group),
        season: Set(new_session.season),
        created_date: Set(new_session.timestamp),
        modified_date: Set(new_session.timestamp),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    if !entries.is_empty() {
        let rows = entries.iter().map(|entry| ledger::ActiveModel {
            session_id: Set(session_row.id),
            student_id: Set(entry.student_id.to_string()),
            is_present: Set(entry.is_present),
            is_excused: Set(entry.is_excused && !entry.is_present),
            event_date: Set(new_session.timestamp),
            ..Default::default()
        });
        Ledger::insert_many(rows).exec(txn).await?;
    }
    Ok(session_row)
}

/// Retrieves all ledger entries of a session, ordered by student id.
pub async fn get_entries_for_session(
    db: &DatabaseConnection,
    session_id: i64,
) -> Result<Vec<ledger::Model>> {
    Ledger::find()
        .filter(ledger::Column::SessionId.eq(session_id))
        .order_by_asc(ledger::Column::StudentId)
        .all(db)
        .await
        .map_err(Into::into)
}

/// One absent member within a report group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Absentee {
    /// Discord id of the absent member
    pub student_id: String,
    /// Whether the absence was excused
    pub is_excused: bool,
}

/// Absences of all sessions sharing a date, name and skill group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbsenceGroup {
    /// Day the sessions were logged (UTC)
    pub date: NaiveDate,
    /// Session name
    pub session_name: String,
    /// Skill group name
    pub skill_group: String,
    /// Distinct absent members
    pub total_absences: usize,
    /// Distinct absent members whose absence was excused
    pub excused_absences: usize,
    /// Absent members ordered by id
    pub absentees: Vec<Absentee>,
}

/// Queries absence entries of `season` logged at or after `since`.
///
/// Groups are ordered by date (newest first), then session name. Only sessions with at
/// least one absence produce a group. A member absent from several sessions of the same
/// group is counted once, as excused if any of those absences was excused.
#[instrument(skip(db))]
pub async fn query_absences(
    db: &DatabaseConnection,
    season: i32,
    since: DateTime<Utc>,
) -> Result<Vec<AbsenceGroup>> {
    let sessions = Session::find()
        .filter(session::Column::Season.eq(season))
        .filter(session::Column::CreatedDate.gte(since))
        .all(db)
        .await?;
    if sessions.is_empty() {
        return Ok(Vec::new());
    }

    let session_ids: Vec<i64> = sessions.iter().map(|s| s.id).collect();
    let absences = Ledger::find()
        .filter(ledger::Column::SessionId.is_in(session_ids))
        .filter(ledger::Column::IsPresent.eq(false))
        .all(db)
        .await?;

    let sessions_by_id: BTreeMap<i64, &session::Model> =
        sessions.iter().map(|s| (s.id, s)).collect();

    let mut grouped: BTreeMap<(Reverse<NaiveDate>, String, String), BTreeMap<String, bool>> =
        BTreeMap::new();
    for entry in absences {
        let Some(session) = sessions_by_id.get(&entry.session_id) else {
            continue;
        };
        let key = (
            Reverse(session.created_date.date_naive()),
            session.session_name.clone(),
            session.skill_group.clone(),
        );
        let excused = grouped
            .entry(key)
            .or_default()
            .entry(entry.student_id)
            .or_insert(false);
        *excused |= entry.is_excused;
    }

    Ok(grouped
        .into_iter()
        .map(|((Reverse(date), session_name, skill_group), students)| {
            let absentees: Vec<Absentee> = students
                .into_iter()
                .map(|(student_id, is_excused)| Absentee {
                    student_id,
                    is_excused,
                })
                .collect();
            AbsenceGroup {
                date,
                session_name,
                skill_group,
                total_absences: absentees.len(),
                excused_absences: absentees.iter().filter(|a| a.is_excused).count(),
                absentees,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use chrono::{Duration, TimeZone};
    use sea_orm::{ConnectionTrait, PaginatorTrait};

    fn entry(student_id: u64, is_present: bool, is_excused: bool) -> NewLedgerEntry {
        NewLedgerEntry {
            student_id,
            is_present,
            is_excused,
        }
    }

    #[tokio::test]
    async fn test_record_attendance_writes_session_and_entries() -> Result<()> {
        let db = setup_test_db().await?;
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 18, 0, 0).unwrap();

        let session = record_attendance(
            &db,
            test_session("Agent Masterclass", "Advanced", 2, at),
            &[entry(1, true, false), entry(2, false, true), entry(3, false, false)],
        )
        .await?;

        assert_eq!(session.session_name, "Agent Masterclass");
        assert_eq!(session.requester_id, "999");
        assert_eq!(session.created_date, at);

        let entries = get_entries_for_session(&db, session.id).await?;
        assert_eq!(entries.len(), 3);
        assert!(entries[0].is_present && !entries[0].is_excused);
        assert!(!entries[1].is_present && entries[1].is_excused);
        assert!(!entries[2].is_present && !entries[2].is_excused);
        assert!(entries.iter().all(|e| e.event_date == at));

        Ok(())
    }

    #[tokio::test]
    async fn test_record_attendance_never_stores_present_and_excused() -> Result<()> {
        let db = setup_test_db().await?;
        let session = record_attendance(
            &db,
            test_session("Drills", "Mechanics", 1, Utc::now()),
            &[entry(7, true, true)],
        )
        .await?;

        let entries = get_entries_for_session(&db, session.id).await?;
        assert!(entries[0].is_present);
        assert!(!entries[0].is_excused);
        Ok(())
    }

    #[tokio::test]
    async fn test_record_attendance_rolls_back_on_failure() -> Result<()> {
        let db = setup_test_db().await?;
        db.execute_unprepared("DROP TABLE ledger").await?;

        let result = record_attendance(
            &db,
            test_session("Drills", "Mechanics", 1, Utc::now()),
            &[entry(1, true, false)],
        )
        .await;
        assert!(result.is_err());

        // The session insert must have been rolled back with the failed entries
        assert_eq!(Session::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_query_absences_groups_and_orders() -> Result<()> {
        let db = setup_test_db().await?;
        let day1 = Utc.with_ymd_and_hms(2025, 3, 1, 18, 0, 0).unwrap();
        let day2 = day1 + Duration::days(1);

        record_attendance(
            &db,
            test_session("Scrims", "Advanced", 3, day1),
            &[entry(1, false, false), entry(2, true, false)],
        )
        .await?;
        record_attendance(
            &db,
            test_session("Aim Lab", "Mechanics", 3, day2),
            &[entry(3, false, true), entry(4, false, false)],
        )
        .await?;
        // Same name and group on the same day merges into one group
        record_attendance(
            &db,
            test_session("Aim Lab", "Mechanics", 3, day2 + Duration::hours(1)),
            &[entry(3, false, false), entry(5, false, false)],
        )
        .await?;
        // Other season is ignored
        record_attendance(
            &db,
            test_session("Scrims", "Advanced", 2, day2),
            &[entry(9, false, false)],
        )
        .await?;

        let groups = query_absences(&db, 3, day1 - Duration::days(1)).await?;
        assert_eq!(groups.len(), 2);

        assert_eq!(groups[0].session_name, "Aim Lab");
        assert_eq!(groups[0].date, day2.date_naive());
        assert_eq!(groups[0].total_absences, 3);
        assert_eq!(groups[0].excused_absences, 1);
        assert_eq!(
            groups[0].absentees[0],
            Absentee {
                student_id: "3".to_string(),
                is_excused: true
            }
        );

        assert_eq!(groups[1].session_name, "Scrims");
        assert_eq!(groups[1].total_absences, 1);
        assert_eq!(groups[1].excused_absences, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_query_absences_respects_window() -> Result<()> {
        let db = setup_test_db().await?;
        let old = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        record_attendance(
            &db,
            test_session("Scrims", "Advanced", 1, old),
            &[entry(1, false, false)],
        )
        .await?;

        let groups = query_absences(&db, 1, old + Duration::days(2)).await?;
        assert!(groups.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_query_absences_skips_fully_present_sessions() -> Result<()> {
        let db = setup_test_db().await?;
        let at = Utc::now();
        record_attendance(
            &db,
            test_session("Scrims", "Advanced", 1, at),
            &[entry(1, true, false), entry(2, true, false)],
        )
        .await?;

        let groups = query_absences(&db, 1, at - Duration::days(1)).await?;
        assert!(groups.is_empty());
        Ok(())
    }
}
