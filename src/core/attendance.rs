//! Attendance session workflow.
//!
//! `/take` builds an [`AbsenceSnapshot`] of who holds the tracked roles and who is in the
//! requester's voice channel. The snapshot lives in an [`AttendanceSession`] that moves
//! through `Editable -> Committed` (or `Editable -> Failed`): coaches mark excused
//! absences while it is editable, and a single commit writes the session and its ledger
//! entries. Every interaction goes through [`SessionRegistry`], which hands out the
//! session behind a mutex so state checks and transitions never interleave.
//!
//! The Discord artifact is a pure projection of the session, see [`render_session`].

use crate::{
    config::{AppConfig, COMBINED_GROUP},
    core::{
        clock::Clock,
        directory::{GuildDirectory, Member},
        display::{DisplayField, DisplayPage, Tone},
        ledger::{self, NewLedgerEntry, NewSession},
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::DatabaseConnection;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Select menus accept at most this many options.
pub const MAX_PICKER_OPTIONS: usize = 25;

/// Arguments of `/take`.
#[derive(Debug, Clone)]
pub struct TakeRequest {
    /// Session name (e.g. "Agent Masterclass")
    pub session_name: String,
    /// Skill-group name as typed by the coach
    pub skill_group: String,
    /// Season number
    pub season: i32,
    /// Discord id of the coach
    pub requester_id: u64,
}

/// Who was tracked, present and absent when attendance was taken.
///
/// Invariants: `present ∩ absent = ∅`, `present ∪ absent = tracked`,
/// `excused ⊆ absent`. Only [`AbsenceSnapshot::mark_excused`] mutates it.
#[derive(Debug, Clone)]
pub struct AbsenceSnapshot {
    session_name: String,
    skill_group: String,
    role_label: String,
    season: i32,
    channel_name: String,
    requester_name: String,
    taken_at: DateTime<Utc>,
    tracked: BTreeMap<u64, String>,
    present: BTreeSet<u64>,
    absent: Vec<u64>,
    excused: BTreeSet<u64>,
}

/// Result of marking an absence as excused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExcuseOutcome {
    /// The member was newly excused
    Excused {
        /// Display name of the member
        name: String,
    },
    /// The member was already excused; nothing changed
    AlreadyExcused {
        /// Display name of the member
        name: String,
    },
}

impl AbsenceSnapshot {
    /// Builds a snapshot for `request` from the live directory.
    ///
    /// Fails with `NotInVoice` if the requester is not connected to voice, and with
    /// `Validation` if the skill group, its roles or the attendance channel are missing.
    pub fn take<D: GuildDirectory + ?Sized>(
        request: &TakeRequest,
        directory: &D,
        config: &AppConfig,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let session_name = request.session_name.trim();
        if session_name.is_empty() {
            return Err(Error::validation("Session name cannot be empty."));
        }
        let group = config.resolve_skill_group(&request.skill_group)?;

        let channel_id = directory
            .member_voice_channel(request.requester_id)?
            .ok_or(Error::NotInVoice)?;

        if directory
            .channel_name(config.guild.attendance_channel_id)?
            .is_none()
        {
            return Err(Error::validation("Could not find the attendance channel!"));
        }

        let mut role_names = Vec::with_capacity(group.role_ids.len());
        for role_id in &group.role_ids {
            let name = directory.role_name(*role_id)?.ok_or_else(|| {
                Error::validation("Could not find the role(s) to track attendance for!")
            })?;
            role_names.push(name);
        }
        let role_label = if group.name == COMBINED_GROUP {
            let names: Vec<&str> = config.skill_groups.keys().map(String::as_str).collect();
            format!("{} {COMBINED_GROUP}", names.join("/"))
        } else {
            role_names.join("/")
        };

        let mut tracked = BTreeMap::new();
        for role_id in &group.role_ids {
            for member in directory.members_with_role(*role_id)? {
                if !member.is_bot {
                    tracked.insert(member.id, member.display_name);
                }
            }
        }

        let occupants: BTreeSet<u64> = directory
            .voice_occupants(channel_id)?
            .into_iter()
            .map(|m| m.id)
            .collect();
        let present: BTreeSet<u64> = tracked
            .keys()
            .filter(|id| occupants.contains(*id))
            .copied()
            .collect();
        let mut absent: Vec<u64> = tracked
            .keys()
            .filter(|id| !present.contains(*id))
            .copied()
            .collect();
        absent.sort_by(|a, b| {
            let name_a = tracked.get(a).map(|n| n.to_lowercase());
            let name_b = tracked.get(b).map(|n| n.to_lowercase());
            name_a.cmp(&name_b).then(a.cmp(b))
        });

        let channel_name = directory
            .channel_name(channel_id)?
            .unwrap_or_else(|| format!("Channel {channel_id}"));
        let requester_name = directory
            .member(request.requester_id)?
            .map_or_else(|| format!("User {}", request.requester_id), |m| m.display_name);

        Ok(Self {
            session_name: session_name.to_string(),
            skill_group: group.name,
            role_label,
            season: request.season,
            channel_name,
            requester_name,
            taken_at: now,
            tracked,
            present,
            absent,
            excused: BTreeSet::new(),
        })
    }

    /// Marks an absent member as excused. Idempotent.
    pub fn mark_excused(&mut self, member_id: u64) -> Result<ExcuseOutcome> {
        let name = self.name_of(member_id);
        if !self.absent.contains(&member_id) {
            return Err(Error::NotAbsent { member: name });
        }
        if self.excused.insert(member_id) {
            Ok(ExcuseOutcome::Excused { name })
        } else {
            Ok(ExcuseOutcome::AlreadyExcused { name })
        }
    }

    /// Display name of a tracked member, `User <id>` otherwise
    #[must_use]
    pub fn name_of(&self, member_id: u64) -> String {
        self.tracked
            .get(&member_id)
            .cloned()
            .unwrap_or_else(|| format!("User {member_id}"))
    }

    /// Ledger entries for a commit, given who is in voice right now.
    ///
    /// Presence is recomputed from `occupants`: an absentee who has since joined is
    /// logged present. Members present at snapshot time stay present even if they left.
    #[must_use]
    pub fn ledger_entries(&self, occupants: &BTreeSet<u64>) -> Vec<NewLedgerEntry> {
        self.tracked
            .keys()
            .map(|id| {
                let is_present = occupants.contains(id) || !self.absent.contains(id);
                NewLedgerEntry {
                    student_id: *id,
                    is_present,
                    is_excused: !is_present && self.excused.contains(id),
                }
            })
            .collect()
    }

    /// Session name
    #[must_use]
    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    /// Skill-group name as stored in the ledger
    #[must_use]
    pub fn skill_group(&self) -> &str {
        &self.skill_group
    }

    /// Season number
    #[must_use]
    pub const fn season(&self) -> i32 {
        self.season
    }

    /// Tracked member ids
    pub fn tracked(&self) -> impl Iterator<Item = u64> + '_ {
        self.tracked.keys().copied()
    }

    /// Members present when the snapshot was taken
    #[must_use]
    pub const fn present(&self) -> &BTreeSet<u64> {
        &self.present
    }

    /// Absent members in display order
    #[must_use]
    pub fn absent(&self) -> &[u64] {
        &self.absent
    }

    /// Excused absentees
    #[must_use]
    pub const fn excused(&self) -> &BTreeSet<u64> {
        &self.excused
    }
}

/// Lifecycle of an attendance session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Excuses may be marked and the session may be committed
    Editable,
    /// Written to the ledger
    Committed {
        /// Id of the stored session row
        session_id: i64,
    },
    /// The ledger write failed and was rolled back; `/take` must be run again
    Failed,
}

/// Counts reported after a successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitSummary {
    /// Id of the stored session row
    pub session_id: i64,
    /// Members logged present
    pub present: usize,
    /// Members logged absent
    pub absent: usize,
    /// Absences logged as excused
    pub excused: usize,
}

/// An attendance snapshot together with its workflow state.
#[derive(Debug)]
pub struct AttendanceSession {
    id: u64,
    snapshot: AbsenceSnapshot,
    state: SessionState,
    last_activity: DateTime<Utc>,
    idle_timeout: Duration,
}

impl AttendanceSession {
    /// Wraps a fresh snapshot in an editable session
    #[must_use]
    pub fn new(id: u64, snapshot: AbsenceSnapshot, idle_timeout: Duration) -> Self {
        let last_activity = snapshot.taken_at;
        Self {
            id,
            snapshot,
            state: SessionState::Editable,
            last_activity,
            idle_timeout,
        }
    }

    /// Registry id, embedded in component custom ids
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// The underlying snapshot
    #[must_use]
    pub const fn snapshot(&self) -> &AbsenceSnapshot {
        &self.snapshot
    }

    /// Current workflow state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the idle timeout elapsed at `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.last_activity > self.idle_timeout
    }

    /// Rejects any interaction unless the session is editable and not idle-expired.
    pub fn ensure_editable(&self, now: DateTime<Utc>) -> Result<()> {
        match self.state {
            SessionState::Committed { .. } => Err(Error::SessionClosed { state: "logged" }),
            SessionState::Failed => Err(Error::SessionClosed {
                state: "abandoned after a failed save",
            }),
            SessionState::Editable if self.is_expired(now) => Err(Error::SessionExpired),
            SessionState::Editable => Ok(()),
        }
    }

    /// Records activity, restarting the idle timer.
    pub fn touch(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_editable(now)?;
        self.last_activity = now;
        Ok(())
    }

    /// Marks `member_id` as excused.
    pub fn mark_excused(&mut self, member_id: u64, now: DateTime<Utc>) -> Result<ExcuseOutcome> {
        self.ensure_editable(now)?;
        let outcome = self.snapshot.mark_excused(member_id)?;
        self.last_activity = now;
        Ok(outcome)
    }

    /// Writes the session and one ledger entry per tracked member.
    ///
    /// `occupants` is the committer's voice channel at commit time. On a storage error the
    /// session becomes `Failed` and the error is returned as `Persistence`; no rows
    /// remain because the write is a single transaction.
    pub async fn commit(
        &mut self,
        db: &DatabaseConnection,
        committer_id: u64,
        occupants: &[Member],
        now: DateTime<Utc>,
    ) -> Result<CommitSummary> {
        self.ensure_editable(now)?;
        self.last_activity = now;

        let occupant_ids: BTreeSet<u64> = occupants.iter().map(|m| m.id).collect();
        let entries = self.snapshot.ledger_entries(&occupant_ids);
        let new_session = NewSession {
            session_name: self.snapshot.session_name.clone(),
            requester_id: committer_id,
            skill_group: self.snapshot.skill_group.clone(),
            season: self.snapshot.season,
            timestamp: now,
        };

        match ledger::record_attendance(db, new_session, &entries).await {
            Ok(row) => {
                self.state = SessionState::Committed { session_id: row.id };
                let present = entries.iter().filter(|e| e.is_present).count();
                let summary = CommitSummary {
                    session_id: row.id,
                    present,
                    absent: entries.len() - present,
                    excused: entries.iter().filter(|e| e.is_excused).count(),
                };
                info!(
                    session = %self.snapshot.session_name,
                    group = %self.snapshot.skill_group,
                    season = self.snapshot.season,
                    ?summary,
                    "Attendance logged"
                );
                Ok(summary)
            }
            Err(e) => {
                self.state = SessionState::Failed;
                error!(
                    session = %self.snapshot.session_name,
                    "Failed to log attendance, transaction rolled back: {e}"
                );
                Err(Error::Persistence {
                    message: e.to_string(),
                })
            }
        }
    }
}

/// Live attendance sessions, keyed by the id embedded in their Discord components.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<u64, Arc<Mutex<AttendanceSession>>>>,
    next_id: AtomicU64,
    clock: Arc<dyn Clock>,
    idle_timeout: Duration,
}

impl SessionRegistry {
    /// Creates an empty registry
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, idle_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            clock,
            idle_timeout,
        }
    }

    /// Current time from the registry's clock
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Registers a snapshot as a new editable session and returns it.
    ///
    /// Sessions that idled out are dropped at the same time.
    pub async fn open(&self, snapshot: AbsenceSnapshot) -> Arc<Mutex<AttendanceSession>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let session = Arc::new(Mutex::new(AttendanceSession::new(
            id,
            snapshot,
            self.idle_timeout,
        )));

        let now = self.now();
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.try_lock().map_or(true, |s| !s.is_expired(now)));
        if sessions.len() < before {
            info!("Dropped {} idle attendance session(s)", before - sessions.len());
        }
        sessions.insert(id, Arc::clone(&session));
        session
    }

    /// Looks up a session; unknown ids are reported as expired.
    pub async fn get(&self, id: u64) -> Result<Arc<Mutex<AttendanceSession>>> {
        self.sessions.lock().await.get(&id).cloned().ok_or_else(|| {
            warn!(session_id = id, "Interaction for unknown attendance session");
            Error::SessionExpired
        })
    }

    /// Forgets a session (e.g. when its artifact could not be posted).
    pub async fn remove(&self, id: u64) {
        self.sessions.lock().await.remove(&id);
    }

    /// Number of sessions held
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Whether no sessions are held
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

/// Which controls the artifact shows and whether they accept clicks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionControls {
    /// "Mark Excused Absence" button shown (only while an absentee is not yet excused)
    pub show_excuse_button: bool,
    /// Both buttons disabled (terminal state)
    pub disabled: bool,
    /// Options of the absentee picker as (label, value); empty when hidden
    pub picker: Vec<(String, String)>,
}

/// Renders the attendance artifact for `session`.
///
/// The page is recomputed from state on every call, so repeated excuses of the same
/// member can never stack annotations. `picking` reveals the absentee picker.
pub fn render_session(
    session: &AttendanceSession,
    picking: bool,
) -> Result<(DisplayPage, SessionControls)> {
    let snapshot = &session.snapshot;
    let tone = match session.state {
        SessionState::Editable => Tone::Info,
        SessionState::Committed { .. } => Tone::Success,
        SessionState::Failed => Tone::Failure,
    };

    let mut page = DisplayPage::new(
        format!(
            "Attendance Report - {} (Season {})",
            snapshot.session_name, snapshot.season
        ),
        tone,
    );
    page.fields.push(DisplayField::new(
        "Session Info",
        format!(
            "**Session:** {}\n**Channel:** {}\n**Role:** {}\n**Total Members:** {}",
            snapshot.session_name,
            snapshot.channel_name,
            snapshot.role_label,
            snapshot.tracked.len()
        ),
    ));

    if snapshot.absent.is_empty() {
        page.fields
            .push(DisplayField::new("Attendance", "Everyone is present! 🎉"));
    } else {
        let mut lines = String::new();
        for (i, id) in snapshot.absent.iter().enumerate() {
            let marker = if snapshot.excused.contains(id) {
                " (Excused ✓)"
            } else {
                ""
            };
            writeln!(lines, "{}. {}{marker}", i + 1, snapshot.name_of(*id))?;
        }
        page.fields.push(DisplayField::new(
            format!("Absent Students ({})", snapshot.absent.len()),
            lines.trim_end(),
        ));
    }

    match session.state {
        SessionState::Editable => {}
        SessionState::Committed { .. } => page
            .fields
            .push(DisplayField::new("Status", "✅ Attendance logged.")),
        SessionState::Failed => page.fields.push(DisplayField::new(
            "Status",
            "❌ Logging failed. Run /take again to retry.",
        )),
    }

    page.footer = Some(format!("Taken by {}", snapshot.requester_name));

    let disabled = !matches!(session.state, SessionState::Editable);
    let mut unexcused = snapshot
        .absent
        .iter()
        .filter(|id| !snapshot.excused.contains(*id))
        .peekable();
    let show_excuse_button = unexcused.peek().is_some();
    let picker = if picking && !disabled {
        unexcused
            .take(MAX_PICKER_OPTIONS)
            .map(|id| (snapshot.name_of(*id), id.to_string()))
            .collect()
    } else {
        Vec::new()
    };

    let controls = SessionControls {
        show_excuse_button,
        disabled,
        picker,
    };
    Ok((page, controls))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::{Ledger, Session};
    use crate::test_utils::*;
    use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait};

    const COACH: u64 = 1;
    const VOICE: u64 = 50;
    const OTHER_VOICE: u64 = 51;

    /// Coach in voice; Advanced = {A(10), B(11), C(12)}; C in voice with the coach.
    fn directory() -> FakeDirectory {
        let mut dir = FakeDirectory::for_config(&test_config());
        dir.add_member(COACH, "Coach", &[COACH_ROLE]);
        dir.add_member(10, "Alice", &[ADVANCED_ROLE]);
        dir.add_member(11, "Bob", &[ADVANCED_ROLE]);
        dir.add_member(12, "Cara", &[ADVANCED_ROLE]);
        dir.add_member(20, "Mika", &[MECHANICS_ROLE]);
        dir.add_voice_channel(VOICE, "Coaching");
        dir.add_voice_channel(OTHER_VOICE, "Lounge");
        dir.join_voice(COACH, VOICE);
        dir.join_voice(12, VOICE);
        dir
    }

    fn request(group: &str) -> TakeRequest {
        TakeRequest {
            session_name: "Agent Masterclass".to_string(),
            skill_group: group.to_string(),
            season: 2,
            requester_id: COACH,
        }
    }

    fn take(dir: &FakeDirectory, group: &str) -> Result<AbsenceSnapshot> {
        AbsenceSnapshot::take(&request(group), dir, &test_config(), test_start())
    }

    fn open(dir: &FakeDirectory) -> AttendanceSession {
        AttendanceSession::new(7, take(dir, "Advanced").unwrap(), Duration::seconds(300))
    }

    fn assert_snapshot_invariants(snapshot: &AbsenceSnapshot) {
        let absent: BTreeSet<u64> = snapshot.absent().iter().copied().collect();
        assert!(snapshot.excused().is_subset(&absent));
        assert!(snapshot.present().is_disjoint(&absent));
        let union: BTreeSet<u64> = snapshot.present().union(&absent).copied().collect();
        let tracked: BTreeSet<u64> = snapshot.tracked().collect();
        assert_eq!(union, tracked);
    }

    #[test]
    fn test_take_computes_present_and_absent() {
        let snapshot = take(&directory(), "Advanced").unwrap();
        assert_eq!(snapshot.skill_group(), "Advanced");
        assert_eq!(snapshot.present().iter().copied().collect::<Vec<_>>(), vec![12]);
        assert_eq!(snapshot.absent(), &[10, 11]);
        assert!(snapshot.excused().is_empty());
        assert_snapshot_invariants(&snapshot);
    }

    #[test]
    fn test_take_combined_unions_groups() {
        let snapshot = take(&directory(), "combined").unwrap();
        assert_eq!(snapshot.skill_group(), COMBINED_GROUP);
        assert_eq!(snapshot.tracked().collect::<Vec<_>>(), vec![10, 11, 12, 20]);
        assert_eq!(snapshot.absent(), &[10, 11, 20]);
        assert_snapshot_invariants(&snapshot);
    }

    #[test]
    fn test_take_requires_voice() {
        let mut dir = directory();
        dir.leave_voice(COACH);
        assert!(matches!(take(&dir, "Advanced"), Err(Error::NotInVoice)));
    }

    #[test]
    fn test_take_rejects_unknown_group() {
        assert!(matches!(
            take(&directory(), "Beginners"),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_take_missing_role_is_validation_error() {
        let mut dir = directory();
        dir.remove_role(MECHANICS_ROLE);
        assert!(matches!(
            take(&dir, "Mechanics"),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_take_missing_attendance_channel_is_validation_error() {
        let mut dir = directory();
        dir.remove_channel(ATTENDANCE_CHANNEL);
        assert!(matches!(
            take(&dir, "Advanced"),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_take_skips_bots() {
        let mut dir = directory();
        dir.add_bot(99, "StatsBot", &[ADVANCED_ROLE]);
        let snapshot = take(&dir, "Advanced").unwrap();
        assert!(!snapshot.tracked().any(|id| id == 99));
    }

    #[test]
    fn test_mark_excused_is_idempotent() {
        let mut snapshot = take(&directory(), "Advanced").unwrap();
        assert_eq!(
            snapshot.mark_excused(10).unwrap(),
            ExcuseOutcome::Excused {
                name: "Alice".to_string()
            }
        );
        assert_eq!(
            snapshot.mark_excused(10).unwrap(),
            ExcuseOutcome::AlreadyExcused {
                name: "Alice".to_string()
            }
        );
        assert_eq!(snapshot.excused().len(), 1);
        assert_snapshot_invariants(&snapshot);
    }

    #[test]
    fn test_mark_excused_rejects_present_and_unknown_members() {
        let mut snapshot = take(&directory(), "Advanced").unwrap();
        assert!(matches!(
            snapshot.mark_excused(12),
            Err(Error::NotAbsent { .. })
        ));
        assert!(matches!(
            snapshot.mark_excused(404),
            Err(Error::NotAbsent { .. })
        ));
        assert!(snapshot.excused().is_empty());
        assert_snapshot_invariants(&snapshot);
    }

    #[test]
    fn test_excused_stays_subset_of_absent_under_any_sequence() {
        let mut snapshot = take(&directory(), "Combined").unwrap();
        for id in [10, 12, 10, 20, 404, 11, 20, 1, 11] {
            let _ = snapshot.mark_excused(id);
            assert_snapshot_invariants(&snapshot);
        }
        assert_eq!(snapshot.excused().len(), 3);
    }

    #[test]
    fn test_render_does_not_duplicate_excuse_marker() {
        let mut session = open(&directory());
        session.mark_excused(10, test_start()).unwrap();
        session.mark_excused(10, test_start()).unwrap();

        let (page, _) = render_session(&session, false).unwrap();
        let absent = page.field("Absent Students (2)").unwrap();
        assert_eq!(absent.value, "1. Alice (Excused ✓)\n2. Bob");
        assert_eq!(absent.value.matches("(Excused ✓)").count(), 1);
    }

    #[test]
    fn test_render_picker_lists_unexcused_absentees() {
        let mut session = open(&directory());
        session.mark_excused(10, test_start()).unwrap();

        let (_, controls) = render_session(&session, true).unwrap();
        assert!(controls.show_excuse_button);
        assert!(!controls.disabled);
        assert_eq!(controls.picker, vec![("Bob".to_string(), "11".to_string())]);

        let (_, hidden) = render_session(&session, false).unwrap();
        assert!(hidden.picker.is_empty());
    }

    #[test]
    fn test_render_hides_excuse_button_once_all_absentees_excused() {
        let mut session = open(&directory());
        session.mark_excused(10, test_start()).unwrap();
        session.mark_excused(11, test_start()).unwrap();

        let (page, controls) = render_session(&session, true).unwrap();
        assert!(!controls.show_excuse_button);
        assert!(controls.picker.is_empty());
        assert!(!controls.disabled);
        assert!(page.field("Absent Students (2)").is_some());
    }

    #[test]
    fn test_render_everyone_present_hides_excuse_button() {
        let mut dir = directory();
        dir.join_voice(10, VOICE);
        dir.join_voice(11, VOICE);
        let session = open(&dir);

        let (page, controls) = render_session(&session, false).unwrap();
        assert!(page.field("Attendance").is_some());
        assert!(!controls.show_excuse_button);
        assert_eq!(page.footer.as_deref(), Some("Taken by Coach"));
    }

    #[test]
    fn test_session_expires_after_idle_timeout() {
        let mut session = open(&directory());
        let later = test_start() + Duration::seconds(301);
        assert!(matches!(
            session.mark_excused(10, later),
            Err(Error::SessionExpired)
        ));
        assert!(session.snapshot().excused().is_empty());
    }

    #[test]
    fn test_activity_restarts_idle_timer() {
        let mut session = open(&directory());
        let t1 = test_start() + Duration::seconds(200);
        session.mark_excused(10, t1).unwrap();
        let t2 = t1 + Duration::seconds(200);
        assert!(session.mark_excused(11, t2).is_ok());
    }

    #[test]
    fn test_ledger_entries_recompute_presence() {
        let mut snapshot = take(&directory(), "Advanced").unwrap();
        snapshot.mark_excused(10).unwrap();

        // Bob joined after the snapshot; Cara (present at snapshot) has left
        let occupants: BTreeSet<u64> = [COACH, 11].into_iter().collect();
        let entries = snapshot.ledger_entries(&occupants);

        let by_id: HashMap<u64, NewLedgerEntry> =
            entries.iter().map(|e| (e.student_id, *e)).collect();
        assert_eq!(entries.len(), 3);
        assert!(!by_id[&10].is_present && by_id[&10].is_excused);
        assert!(by_id[&11].is_present && !by_id[&11].is_excused);
        assert!(by_id[&12].is_present);
    }

    #[tokio::test]
    async fn test_commit_writes_once_and_recomputes_presence() -> Result<()> {
        let db = setup_test_db().await?;
        let mut dir = directory();
        let mut session = open(&dir);
        session.mark_excused(10, test_start())?;

        // B joins voice before the commit
        dir.join_voice(11, VOICE);
        let occupants = dir.voice_occupants(VOICE)?;
        let summary = session.commit(&db, COACH, &occupants, test_start()).await?;

        assert_eq!(summary.present, 2);
        assert_eq!(summary.absent, 1);
        assert_eq!(summary.excused, 1);
        assert!(matches!(session.state(), SessionState::Committed { .. }));

        let entries = ledger::get_entries_for_session(&db, summary.session_id).await?;
        let bob = entries.iter().find(|e| e.student_id == "11").unwrap();
        assert!(bob.is_present);
        assert!(!bob.is_excused);
        let alice = entries.iter().find(|e| e.student_id == "10").unwrap();
        assert!(!alice.is_present);
        assert!(alice.is_excused);

        // Second commit is rejected without writing anything
        let second = session.commit(&db, COACH, &occupants, test_start()).await;
        assert!(matches!(second, Err(Error::SessionClosed { .. })));
        assert_eq!(Session::find().count(&db).await?, 1);
        assert_eq!(Ledger::find().count(&db).await?, 3);

        // Excuses are rejected too
        assert!(matches!(
            session.mark_excused(11, test_start()),
            Err(Error::SessionClosed { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_commit_failure_marks_session_failed() -> Result<()> {
        let db = setup_test_db().await?;
        db.execute_unprepared("DROP TABLE ledger").await?;
        let dir = directory();
        let mut session = open(&dir);
        let occupants = dir.voice_occupants(VOICE)?;

        let result = session.commit(&db, COACH, &occupants, test_start()).await;
        assert!(matches!(result, Err(Error::Persistence { .. })));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(Session::find().count(&db).await?, 0);

        // Failed sessions are terminal
        let retry = session.commit(&db, COACH, &occupants, test_start()).await;
        assert!(matches!(retry, Err(Error::SessionClosed { .. })));

        let (page, controls) = render_session(&session, true)?;
        assert!(controls.disabled);
        assert!(controls.picker.is_empty());
        assert!(page.field("Status").is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_commit_after_expiry_is_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let dir = directory();
        let mut session = open(&dir);
        let later = test_start() + Duration::seconds(600);

        let result = session.commit(&db, COACH, &[], later).await;
        assert!(matches!(result, Err(Error::SessionExpired)));
        assert_eq!(Session::find().count(&db).await?, 0);
        Ok(())
    }

    async fn commit_by_id(
        registry: &SessionRegistry,
        id: u64,
        db: &DatabaseConnection,
        occupants: &[Member],
    ) -> Result<CommitSummary> {
        let handle = registry.get(id).await?;
        let mut guard = handle.lock().await;
        guard.commit(db, COACH, occupants, test_start()).await
    }

    #[tokio::test]
    async fn test_registry_serializes_concurrent_commits() -> Result<()> {
        let db = setup_test_db().await?;
        let dir = directory();
        let clock = Arc::new(ManualClock::new(test_start()));
        let registry = SessionRegistry::new(clock, Duration::seconds(300));
        let session = registry.open(take(&dir, "Advanced")?).await;
        let id = session.lock().await.id();
        let occupants = dir.voice_occupants(VOICE)?;

        let (first, second) = tokio::join!(
            commit_by_id(&registry, id, &db, &occupants),
            commit_by_id(&registry, id, &db, &occupants)
        );

        assert_eq!(
            [first.is_ok(), second.is_ok()]
                .iter()
                .filter(|ok| **ok)
                .count(),
            1
        );
        assert_eq!(Session::find().count(&db).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_registry_unknown_id_is_expired() {
        let registry = SessionRegistry::new(
            Arc::new(ManualClock::new(test_start())),
            Duration::seconds(300),
        );
        assert!(matches!(registry.get(42).await, Err(Error::SessionExpired)));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_registry_drops_idle_sessions_on_open() -> Result<()> {
        let dir = directory();
        let clock = Arc::new(ManualClock::new(test_start()));
        let registry = SessionRegistry::new(
            Arc::clone(&clock) as Arc<dyn Clock>,
            Duration::seconds(300),
        );
        let first = registry.open(take(&dir, "Advanced")?).await;
        let first_id = first.lock().await.id();

        clock.advance(Duration::seconds(400));
        registry.open(take(&dir, "Mechanics")?).await;

        assert_eq!(registry.len().await, 1);
        assert!(matches!(
            registry.get(first_id).await,
            Err(Error::SessionExpired)
        ));
        Ok(())
    }
}
