//! Reminder Scheduler - nudges coaches who sit in voice without taking attendance.
//!
//! A presence timer starts when a watched member joins voice from outside voice and is
//! dropped when they leave voice. The periodic [`ReminderScheduler::tick`] reminds every
//! watched occupant whose timer reached the threshold, at most once per epoch.
//! [`ReminderScheduler::reset_epoch`] clears all state and re-arms timers for whoever
//! is still in voice.
//!
//! The scheduler owns no I/O: the bot feeds it voice events and occupancy scans and
//! delivers the returned [`Reminder`]s.

use crate::{
    config::AppConfig,
    core::{
        clock::Clock,
        directory::{Member, VoicePresence},
        display::{DisplayPage, Tone},
    },
};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// A reminder to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    /// Member to remind
    pub member_id: u64,
    /// Member display name, for logs
    pub display_name: String,
    /// Voice channel the member is sitting in
    pub channel_name: String,
    /// When the reminder fired
    pub sent_at: DateTime<Utc>,
}

impl Reminder {
    /// Plain message content (carries the mention so the member is pinged)
    #[must_use]
    pub fn content(&self) -> String {
        format!("<@{}> Reminder to take attendance!", self.member_id)
    }

    /// Embed shown under the mention
    #[must_use]
    pub fn page(&self, threshold: Duration) -> DisplayPage {
        let mut page = DisplayPage::new("Attendance Reminder", Tone::Warning);
        page.description = Some(format!(
            "You've been in {} for {} minutes. Don't forget to take attendance!",
            self.channel_name,
            threshold.num_minutes()
        ));
        page.footer = Some("Use /take to record attendance".to_string());
        page
    }
}

/// Per-member presence timers and the reminder cooldown set.
pub struct ReminderScheduler {
    clock: Arc<dyn Clock>,
    watched_role_ids: Vec<u64>,
    threshold: Duration,
    timers: HashMap<u64, DateTime<Utc>>,
    reminded: HashSet<u64>,
}

impl ReminderScheduler {
    /// Creates a scheduler watching holders of `watched_role_ids`.
    pub fn new(clock: Arc<dyn Clock>, watched_role_ids: Vec<u64>, threshold: Duration) -> Self {
        Self {
            clock,
            watched_role_ids,
            threshold,
            timers: HashMap::new(),
            reminded: HashSet::new(),
        }
    }

    /// Watches the command allow-list with the configured threshold.
    pub fn from_config(clock: Arc<dyn Clock>, config: &AppConfig) -> Self {
        Self::new(
            clock,
            config.guild.allowed_role_ids.clone(),
            config.reminder.threshold(),
        )
    }

    fn is_watched(&self, member: &Member) -> bool {
        !member.is_bot && member.has_any_role(&self.watched_role_ids)
    }

    /// Presence needed before reminding
    #[must_use]
    pub const fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Applies a voice-state transition.
    ///
    /// Joining from outside voice (re)starts the timer and leaving voice drops it.
    /// Moving between channels keeps the running timer.
    pub fn on_voice_state_change(
        &mut self,
        member: &Member,
        before_channel: Option<u64>,
        after_channel: Option<u64>,
    ) {
        if !self.is_watched(member) {
            return;
        }
        match (before_channel, after_channel) {
            (None, Some(channel)) => {
                let now = self.clock.now();
                self.timers.insert(member.id, now);
                debug!(member = %member.display_name, channel, "Started presence timer");
            }
            (Some(_), None) => {
                self.timers.remove(&member.id);
                debug!(member = %member.display_name, "Stopped presence timer");
            }
            _ => {}
        }
    }

    /// Scans current voice occupancy and returns the reminders due now.
    ///
    /// Watched occupants without a timer (e.g. after a restart) get one started now
    /// instead of a reminder.
    pub fn tick(&mut self, presences: &[VoicePresence]) -> Vec<Reminder> {
        let now = self.clock.now();
        let mut due = Vec::new();

        for presence in presences {
            let member = &presence.member;
            if !self.is_watched(member) || self.reminded.contains(&member.id) {
                continue;
            }
            let Some(started) = self.timers.get(&member.id).copied() else {
                self.timers.insert(member.id, now);
                debug!(member = %member.display_name, "Initialized missing presence timer");
                continue;
            };
            if now - started >= self.threshold {
                self.reminded.insert(member.id);
                due.push(Reminder {
                    member_id: member.id,
                    display_name: member.display_name.clone(),
                    channel_name: presence.channel_name.clone(),
                    sent_at: now,
                });
            }
        }

        due
    }

    /// Starts timers for every watched occupant that has none.
    pub fn initialize(&mut self, presences: &[VoicePresence]) {
        let now = self.clock.now();
        let mut started = 0;
        for presence in presences {
            if self.is_watched(&presence.member) {
                self.timers.entry(presence.member.id).or_insert_with(|| {
                    started += 1;
                    now
                });
            }
        }
        info!("Initialized {started} presence timer(s) from current voice state");
    }

    /// Clears the cooldown set and all timers, then re-arms timers from `presences`.
    pub fn reset_epoch(&mut self, presences: &[VoicePresence]) {
        let cleared = self.reminded.len();
        self.reminded.clear();
        self.timers.clear();
        info!("Reset daily reminders, cleared {cleared} reminded member(s)");
        self.initialize(presences);
    }

    /// Whether `member_id` was already reminded this epoch
    #[must_use]
    pub fn is_reminded(&self, member_id: u64) -> bool {
        self.reminded.contains(&member_id)
    }

    /// Start of the member's presence timer, if running
    #[must_use]
    pub fn timer_started(&self, member_id: u64) -> Option<DateTime<Utc>> {
        self.timers.get(&member_id).copied()
    }
}
