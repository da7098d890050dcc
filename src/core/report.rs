//! Attendance reports.
//!
//! Absences of one season within a daily or weekly window are read from the ledger,
//! grouped per (date, session name, skill group) and laid out on pages of at most
//! [`MAX_FIELDS_PER_PAGE`] groups. The result is never empty: a window without absences
//! renders a single "No Data" page.

use crate::{
    core::{
        directory::GuildDirectory,
        display::{DisplayField, DisplayPage, MAX_FIELDS_PER_PAGE, Tone},
        ledger::{self, AbsenceGroup},
    },
    errors::Result,
};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use sea_orm::DatabaseConnection;
use std::fmt::Write;
use tracing::{info, warn};

/// Report lookback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportGranularity {
    /// Since midnight (UTC) yesterday
    Daily,
    /// Since midnight (UTC) seven days ago
    Weekly,
}

impl ReportGranularity {
    /// Days covered before today
    #[must_use]
    pub const fn lookback_days(self) -> i64 {
        match self {
            Self::Daily => 1,
            Self::Weekly => 7,
        }
    }

    /// Display label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
        }
    }

    /// First instant included in a report generated at `now`.
    #[must_use]
    pub fn window_start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        let day = now.date_naive() - Duration::days(self.lookback_days());
        day.and_time(NaiveTime::MIN).and_utc()
    }
}

/// Reads the season's absences for the window and renders the report pages.
pub async fn generate_report<D: GuildDirectory + Sync + ?Sized>(
    db: &DatabaseConnection,
    directory: &D,
    season: i32,
    granularity: ReportGranularity,
    now: DateTime<Utc>,
) -> Result<Vec<DisplayPage>> {
    let since = granularity.window_start(now);
    let groups = ledger::query_absences(db, season, since).await?;
    info!(
        season,
        granularity = granularity.label(),
        groups = groups.len(),
        "Generating attendance report"
    );
    render_report_pages(&groups, season, granularity, now, |id| {
        member_name(directory, id)
    })
}

fn member_name<D: GuildDirectory + ?Sized>(directory: &D, student_id: &str) -> String {
    let fallback = || format!("User {student_id}");
    let Ok(id) = student_id.parse::<u64>() else {
        return fallback();
    };
    match directory.member(id) {
        Ok(Some(member)) => member.display_name,
        Ok(None) => fallback(),
        Err(e) => {
            warn!("Could not resolve member {id} for report: {e}");
            fallback()
        }
    }
}

/// Field heading and body for one group.
fn group_field(
    group: &AbsenceGroup,
    resolve: &impl Fn(&str) -> String,
) -> Result<DisplayField> {
    let name = format!(
        "Session: {} on [{}] for {}",
        group.session_name,
        group.date.format("%Y-%m-%d"),
        group.skill_group
    );

    let mut value = String::from("**Absent:**\n");
    for (i, absentee) in group.absentees.iter().enumerate() {
        let status = if absentee.is_excused {
            "(Excused)"
        } else {
            "(Unexcused)"
        };
        writeln!(value, "{}. {} {status}", i + 1, resolve(&absentee.student_id))?;
    }
    write!(
        value,
        "\nTotal Absences: **{}** (Excused: {})",
        group.total_absences, group.excused_absences
    )?;

    Ok(DisplayField::new(name, value))
}

/// Lays `groups` out on numbered pages.
///
/// `resolve` maps a stored student id to a display name.
pub fn render_report_pages(
    groups: &[AbsenceGroup],
    season: i32,
    granularity: ReportGranularity,
    generated_at: DateTime<Utc>,
    resolve: impl Fn(&str) -> String,
) -> Result<Vec<DisplayPage>> {
    let title = format!("Attendance Report - Season {season}");
    let mut first = DisplayPage::new(title.clone(), Tone::Info);
    first.description = Some(format!(
        "{} report generated at {}",
        granularity.label(),
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    let mut pages = if groups.is_empty() {
        first.fields.push(DisplayField::new(
            "No Data",
            "No attendance records found for the specified period.",
        ));
        vec![first]
    } else {
        let mut pages = Vec::new();
        for (i, chunk) in groups.chunks(MAX_FIELDS_PER_PAGE).enumerate() {
            let mut page = if i == 0 {
                first.clone()
            } else {
                DisplayPage::new(format!("{title} (Continued)"), Tone::Info)
            };
            page.fields = chunk
                .iter()
                .map(|g| group_field(g, &resolve))
                .collect::<Result<_>>()?;
            pages.push(page);
        }
        pages
    };

    let total = pages.len();
    for (i, page) in pages.iter_mut().enumerate() {
        page.footer = Some(format!("Page {}/{total}", i + 1));
    }
    Ok(pages)
}
