//! Embeds and message components.
//!
//! Core code renders [`DisplayPage`]s and [`SessionControls`]; this module turns them
//! into serenity builders and owns the custom-id scheme of the attendance artifact:
//! `attendance:<action>:<session id>`.

use crate::core::{
    attendance::SessionControls,
    display::{DisplayPage, truncate},
};
use poise::serenity_prelude as serenity;
use serenity::{
    ButtonStyle, CreateActionRow, CreateButton, CreateEmbed, CreateEmbedFooter, CreateSelectMenu,
    CreateSelectMenuKind, CreateSelectMenuOption,
};

const ID_PREFIX: &str = "attendance";
const MAX_OPTION_LABEL_LENGTH: usize = 100;

/// What a component on the attendance artifact does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// "Mark Excused Absence" button: reveal the absentee picker
    Excuse,
    /// Absentee picker: excuse the selected member
    Pick,
    /// "Log Attendance" button: commit
    Log,
}

impl SessionAction {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Excuse => "excuse",
            Self::Pick => "pick",
            Self::Log => "log",
        }
    }
}

/// Custom id for `action` on session `session_id`
#[must_use]
pub fn component_id(action: SessionAction, session_id: u64) -> String {
    format!("{ID_PREFIX}:{}:{session_id}", action.as_str())
}

/// Parses a custom id produced by [`component_id`].
#[must_use]
pub fn parse_component_id(custom_id: &str) -> Option<(SessionAction, u64)> {
    let mut parts = custom_id.split(':');
    if parts.next()? != ID_PREFIX {
        return None;
    }
    let action = match parts.next()? {
        "excuse" => SessionAction::Excuse,
        "pick" => SessionAction::Pick,
        "log" => SessionAction::Log,
        _ => return None,
    };
    let session_id = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((action, session_id))
}

/// Converts a display page into an embed.
pub fn to_embed(page: &DisplayPage) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(page.title.as_str())
        .colour(page.tone.rgb());
    if let Some(description) = &page.description {
        embed = embed.description(description.as_str());
    }
    for field in &page.fields {
        embed = embed.field(field.name.as_str(), field.value.as_str(), false);
    }
    if let Some(footer) = &page.footer {
        embed = embed.footer(CreateEmbedFooter::new(footer.as_str()));
    }
    embed
}

/// Button row, plus the absentee picker when it is open.
pub fn session_rows(session_id: u64, controls: &SessionControls) -> Vec<CreateActionRow> {
    let mut buttons = Vec::with_capacity(2);
    if controls.show_excuse_button {
        buttons.push(
            CreateButton::new(component_id(SessionAction::Excuse, session_id))
                .label("Mark Excused Absence")
                .style(ButtonStyle::Secondary)
                .disabled(controls.disabled),
        );
    }
    buttons.push(
        CreateButton::new(component_id(SessionAction::Log, session_id))
            .label("Log Attendance")
            .style(ButtonStyle::Primary)
            .disabled(controls.disabled),
    );

    let mut rows = vec![CreateActionRow::Buttons(buttons)];
    if !controls.picker.is_empty() {
        let options = controls
            .picker
            .iter()
            .map(|(label, value)| {
                CreateSelectMenuOption::new(truncate(label, MAX_OPTION_LABEL_LENGTH), value.as_str())
            })
            .collect();
        rows.push(CreateActionRow::SelectMenu(
            CreateSelectMenu::new(
                component_id(SessionAction::Pick, session_id),
                CreateSelectMenuKind::String { options },
            )
            .placeholder("Select student to excuse...")
            .min_values(1)
            .max_values(1),
        ));
    }
    rows
}
