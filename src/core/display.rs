//! Framework-agnostic display pages.
//!
//! Attendance artifacts and report pages are rendered into [`DisplayPage`] values, which
//! the bot layer converts into Discord embeds. Keeping rendering pure makes it testable
//! and guarantees the artifact is always recomputed from state.

/// Maximum characters Discord accepts in an embed field name.
pub const MAX_FIELD_NAME_LENGTH: usize = 256;

/// Maximum characters Discord accepts in an embed field value.
pub const MAX_FIELD_VALUE_LENGTH: usize = 1024;

/// Maximum fields Discord accepts in a single embed.
pub const MAX_FIELDS_PER_PAGE: usize = 25;

const ELLIPSIS: &str = "...";

/// Embed colours used by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Informational (attendance artifacts, reports)
    Info,
    /// Attention needed (reminders)
    Warning,
    /// Committed successfully
    Success,
    /// Terminal failure
    Failure,
}

impl Tone {
    /// RGB colour for the tone
    #[must_use]
    pub const fn rgb(self) -> u32 {
        match self {
            Self::Info => 0x0034_98DB,
            Self::Warning => 0x00F1_C40F,
            Self::Success => 0x002E_CC71,
            Self::Failure => 0x00E7_4C3C,
        }
    }
}

/// A named block of text on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayField {
    /// Field heading, never longer than [`MAX_FIELD_NAME_LENGTH`]
    pub name: String,
    /// Field body, never longer than [`MAX_FIELD_VALUE_LENGTH`]
    pub value: String,
}

impl DisplayField {
    /// Builds a field, truncating name and body to the Discord limits.
    pub fn new(name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        Self {
            name: truncate(name.as_ref(), MAX_FIELD_NAME_LENGTH),
            value: truncate(value.as_ref(), MAX_FIELD_VALUE_LENGTH),
        }
    }
}

/// One renderable page (one Discord embed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayPage {
    /// Embed title
    pub title: String,
    /// Optional description under the title
    pub description: Option<String>,
    /// Fields in display order
    pub fields: Vec<DisplayField>,
    /// Optional footer text
    pub footer: Option<String>,
    /// Embed colour
    pub tone: Tone,
}

impl DisplayPage {
    /// Empty page with a title
    pub fn new(title: impl Into<String>, tone: Tone) -> Self {
        Self {
            title: title.into(),
            description: None,
            fields: Vec::new(),
            footer: None,
            tone,
        }
    }

    /// Finds a field by exact name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&DisplayField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Truncates `text` to at most `max_chars` characters, ending with `...` when cut.
#[must_use]
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}
