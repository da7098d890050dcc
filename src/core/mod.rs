//! Core business logic, free of any Discord types.
//!
//! The bot layer adapts serenity state into [`directory::GuildDirectory`] and renders
//! [`display::DisplayPage`]s; everything in here can be exercised with the in-memory
//! fakes from `test_utils`.

/// Attendance session workflow: snapshot, excuses, commit
pub mod attendance;
/// Injectable time source
pub mod clock;
/// Read-only guild roster and voice-state view
pub mod directory;
/// Discord-agnostic page rendering
pub mod display;
/// Ledger Store: durable sessions and attendance entries
pub mod ledger;
/// Voice-presence reminders
pub mod reminder;
/// Daily and weekly absence reports
pub mod report;
/// Guild roster reconciliation
pub mod users;
