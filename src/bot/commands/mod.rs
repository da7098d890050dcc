//! Discord command implementations organized by category.

#![allow(clippy::too_long_first_doc_paragraph)]

/// Attendance commands
pub mod attendance;

/// General utility commands
pub mod general;

/// Roster commands
pub mod users;

// Export commands
pub use attendance::*;
pub use general::*;
pub use users::*;
