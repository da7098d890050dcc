//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.

pub mod ledger;
pub mod session;
pub mod user;

// Re-export specific types to avoid conflicts
pub use ledger::{Column as LedgerColumn, Entity as Ledger, Model as LedgerModel};
pub use session::{Column as SessionColumn, Entity as Session, Model as SessionModel};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
