//! SQLite access for the note store: opening, bootstrapping, migrating.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - No note data is read or written before migrations succeed.
//! - Every SQLite failure is tagged with the `DbStage` it happened in.

mod error;
pub mod migrations;
mod open;

pub use error::{DbError, DbStage};
pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;
