//! Domain model for the note store.
//!
//! # Responsibility
//! - Define the `Note` record shared by repository, store and feed.
//!
//! # Invariants
//! - Deletion is a hard delete; there is no tombstone state.

pub mod note;
