//! Note domain model.
//!
//! # Responsibility
//! - Define the single persisted record of the note store.
//! - Own title normalization used by every write path.
//!
//! # Invariants
//! - `id` is assigned by the store, starts at 1 and is never reused.
//! - `title` is non-empty and carries no surrounding whitespace once persisted.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned note identity.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type NoteId = i64;

/// A persisted plain-text note.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Note {
    /// Monotonic identity assigned on insert.
    pub id: NoteId,
    /// Trimmed, non-empty note text.
    pub title: String,
}

/// Reason a note failed validation before a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteValidationError {
    /// Ids are positive integers.
    InvalidId(NoteId),
    /// Title is empty after trimming.
    EmptyTitle,
    /// Title carries leading or trailing whitespace.
    UntrimmedTitle,
}

impl Display for NoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidId(id) => write!(f, "note id must be positive, got {id}"),
            Self::EmptyTitle => write!(f, "note title must not be blank"),
            Self::UntrimmedTitle => {
                write!(f, "note title must not have surrounding whitespace")
            }
        }
    }
}

impl Error for NoteValidationError {}

impl Note {
    /// Builds a note from already-assigned identity and title.
    ///
    /// Does not validate; repository writes call [`Note::validate`].
    pub fn new(id: NoteId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
        }
    }

    /// Returns a copy of this note carrying a replacement title.
    pub fn with_title(&self, title: impl Into<String>) -> Self {
        Self {
            id: self.id,
            title: title.into(),
        }
    }

    /// Checks the persisted-state invariants.
    ///
    /// # Errors
    /// - `InvalidId` when `id < 1`.
    /// - `EmptyTitle` when the title is blank.
    /// - `UntrimmedTitle` when the title has surrounding whitespace.
    pub fn validate(&self) -> Result<(), NoteValidationError> {
        if self.id < 1 {
            return Err(NoteValidationError::InvalidId(self.id));
        }
        let trimmed = self.title.trim();
        if trimmed.is_empty() {
            return Err(NoteValidationError::EmptyTitle);
        }
        if trimmed.len() != self.title.len() {
            return Err(NoteValidationError::UntrimmedTitle);
        }
        Ok(())
    }
}

/// Trims raw user input into a storable title.
///
/// Returns `None` for blank input: blank notes are never created and blank
/// edits are never saved.
pub fn normalize_title(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_title, Note, NoteValidationError};

    #[test]
    fn normalize_title_trims_and_rejects_blank() {
        assert_eq!(normalize_title("  Buy milk \n").as_deref(), Some("Buy milk"));
        assert_eq!(normalize_title(""), None);
        assert_eq!(normalize_title(" \t\r\n"), None);
    }

    #[test]
    fn validate_rejects_each_broken_invariant() {
        assert_eq!(
            Note::new(0, "x").validate(),
            Err(NoteValidationError::InvalidId(0))
        );
        assert_eq!(
            Note::new(1, "   ").validate(),
            Err(NoteValidationError::EmptyTitle)
        );
        assert_eq!(
            Note::new(1, " padded").validate(),
            Err(NoteValidationError::UntrimmedTitle)
        );
        assert!(Note::new(7, "ok").validate().is_ok());
    }

    #[test]
    fn with_title_keeps_identity() {
        let note = Note::new(4, "draft");
        let edited = note.with_title("final");
        assert_eq!(edited.id, 4);
        assert_eq!(edited.title, "final");
    }
}
