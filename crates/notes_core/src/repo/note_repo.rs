//! Note repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over the `notes` table plus the issued-id high-water mark.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Write paths call `Note::validate()` before SQL mutations.
//! - Read paths reject invalid persisted rows instead of masking them.
//! - `list_notes` returns insertion order (`id ASC`).

use crate::db::{DbError, DbStage};
use crate::model::note::{Note, NoteId, NoteValidationError};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for note persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(NoteValidationError),
    Db(DbError),
    NotFound(NoteId),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted note data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<NoteValidationError> for RepoError {
    fn from(value: NoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite {
            stage: DbStage::Query,
            source: value,
        })
    }
}

/// Repository interface for note persistence.
pub trait NoteRepository {
    /// Persists a new note with a caller-assigned id and records the id as issued.
    fn create_note(&mut self, note: &Note) -> RepoResult<()>;
    /// Replaces the title of an existing note.
    ///
    /// Returns `false` when the stored title already equals `note.title`.
    fn update_note_title(&mut self, note: &Note) -> RepoResult<bool>;
    /// Hard-deletes a note. Returns whether a row was removed.
    fn delete_note(&mut self, id: NoteId) -> RepoResult<bool>;
    /// Gets one note by id.
    fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>>;
    /// Lists every note, oldest first.
    fn list_notes(&self) -> RepoResult<Vec<Note>>;
    /// Returns the first id that has never been issued.
    fn next_unissued_id(&self) -> RepoResult<NoteId>;
}

/// SQLite-backed note repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    /// Wraps a migrated connection.
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn create_note(&mut self, note: &Note) -> RepoResult<()> {
        note.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO notes (id, title) VALUES (?1, ?2);",
            params![note.id, note.title.as_str()],
        )?;
        tx.execute(
            "UPDATE note_sequence
             SET last_id = MAX(last_id, ?1)
             WHERE singleton = 1;",
            [note.id],
        )?;
        tx.commit()?;

        Ok(())
    }

    fn update_note_title(&mut self, note: &Note) -> RepoResult<bool> {
        note.validate()?;

        let changed = self.conn.execute(
            "UPDATE notes
             SET title = ?2
             WHERE id = ?1
               AND title IS NOT ?2;",
            params![note.id, note.title.as_str()],
        )?;
        if changed > 0 {
            return Ok(true);
        }

        // Zero rows means either an unchanged title or a missing note.
        if self.get_note(note.id)?.is_some() {
            Ok(false)
        } else {
            Err(RepoError::NotFound(note.id))
        }
    }

    fn delete_note(&mut self, id: NoteId) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM notes WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }

    fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>> {
        let note = self
            .conn
            .query_row(
                "SELECT id, title FROM notes WHERE id = ?1;",
                [id],
                |row| Ok(read_note_row(row)),
            )
            .optional()?;

        note.transpose()
    }

    fn list_notes(&self) -> RepoResult<Vec<Note>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id, title FROM notes ORDER BY id ASC;")?;
        let mut rows = stmt.query([])?;
        let mut notes = Vec::new();

        while let Some(row) = rows.next()? {
            notes.push(read_note_row(row)?);
        }

        Ok(notes)
    }

    fn next_unissued_id(&self) -> RepoResult<NoteId> {
        let (max_id, last_issued): (Option<NoteId>, Option<NoteId>) = self.conn.query_row(
            "SELECT
                (SELECT MAX(id) FROM notes),
                (SELECT last_id FROM note_sequence WHERE singleton = 1);",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let high_water = max_id.unwrap_or(0).max(last_issued.unwrap_or(0));
        high_water.checked_add(1).ok_or_else(|| {
            RepoError::InvalidData(format!("note id space exhausted at {high_water}"))
        })
    }
}

fn read_note_row(row: &Row<'_>) -> RepoResult<Note> {
    let note = Note {
        id: row.get("id")?,
        title: row.get("title")?,
    };
    note.validate().map_err(|err| {
        RepoError::InvalidData(format!("row id={} in notes: {err}", note.id))
    })?;
    Ok(note)
}
