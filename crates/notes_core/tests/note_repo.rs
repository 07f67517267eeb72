use notes_core::db::{open_db_in_memory, DbStage};
use notes_core::{Note, NoteRepository, NoteValidationError, RepoError, SqliteNoteRepository};

#[test]
fn create_and_list_returns_insertion_order() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteNoteRepository::new(&mut conn);

    repo.create_note(&Note::new(1, "first")).unwrap();
    repo.create_note(&Note::new(2, "second")).unwrap();
    repo.create_note(&Note::new(3, "third")).unwrap();

    let titles: Vec<String> = repo
        .list_notes()
        .unwrap()
        .into_iter()
        .map(|note| note.title)
        .collect();
    assert_eq!(titles, ["first", "second", "third"]);
}

#[test]
fn create_rejects_invalid_notes_before_sql() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteNoteRepository::new(&mut conn);

    let err = repo.create_note(&Note::new(1, "  padded ")).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(NoteValidationError::UntrimmedTitle)
    ));
    assert!(repo.list_notes().unwrap().is_empty());
}

#[test]
fn duplicate_id_is_a_db_error() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteNoteRepository::new(&mut conn);

    repo.create_note(&Note::new(1, "a")).unwrap();
    let err = repo.create_note(&Note::new(1, "b")).unwrap_err();
    assert!(matches!(err, RepoError::Db(ref db) if db.stage() == DbStage::Query));
    assert_eq!(repo.get_note(1).unwrap().unwrap().title, "a");
}

#[test]
fn update_title_reports_change_and_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteNoteRepository::new(&mut conn);
    repo.create_note(&Note::new(1, "draft")).unwrap();

    assert!(repo.update_note_title(&Note::new(1, "final")).unwrap());
    assert!(!repo.update_note_title(&Note::new(1, "final")).unwrap());

    let err = repo.update_note_title(&Note::new(42, "ghost")).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(42)));
    assert_eq!(repo.get_note(1).unwrap().unwrap().title, "final");
}

#[test]
fn delete_is_hard_and_idempotent() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteNoteRepository::new(&mut conn);
    repo.create_note(&Note::new(1, "gone")).unwrap();

    assert!(repo.delete_note(1).unwrap());
    assert!(!repo.delete_note(1).unwrap());
    assert!(repo.get_note(1).unwrap().is_none());

    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM notes;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn next_unissued_id_survives_deleting_newest_note() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteNoteRepository::new(&mut conn);
    assert_eq!(repo.next_unissued_id().unwrap(), 1);

    repo.create_note(&Note::new(1, "a")).unwrap();
    repo.create_note(&Note::new(2, "b")).unwrap();
    repo.delete_note(2).unwrap();

    assert_eq!(repo.next_unissued_id().unwrap(), 3);
}

#[test]
fn corrupted_rows_surface_as_invalid_data() {
    let mut conn = open_db_in_memory().unwrap();
    conn.execute("INSERT INTO notes (id, title) VALUES (1, ' untrimmed');", [])
        .unwrap();

    let repo = SqliteNoteRepository::new(&mut conn);
    let err = repo.list_notes().unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}
