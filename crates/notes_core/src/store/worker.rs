//! Persistence worker: one thread, one connection, one FIFO command queue.
//!
//! Every mutation and every cold read runs here, so writes are totally
//! ordered and the id sequence needs no synchronization. After each
//! state-changing mutation the worker recomputes the full collection once and
//! publishes it to the feed.

use super::{StoreError, StoreResult};
use crate::feed::{NoteFeed, Snapshot, Subscription};
use crate::model::note::{Note, NoteId};
use crate::repo::note_repo::{NoteRepository, RepoError, SqliteNoteRepository};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Instant;

pub(crate) type Reply<T> = Sender<StoreResult<T>>;

/// Commands sent to the persistence worker.
pub(crate) enum Command {
    /// Insert a note with an already normalized title.
    Insert {
        title: String,
        reply: Reply<Option<Note>>,
    },
    /// Replace the title of an existing note; the title is already normalized.
    Update { note: Note, reply: Reply<()> },
    Delete { id: NoteId, reply: Reply<()> },
    /// Register a subscriber, querying the store when nothing is retained.
    Subscribe { reply: Reply<Subscription> },
    /// Read the current collection.
    Snapshot { reply: Reply<Snapshot> },
    /// Re-read the feed release deadline.
    Wake,
    /// Stop after every previously queued command.
    Shutdown,
}

/// Owned monotonic id counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct IdSequence {
    next: NoteId,
}

impl IdSequence {
    pub(crate) fn starting_at(next: NoteId) -> Self {
        Self { next }
    }

    /// Id the next successful insert will receive.
    pub(crate) fn peek(&self) -> NoteId {
        self.next
    }

    /// Consumes the peeked id. Called only after the insert committed.
    pub(crate) fn advance(&mut self) {
        self.next += 1;
    }
}

pub(crate) struct Worker {
    conn: Connection,
    rx: Receiver<Command>,
    feed: Arc<NoteFeed>,
    ids: IdSequence,
}

impl Worker {
    pub(crate) fn new(
        conn: Connection,
        rx: Receiver<Command>,
        feed: Arc<NoteFeed>,
        ids: IdSequence,
    ) -> Self {
        Self {
            conn,
            rx,
            feed,
            ids,
        }
    }

    pub(crate) fn run(mut self) {
        info!(
            "event=store_worker module=store status=start next_id={}",
            self.ids.peek()
        );

        loop {
            let command = match self.feed.release_deadline() {
                Some(deadline) => {
                    let timeout = deadline.saturating_duration_since(Instant::now());
                    match self.rx.recv_timeout(timeout) {
                        Ok(command) => command,
                        Err(RecvTimeoutError::Timeout) => {
                            self.feed.release_expired();
                            continue;
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match self.rx.recv() {
                    Ok(command) => command,
                    Err(_) => break,
                },
            };

            if !self.handle(command) {
                break;
            }
        }

        info!("event=store_worker module=store status=stopped");
    }

    /// Returns `false` when the worker should stop.
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Insert { title, reply } => {
                let _ = reply.send(self.insert(title));
            }
            Command::Update { note, reply } => {
                let _ = reply.send(self.update(&note));
            }
            Command::Delete { id, reply } => {
                let _ = reply.send(self.delete(id));
            }
            Command::Subscribe { reply } => {
                let _ = reply.send(self.subscribe());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Wake => {}
            Command::Shutdown => return false,
        }
        true
    }

    fn repo(&mut self) -> SqliteNoteRepository<'_> {
        SqliteNoteRepository::new(&mut self.conn)
    }

    fn insert(&mut self, title: String) -> StoreResult<Option<Note>> {
        let started_at = Instant::now();
        let note = Note::new(self.ids.peek(), title);

        let result = self.repo().create_note(&note);
        if let Err(err) = result {
            error!(
                "event=note_insert module=store status=error id={} duration_ms={} error={}",
                note.id,
                started_at.elapsed().as_millis(),
                err
            );
            if matches!(err, RepoError::Db(_)) {
                self.reseed_ids();
            }
            return Err(err.into());
        }

        self.ids.advance();
        info!(
            "event=note_insert module=store status=ok id={} duration_ms={}",
            note.id,
            started_at.elapsed().as_millis()
        );
        self.refresh();
        Ok(Some(note))
    }

    /// Moves the sequence past ids issued by other writers of the same file.
    fn reseed_ids(&mut self) {
        let result = self.repo().next_unissued_id();
        match result {
            Ok(next) if next > self.ids.peek() => {
                warn!(
                    "event=id_sequence module=store status=reseeded from={} to={}",
                    self.ids.peek(),
                    next
                );
                self.ids = IdSequence::starting_at(next);
            }
            Ok(_) => {}
            Err(err) => {
                warn!("event=id_sequence module=store status=error error={err}");
            }
        }
    }

    fn update(&mut self, note: &Note) -> StoreResult<()> {
        let started_at = Instant::now();

        let result = self.repo().update_note_title(note);
        match result {
            Ok(true) => {
                info!(
                    "event=note_update module=store status=ok id={} duration_ms={}",
                    note.id,
                    started_at.elapsed().as_millis()
                );
                self.refresh();
                Ok(())
            }
            Ok(false) => {
                debug!(
                    "event=note_update module=store status=skipped id={} reason=unchanged",
                    note.id
                );
                Ok(())
            }
            Err(RepoError::NotFound(id)) => {
                warn!("event=note_update module=store status=not_found id={id}");
                Err(StoreError::NotFound(id))
            }
            Err(err) => {
                error!(
                    "event=note_update module=store status=error id={} duration_ms={} error={}",
                    note.id,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }

    fn delete(&mut self, id: NoteId) -> StoreResult<()> {
        let started_at = Instant::now();

        let result = self.repo().delete_note(id);
        match result {
            Ok(true) => {
                info!(
                    "event=note_delete module=store status=ok id={} duration_ms={}",
                    id,
                    started_at.elapsed().as_millis()
                );
                self.refresh();
                Ok(())
            }
            Ok(false) => {
                debug!("event=note_delete module=store status=skipped id={id} reason=absent");
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=note_delete module=store status=error id={} duration_ms={} error={}",
                    id,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }

    fn subscribe(&mut self) -> StoreResult<Subscription> {
        if let Some(subscription) = self.feed.attach_retained() {
            return Ok(subscription);
        }
        let snapshot = self.load()?;
        Ok(self.feed.attach(snapshot))
    }

    fn snapshot(&mut self) -> StoreResult<Snapshot> {
        if let Some(snapshot) = self.feed.retained() {
            return Ok(snapshot);
        }
        let snapshot = self.load()?;
        self.feed.retain(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    fn load(&mut self) -> StoreResult<Snapshot> {
        let notes = self.repo().list_notes()?;
        Ok(Snapshot::from(notes))
    }

    /// Re-ships the whole collection after a committed mutation.
    ///
    /// A failed read-back leaves the mutation committed; the retained
    /// snapshot is dropped so the next reader queries the store again.
    fn refresh(&mut self) {
        if !self.feed.is_observed() {
            debug!("event=feed_refresh module=store status=skipped reason=unobserved");
            return;
        }

        let started_at = Instant::now();
        match self.load() {
            Ok(snapshot) => {
                let notes = snapshot.len();
                let delivered = self.feed.publish(snapshot);
                debug!(
                    "event=feed_refresh module=store status=ok notes={} subscribers={} duration_ms={}",
                    notes,
                    delivered,
                    started_at.elapsed().as_millis()
                );
            }
            Err(err) => {
                error!(
                    "event=feed_refresh module=store status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                self.feed.invalidate();
            }
        }
    }
}
