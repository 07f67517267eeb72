//! Persistent note store with live subscription.
//!
//! # Responsibility
//! - Accept insert/update/delete requests and queue them on the persistence
//!   worker without blocking the caller.
//! - Serve reads from the feed's latest value, falling back to one query on
//!   the worker when nothing is retained.
//!
//! # Invariants
//! - Blank titles never reach the worker: blank inserts and edits are no-ops.
//! - Mutations are applied one at a time, in submission order.
//! - Persistence failures are reported through `Pending::wait`, never dropped.

mod worker;

use crate::config::StoreConfig;
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::feed::{NoteFeed, Snapshot, Subscription, SubscriptionId};
use crate::model::note::{normalize_title, Note, NoteId};
use crate::repo::note_repo::{NoteRepository, RepoError, SqliteNoteRepository};
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use worker::{Command, IdSequence, Reply, Worker};

const WORKER_THREAD_NAME: &str = "notes-store";

pub type StoreResult<T> = Result<T, StoreError>;

/// Error surfaced by store operations.
#[derive(Debug)]
pub enum StoreError {
    /// `update` targeted an id that is not persisted.
    NotFound(NoteId),
    /// The storage medium failed; the mutation may not have been applied.
    Persistence(RepoError),
    /// The persistence worker has stopped.
    Closed,
    /// The persistence worker thread could not be started.
    Spawn(std::io::Error),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::Persistence(err) => write!(f, "note persistence failed: {err}"),
            Self::Closed => write!(f, "note store is closed"),
            Self::Spawn(err) => write!(f, "failed to start note store worker: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Persistence(err) => Some(err),
            Self::Spawn(err) => Some(err),
            Self::NotFound(_) | Self::Closed => None,
        }
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            other => Self::Persistence(other),
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Persistence(RepoError::Db(value))
    }
}

/// Completion ticket for a queued store request.
///
/// Dropping it leaves the request running; `wait` blocks for its outcome.
#[derive(Debug)]
pub struct Pending<T> {
    rx: Receiver<StoreResult<T>>,
}

impl<T> Pending<T> {
    fn ready(result: StoreResult<T>) -> Self {
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(result);
        Self { rx }
    }

    /// Blocks until the worker has applied the request.
    ///
    /// Returns `Closed` when the worker stopped before answering.
    pub fn wait(self) -> StoreResult<T> {
        self.rx.recv().unwrap_or(Err(StoreError::Closed))
    }
}

/// Handle to one note store: a database, a persistence worker and a feed.
///
/// All methods take `&self`; share the store across threads with `Arc`.
pub struct NoteStore {
    commands: Sender<Command>,
    feed: Arc<NoteFeed>,
    worker: Option<JoinHandle<()>>,
}

impl NoteStore {
    /// Opens (and migrates) the configured database and starts the worker.
    ///
    /// The id sequence is seeded past every id ever issued by this database.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let started_at = Instant::now();
        let mut conn = match config.db_path.as_deref() {
            Some(path) => open_db(path)?,
            None => open_db_in_memory()?,
        };
        let next_id = SqliteNoteRepository::new(&mut conn).next_unissued_id()?;

        let (commands, rx) = mpsc::channel();
        let waker = commands.clone();
        let feed = NoteFeed::with_waker(
            config.idle_grace,
            Box::new(move || {
                let _ = waker.send(Command::Wake);
            }),
        );
        let worker = Worker::new(
            conn,
            rx,
            Arc::clone(&feed),
            IdSequence::starting_at(next_id),
        );
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker.run())
            .map_err(StoreError::Spawn)?;

        info!(
            "event=store_open module=store status=ok next_id={} idle_grace_ms={} duration_ms={}",
            next_id,
            config.idle_grace.as_millis(),
            started_at.elapsed().as_millis()
        );
        Ok(Self {
            commands,
            feed,
            worker: Some(handle),
        })
    }

    /// Opens a store backed by a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open(&StoreConfig::in_memory())
    }

    /// Queues creation of a note with the trimmed `title`.
    ///
    /// Resolves to `None` without touching storage when the title is blank.
    pub fn insert(&self, title: impl AsRef<str>) -> Pending<Option<Note>> {
        let Some(title) = normalize_title(title.as_ref()) else {
            debug!("event=note_insert module=store status=skipped reason=blank_title");
            return Pending::ready(Ok(None));
        };
        self.submit(|reply| Command::Insert { title, reply })
    }

    /// Queues replacement of the title stored for `note.id`.
    ///
    /// The title is trimmed; a blank edit is discarded. Resolves to
    /// `NotFound` when the id is not persisted.
    pub fn update(&self, note: &Note) -> Pending<()> {
        let Some(title) = normalize_title(&note.title) else {
            debug!(
                "event=note_update module=store status=skipped id={} reason=blank_title",
                note.id
            );
            return Pending::ready(Ok(()));
        };
        let note = note.with_title(title);
        self.submit(|reply| Command::Update { note, reply })
    }

    /// Queues removal of `note`. Deleting an absent note succeeds.
    pub fn delete(&self, note: &Note) -> Pending<()> {
        let id = note.id;
        self.submit(|reply| Command::Delete { id, reply })
    }

    /// Returns the current collection in insertion order.
    ///
    /// Served from the retained snapshot when one is held; otherwise queued
    /// behind pending mutations and answered by the worker.
    pub fn list_all(&self) -> StoreResult<Snapshot> {
        if let Some(snapshot) = self.feed.retained() {
            return Ok(snapshot);
        }
        self.submit(|reply| Command::Snapshot { reply }).wait()
    }

    /// Subscribes to the collection.
    ///
    /// The returned handle already carries the current collection; a
    /// retained snapshot is reused without querying the store.
    pub fn subscribe(&self) -> StoreResult<Subscription> {
        if let Some(subscription) = self.feed.attach_retained() {
            return Ok(subscription);
        }
        self.submit(|reply| Command::Subscribe { reply }).wait()
    }

    /// Detaches a subscriber by id. Unknown or expired ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.feed.detach(id);
    }

    /// Number of subscribers currently attached.
    pub fn subscriber_count(&self) -> usize {
        self.feed.subscriber_count()
    }

    /// Stops the worker after every queued request has been applied.
    pub fn close(mut self) -> StoreResult<()> {
        self.shutdown()
    }

    fn submit<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Pending<T> {
        let (reply, rx) = mpsc::channel();
        if self.commands.send(build(reply)).is_err() {
            warn!("event=store_submit module=store status=error error_code=worker_closed");
        }
        // A rejected command drops its reply sender, so `wait` yields `Closed`.
        Pending { rx }
    }

    fn shutdown(&mut self) -> StoreResult<()> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };

        let _ = self.commands.send(Command::Shutdown);
        handle.join().map_err(|_| {
            error!("event=store_close module=store status=error error_code=worker_panicked");
            StoreError::Closed
        })?;

        info!("event=store_close module=store status=ok");
        Ok(())
    }
}

impl Drop for NoteStore {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::NoteStore;
    use crate::config::StoreConfig;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn grace_timer_fires_after_caller_side_detach() {
        let store = NoteStore::open(
            &StoreConfig::in_memory().with_idle_grace(Duration::from_millis(200)),
        )
        .unwrap();
        store.insert("cached").wait().unwrap();
        drop(store.subscribe().unwrap());
        assert!(store.feed.release_deadline().is_some());

        // `release_deadline` only reads; nothing here releases on access.
        let give_up = Instant::now() + Duration::from_secs(5);
        while store.feed.release_deadline().is_some() && Instant::now() < give_up {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(store.feed.release_deadline().is_none());
    }
}
