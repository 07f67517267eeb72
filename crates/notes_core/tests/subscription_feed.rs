use notes_core::{Note, NoteStore, Snapshot, StoreConfig, StoreError};
use rusqlite::Connection;
use std::path::Path;
use std::thread;
use std::time::Duration;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn titles(snapshot: &Snapshot) -> Vec<&str> {
    snapshot.iter().map(|note| note.title.as_str()).collect()
}

#[test]
fn subscriber_receives_initial_value_then_one_snapshot_per_mutation() {
    let store = NoteStore::open_in_memory().unwrap();
    let mut subscription = store.subscribe().unwrap();
    assert!(subscription.snapshot().is_empty());

    let a = store.insert("a").wait().unwrap().unwrap();
    store.insert("b").wait().unwrap();
    store.update(&a.with_title("a2")).wait().unwrap();
    store.delete(&a).wait().unwrap();

    let received: Vec<Vec<String>> = (0..4)
        .map(|_| {
            subscription
                .recv_timeout(RECV_TIMEOUT)
                .unwrap()
                .iter()
                .map(|note| note.title.clone())
                .collect()
        })
        .collect();
    assert_eq!(
        received,
        vec![
            vec!["a".to_string()],
            vec!["a".to_string(), "b".to_string()],
            vec!["a2".to_string(), "b".to_string()],
            vec!["b".to_string()],
        ]
    );
    assert!(subscription.try_recv().is_none());
    assert_eq!(titles(subscription.snapshot()), ["b"]);
}

#[test]
fn no_op_mutations_emit_nothing() {
    let store = NoteStore::open_in_memory().unwrap();
    let note = store.insert("only").wait().unwrap().unwrap();
    let mut subscription = store.subscribe().unwrap();

    store.insert("").wait().unwrap();
    store.insert("   ").wait().unwrap();
    store.update(&note.with_title("only")).wait().unwrap();
    store.update(&note.with_title(" ")).wait().unwrap();
    store.delete(&Note::new(404, "absent")).wait().unwrap();

    assert!(subscription.try_recv().is_none());

    store.delete(&note).wait().unwrap();
    let last = subscription.recv_timeout(RECV_TIMEOUT).unwrap();
    assert!(last.is_empty());
    assert!(subscription.try_recv().is_none());
}

#[test]
fn late_subscriber_gets_current_collection() {
    let store = NoteStore::open_in_memory().unwrap();
    store.insert("Buy milk").wait().unwrap();
    store.insert("Call mom").wait().unwrap();

    let subscription = store.subscribe().unwrap();
    assert_eq!(titles(subscription.snapshot()), ["Buy milk", "Call mom"]);
}

#[test]
fn every_subscriber_gets_its_own_stream() {
    let store = NoteStore::open_in_memory().unwrap();
    let mut first = store.subscribe().unwrap();
    let mut second = store.subscribe().unwrap();
    assert_ne!(first.id(), second.id());
    assert_eq!(store.subscriber_count(), 2);

    store.insert("shared").wait().unwrap();

    assert_eq!(titles(&first.recv_timeout(RECV_TIMEOUT).unwrap()), ["shared"]);
    assert_eq!(titles(&second.recv_timeout(RECV_TIMEOUT).unwrap()), ["shared"]);
}

#[test]
fn subscriber_on_another_thread_sees_cumulative_state_in_order() {
    let store = NoteStore::open_in_memory().unwrap();
    let mut subscription = store.subscribe().unwrap();

    let consumer = thread::spawn(move || {
        (0..10)
            .map(|_| subscription.recv_timeout(RECV_TIMEOUT).unwrap().len())
            .collect::<Vec<_>>()
    });

    for index in 0..10 {
        let _ = store.insert(format!("note {index}"));
    }

    let lengths = consumer.join().unwrap();
    assert_eq!(lengths, (1..=10).collect::<Vec<_>>());
}

#[test]
fn unsubscribe_is_idempotent_and_stops_delivery() {
    let store = NoteStore::open_in_memory().unwrap();
    let mut subscription = store.subscribe().unwrap();
    let id = subscription.id();

    store.unsubscribe(id);
    store.unsubscribe(id);
    subscription.unsubscribe();
    subscription.unsubscribe();
    assert_eq!(store.subscriber_count(), 0);

    store.insert("unseen").wait().unwrap();
    assert!(subscription.try_recv().is_none());
}

#[test]
fn dropped_subscription_detaches() {
    let store = NoteStore::open_in_memory().unwrap();
    let subscription = store.subscribe().unwrap();
    assert_eq!(store.subscriber_count(), 1);

    drop(subscription);
    assert_eq!(store.subscriber_count(), 0);
    store.insert("nobody listening").wait().unwrap();
}

#[test]
fn resubscribe_within_grace_window_reuses_retained_snapshot() {
    let store = NoteStore::open(&StoreConfig::in_memory().with_idle_grace(Duration::from_secs(60)))
        .unwrap();
    store.insert("cached").wait().unwrap();

    let first = store.subscribe().unwrap();
    drop(first);

    // Mutations during the grace window keep the retained snapshot current.
    store.insert("while idle").wait().unwrap();

    let second = store.subscribe().unwrap();
    assert_eq!(titles(second.snapshot()), ["cached", "while idle"]);
}

fn break_notes_table(path: &Path) {
    let saboteur = Connection::open(path).unwrap();
    saboteur.execute_batch("DROP TABLE notes;").unwrap();
}

#[test]
fn subscribe_within_grace_window_does_not_query_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.sqlite3");
    let store =
        NoteStore::open(&StoreConfig::file(&path).with_idle_grace(Duration::from_secs(60))).unwrap();
    store.insert("cached").wait().unwrap();
    drop(store.subscribe().unwrap());

    break_notes_table(&path);

    let subscription = store.subscribe().unwrap();
    assert_eq!(titles(subscription.snapshot()), ["cached"]);
}

#[test]
fn retained_snapshot_is_released_after_grace_window() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.sqlite3");
    let store =
        NoteStore::open(&StoreConfig::file(&path).with_idle_grace(Duration::from_millis(20)))
            .unwrap();
    store.insert("kept in store").wait().unwrap();
    drop(store.subscribe().unwrap());

    thread::sleep(Duration::from_millis(200));
    break_notes_table(&path);

    let err = store.subscribe().unwrap_err();
    assert!(matches!(err, StoreError::Persistence(_)));
    assert_eq!(store.subscriber_count(), 0);
}

#[test]
fn closing_the_store_ends_subscriptions() {
    let store = NoteStore::open_in_memory().unwrap();
    let mut subscription = store.subscribe().unwrap();
    store.insert("last").wait().unwrap();
    store.close().unwrap();

    assert_eq!(titles(&subscription.recv_timeout(RECV_TIMEOUT).unwrap()), ["last"]);
    assert!(subscription.recv().is_none());
}

#[test]
fn snapshots_serialize_as_plain_json() {
    let store = NoteStore::open_in_memory().unwrap();
    store.insert("Buy milk").wait().unwrap();

    let json = serde_json::to_value(store.list_all().unwrap().to_vec()).unwrap();
    assert_eq!(json, serde_json::json!([{ "id": 1, "title": "Buy milk" }]));
}
