//! Writes that miss their deadline must not become visible later.

mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use common::{new_zone, square};
use dangerzone_lib::{Error, SqliteBackend, StoreConfig, ZoneStore};
use tokio::sync::oneshot;

const DEADLINE: Duration = Duration::from_millis(200);
const LOCK_HELD_FOR: Duration = Duration::from_millis(1000);

async fn store_at(path: &Path) -> ZoneStore {
    let backend = SqliteBackend::open(path).await.unwrap();
    ZoneStore::new(
        Arc::new(backend),
        StoreConfig {
            operation_timeout: DEADLINE,
        },
    )
}

/// Hold the database write lock from a second connection for `LOCK_HELD_FOR`.
async fn hold_write_lock(path: PathBuf) -> JoinHandle<()> {
    let (locked_tx, locked_rx) = oneshot::channel();
    let holder = std::thread::spawn(move || {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch("BEGIN IMMEDIATE").unwrap();
        locked_tx.send(()).unwrap();
        std::thread::sleep(LOCK_HELD_FOR);
        conn.execute_batch("COMMIT").unwrap();
    });
    locked_rx.await.unwrap();
    holder
}

/// Wait for the lock holder, then give the abandoned write time to reach its commit.
async fn release(holder: JoinHandle<()>) {
    tokio::task::spawn_blocking(move || holder.join().unwrap())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn create_past_deadline_leaves_no_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zones.db");
    let store = store_at(&path).await;

    let holder = hold_write_lock(path.clone()).await;
    let err = store
        .create(new_zone("Ghost", square(0.0, 0.0, 1.0)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout { operation: "create", .. }));

    release(holder).await;
    assert!(store.list().await.unwrap().is_empty());

    // The database is usable again once the lock is gone.
    store
        .create(new_zone("Real", square(0.0, 0.0, 1.0)))
        .await
        .unwrap();
    assert_eq!(store.list().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delete_past_deadline_keeps_the_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zones.db");
    let store = store_at(&path).await;
    let zone = store
        .create(new_zone("Keep", square(0.0, 0.0, 1.0)))
        .await
        .unwrap();
    let id = zone.id.to_string();

    let holder = hold_write_lock(path.clone()).await;
    let err = store.delete_by_id(&id).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { operation: "delete", .. }));

    release(holder).await;
    assert_eq!(store.get(&id).await.unwrap(), zone);

    // A retry deletes it instead of reporting not found.
    assert_eq!(store.delete_by_id(&id).await.unwrap(), zone);
}
