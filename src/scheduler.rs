//! Periodic TTL sweeper: deletes objects whose TTL has passed, then prunes
//! empty directories from the blob backend. Ticks never overlap — the next
//! one only starts once the previous has finished.

use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;

use crate::blob::Blob;
use crate::metadata::Store;
use crate::service::destroyer::destroy_object;

pub const DEFAULT_CADENCE: Duration = Duration::from_secs(30);

/// Runs the sweep loop until the process exits. Intended to be spawned as
/// its own task; never returns under normal operation.
pub async fn run(store: Store, blob: Blob, cadence: Duration) {
    let mut ticker = interval(cadence);
    loop {
        ticker.tick().await;
        let store = store.clone();
        let blob = blob.clone();
        if let Err(err) = tokio::task::spawn_blocking(move || sweep(&store, &blob)).await {
            tracing::error!(error = %err, "ttl sweeper task panicked");
        }
    }
}

/// One sweep: expire due objects, then clean up empty directories.
/// Any error aborts the current tick — it is logged and the next tick
/// resumes from scratch, never propagating to the request path.
pub fn sweep(store: &Store, blob: &Blob) {
    if let Err(err) = sweep_expired(store, blob) {
        tracing::warn!(error = %err, "ttl sweep tick failed");
        return;
    }

    if let Err(err) = blob.cleanup() {
        tracing::warn!(error = %err, "ttl sweep cleanup failed");
    }
}

fn sweep_expired(store: &Store, blob: &Blob) -> anyhow::Result<()> {
    let now = Utc::now();
    for object in store.all_objects()? {
        let Some(ttl) = object.ttl else { continue };
        if ttl > now {
            continue;
        }

        let Some(container) = store.find_container(&object.container_id)? else { continue };

        destroy_object(store, blob, &container, &object)?;
        tracing::info!(container = %container.name, key = %object.key, "expired object swept");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Container, Object};
    use chrono::Duration as ChronoDuration;

    fn setup() -> (Store, Blob, tempfile::TempDir, tempfile::TempDir) {
        let db_dir = tempfile::tempdir().unwrap();
        let blob_dir = tempfile::tempdir().unwrap();
        let store = Store::open(db_dir.path().join("db")).unwrap();
        let blob = Blob::new(blob_dir.path());
        (store, blob, db_dir, blob_dir)
    }

    #[test]
    fn sweep_removes_expired_objects_but_keeps_future_ttl() {
        let (store, blob, _d1, _d2) = setup();
        let mut container = Container { name: "bucket".into(), ..Default::default() };
        store.save_container(&mut container).unwrap();

        blob.writer("bucket", "expired.txt").unwrap();
        blob.writer("bucket", "alive.txt").unwrap();

        let mut expired = Object {
            container_id: container.id.clone(),
            key: "expired.txt".into(),
            ttl: Some(Utc::now() - ChronoDuration::seconds(1)),
            ..Default::default()
        };
        store.save_object(&mut expired).unwrap();

        let mut alive = Object {
            container_id: container.id.clone(),
            key: "alive.txt".into(),
            ttl: Some(Utc::now() + ChronoDuration::hours(1)),
            ..Default::default()
        };
        store.save_object(&mut alive).unwrap();

        sweep(&store, &blob);

        assert!(store.find_object(&expired.id).unwrap().is_none());
        assert!(store.find_object(&alive.id).unwrap().is_some());
        assert!(!blob.exists("bucket", "expired.txt"));
        assert!(blob.exists("bucket", "alive.txt"));
    }

    #[test]
    fn sweep_tolerates_no_expired_objects() {
        let (store, blob, _d1, _d2) = setup();
        sweep(&store, &blob);
    }
}
