//! Coordinator integration tests: boot paths, drift detection, failure
//! isolation, the removal pass, and the fallback mirror invariant.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use common::{stored_record, MemoryStore};
use dove_dns::{Coordinator, FileStore, ZoneStore, ZoneTable};

const ZONE: &str = "dove.test.";
const REFRESH: Duration = Duration::from_secs(1);

async fn file_store(dir: &tempfile::TempDir) -> Arc<FileStore> {
    Arc::new(FileStore::open(dir.path()).await.unwrap())
}

fn coordinator(
    primary: Arc<MemoryStore>,
    fallback: Arc<FileStore>,
    table: ZoneTable,
) -> Coordinator {
    Coordinator::new(primary, fallback, table, REFRESH)
}

#[tokio::test]
async fn boot_from_primary_populates_table_and_mirror() {
    let dir = tempfile::tempdir().unwrap();
    let primary = MemoryStore::new();
    let fallback = file_store(&dir).await;
    let table = ZoneTable::new();

    primary.add_zone(ZONE).await.unwrap();
    primary
        .patch(ZONE, stored_record("test1", "@ 300 IN A 1.2.3.4", ZONE))
        .await
        .unwrap();
    primary
        .patch(ZONE, stored_record("test2", "foo 300 IN A 1.2.3.5", ZONE))
        .await
        .unwrap();

    coordinator(primary, fallback.clone(), table.clone())
        .bootstrap()
        .await;

    let zone = table.get(ZONE).expect("zone not loaded");
    assert_eq!(zone.records.len(), 2);
    assert!(zone.change_token.is_some());

    // Mirror invariant: the fallback file holds exactly the live records.
    let mirrored = fallback.load(ZONE).await.unwrap();
    let mut live_ids: Vec<_> = zone.records.iter().map(|r| r.id.clone()).collect();
    let mut mirror_ids: Vec<_> = mirrored.records.iter().map(|r| r.id.clone()).collect();
    live_ids.sort();
    mirror_ids.sort();
    assert_eq!(live_ids, mirror_ids);
}

#[tokio::test]
async fn boot_from_fallback_when_primary_down() {
    let dir = tempfile::tempdir().unwrap();
    let primary = MemoryStore::new();
    let fallback = file_store(&dir).await;
    let table = ZoneTable::new();

    fallback
        .patch(ZONE, stored_record("test1", "@ 300 IN A 1.2.3.4", ZONE))
        .await
        .unwrap();
    primary.set_unreachable(true);

    coordinator(primary, fallback, table.clone()).bootstrap().await;

    let zone = table.get(ZONE).expect("zone not loaded from fallback");
    assert_eq!(zone.records.len(), 1);
    assert!(zone.change_token.is_none());
}

#[tokio::test]
async fn boot_with_both_stores_down_serves_empty_table() {
    let dir = tempfile::tempdir().unwrap();
    let primary = MemoryStore::new();
    let fallback = file_store(&dir).await;
    let table = ZoneTable::new();

    primary.set_unreachable(true);

    coordinator(primary, fallback, table.clone()).bootstrap().await;
    assert!(table.is_empty());
}

#[tokio::test]
async fn refresh_skips_current_zones() {
    let dir = tempfile::tempdir().unwrap();
    let primary = MemoryStore::new();
    let fallback = file_store(&dir).await;
    let table = ZoneTable::new();

    primary.add_zone(ZONE).await.unwrap();
    primary
        .patch(ZONE, stored_record("test1", "@ 300 IN A 1.2.3.4", ZONE))
        .await
        .unwrap();

    let coordinator = coordinator(primary.clone(), fallback, table.clone());
    coordinator.bootstrap().await;
    assert_eq!(primary.load_count(ZONE), 1);

    // Nothing changed: the change token still matches, no reload.
    coordinator.refresh().await.unwrap();
    coordinator.refresh().await.unwrap();
    assert_eq!(primary.load_count(ZONE), 1);
}

#[tokio::test]
async fn refresh_reloads_on_drift() {
    let dir = tempfile::tempdir().unwrap();
    let primary = MemoryStore::new();
    let fallback = file_store(&dir).await;
    let table = ZoneTable::new();

    primary.add_zone(ZONE).await.unwrap();
    primary
        .patch(ZONE, stored_record("test1", "@ 300 IN A 1.2.3.4", ZONE))
        .await
        .unwrap();

    let coordinator = coordinator(primary.clone(), fallback.clone(), table.clone());
    coordinator.bootstrap().await;

    primary
        .patch(ZONE, stored_record("test2", "foo 300 IN A 1.2.3.5", ZONE))
        .await
        .unwrap();
    coordinator.refresh().await.unwrap();

    let zone = table.get(ZONE).unwrap();
    assert_eq!(zone.records.len(), 2);
    assert_eq!(primary.load_count(ZONE), 2);

    // Deletes propagate to the mirror through the full rewrite.
    primary.delete(ZONE, "test2").await.unwrap();
    coordinator.refresh().await.unwrap();
    assert_eq!(table.get(ZONE).unwrap().records.len(), 1);
    assert_eq!(fallback.load(ZONE).await.unwrap().records.len(), 1);
}

#[tokio::test]
async fn empty_zone_loads_once_and_stays_current() {
    let dir = tempfile::tempdir().unwrap();
    let primary = MemoryStore::new();
    let fallback = file_store(&dir).await;
    let table = ZoneTable::new();

    // Declared but never written: no records, no change token.
    primary.add_zone(ZONE).await.unwrap();

    let coordinator = coordinator(primary.clone(), fallback, table.clone());
    coordinator.bootstrap().await;

    let zone = table.get(ZONE).expect("empty zone should still be served");
    assert!(zone.records.is_empty());
    assert_eq!(primary.load_count(ZONE), 1);

    // An empty snapshot of a token-less zone counts as current.
    coordinator.refresh().await.unwrap();
    assert_eq!(primary.load_count(ZONE), 1);
}

#[tokio::test]
async fn load_failure_keeps_prior_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let primary = MemoryStore::new();
    let fallback = file_store(&dir).await;
    let table = ZoneTable::new();

    primary.add_zone(ZONE).await.unwrap();
    primary
        .patch(ZONE, stored_record("test1", "@ 300 IN A 1.2.3.4", ZONE))
        .await
        .unwrap();

    let coordinator = coordinator(primary.clone(), fallback, table.clone());
    coordinator.bootstrap().await;

    // New write marks the zone stale, but the reload now fails.
    primary
        .patch(ZONE, stored_record("test2", "foo 300 IN A 1.2.3.5", ZONE))
        .await
        .unwrap();
    primary.poison_zone(ZONE);
    coordinator.refresh().await.unwrap();

    let zone = table.get(ZONE).expect("prior snapshot must survive");
    assert_eq!(zone.records.len(), 1);
    assert_eq!(zone.records[0].id, "test1");
}

#[tokio::test]
async fn outage_during_refresh_keeps_serving() {
    let dir = tempfile::tempdir().unwrap();
    let primary = MemoryStore::new();
    let fallback = file_store(&dir).await;
    let table = ZoneTable::new();

    primary.add_zone(ZONE).await.unwrap();
    primary
        .patch(ZONE, stored_record("test1", "@ 300 IN A 1.2.3.4", ZONE))
        .await
        .unwrap();

    let coordinator = coordinator(primary.clone(), fallback, table.clone());
    coordinator.bootstrap().await;

    primary.set_unreachable(true);
    assert!(coordinator.refresh().await.is_err());

    // The snapshot survives the failed pass.
    assert_eq!(table.get(ZONE).unwrap().records.len(), 1);
}

#[tokio::test]
async fn removed_zone_is_dropped_and_listener_sees_it() {
    let dir = tempfile::tempdir().unwrap();
    let primary = MemoryStore::new();
    let fallback = file_store(&dir).await;
    let table = ZoneTable::new();

    primary.add_zone(ZONE).await.unwrap();
    primary.add_zone("other.test.").await.unwrap();
    primary
        .patch(ZONE, stored_record("test1", "@ 300 IN A 1.2.3.4", ZONE))
        .await
        .unwrap();

    let events: Arc<Mutex<Vec<(String, bool)>>> = Arc::new(Mutex::new(Vec::new()));
    let listener_events = events.clone();
    let coordinator = Coordinator::new(primary.clone(), fallback, table.clone(), REFRESH)
        .with_listener(Arc::new(move |zone, snapshot| {
            listener_events
                .lock()
                .unwrap()
                .push((zone.to_string(), snapshot.is_some()));
        }));

    coordinator.bootstrap().await;
    assert_eq!(table.zone_count(), 2);

    primary.remove_zone("other.test.").await.unwrap();
    coordinator.refresh().await.unwrap();

    assert_eq!(table.zone_count(), 1);
    assert!(table.get("other.test.").is_none());

    let events = events.lock().unwrap();
    // Publishes first (bootstrap), then the removal observed by refresh.
    assert_eq!(events.first().map(|(_, published)| *published), Some(true));
    assert_eq!(
        events.last().cloned(),
        Some(("other.test.".to_string(), false))
    );
}

#[tokio::test]
async fn run_loop_stops_on_cancel() {
    let dir = tempfile::tempdir().unwrap();
    let primary = MemoryStore::new();
    let fallback = file_store(&dir).await;
    let table = ZoneTable::new();

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(
        coordinator(primary, fallback, table).run(cancel.clone()),
    );

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("coordinator did not stop on cancel")
        .unwrap();
}
