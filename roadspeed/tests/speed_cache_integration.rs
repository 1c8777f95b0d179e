//! Integration tests for the speed cache.
//!
//! These drive `SpeedCache` through its public API with a manual clock and
//! both bundled stores.
//!
//! Run with: `cargo test --test speed_cache_integration`

use std::sync::Arc;

use roadspeed::codec;
use roadspeed::geo::{bucket_of, quantize};
use roadspeed::{
    FileStore, InvalidateAction, LoadOutcome, ManualClock, MemoryStore, SnapshotStore,
    SpeedCache, SpeedCacheConfig,
};

const T0: i64 = 1_700_000_000;

fn memory_cache(config: SpeedCacheConfig) -> (SpeedCache, Arc<ManualClock>, Arc<MemoryStore>) {
    let clock = Arc::new(ManualClock::new(T0));
    let store = Arc::new(MemoryStore::new());
    let cache = SpeedCache::open(config, store.clone(), clock.clone());
    (cache, clock, store)
}

#[test]
fn test_drive_past_remembered_slowdown() {
    let (cache, clock, _store) = memory_cache(SpeedCacheConfig::default());

    cache.add_sample(37.5, 127.0, 90.0, 15.0);
    clock.advance(121);

    // The projected point lands one cell south-east of the sample, so only
    // the neighbor scan can reach it.
    let value = cache.query_target_by_distance(37.49991, 127.0, 90.0, 10.0, true);
    assert_eq!(value, 15.0);

    let hit = cache.last_hit().unwrap();
    assert_eq!(hit.cell, quantize(37.5, 127.0));
    assert_eq!(hit.bucket, bucket_of(90.0));
    assert_eq!(hit.read_at, T0 + 121);
}

#[test]
fn test_opposite_heading_elsewhere_finds_nothing() {
    let (cache, clock, _store) = memory_cache(SpeedCacheConfig::default());
    cache.add_sample(37.5, 127.0, 90.0, 15.0);
    clock.advance(1_000);

    assert_eq!(cache.query_target(37.6, 127.1, 270.0, 20.0, 2.0, true), 0.0);
    assert!(cache.last_hit().is_none());
}

#[test]
fn test_neighbor_fallback_can_be_disabled() {
    let (cache, clock, _store) = memory_cache(SpeedCacheConfig::default());
    cache.add_sample(37.5, 127.0, 90.0, 15.0);
    clock.advance(121);

    assert_eq!(
        cache.query_target_by_distance(37.49991, 127.0, 90.0, 10.0, false),
        0.0
    );
}

#[test]
fn test_adjacent_heading_bucket_is_used() {
    let (cache, clock, _store) = memory_cache(SpeedCacheConfig::default());
    cache.add_sample(37.5, 127.0, 50.0, -6.0);
    clock.advance(300);

    // Heading 95 is bucket 2, the sample sits in bucket 1
    assert_eq!(
        cache.query_target_by_distance(37.5, 127.0, 95.0, 0.0, false),
        -6.0
    );
}

#[test]
fn test_recency_gate() {
    let (cache, clock, _store) = memory_cache(SpeedCacheConfig::default());
    cache.add_sample(37.5, 127.0, 90.0, 15.0);

    clock.advance(119);
    assert_eq!(cache.query_target_by_distance(37.5, 127.0, 90.0, 0.0, true), 0.0);

    clock.advance(2);
    assert_eq!(cache.query_target_by_distance(37.5, 127.0, 90.0, 0.0, true), 15.0);
}

#[test]
fn test_merge_cruise_then_decel() {
    let (cache, _clock, _store) = memory_cache(SpeedCacheConfig::default());
    let cell = quantize(37.5, 127.0);
    let bucket = bucket_of(90.0);

    cache.add_sample(37.5, 127.0, 90.0, 5.0);
    cache.add_sample(37.5, 127.0, 90.0, 7.0);
    assert_eq!(cache.slot(&cell, bucket).map(|e| e.value), Some(6.0));

    cache.add_sample(37.5, 127.0, 90.0, -3.0);
    let entry = cache.slot(&cell, bucket).unwrap();
    assert_eq!(entry.value, -3.0);
    assert_eq!(entry.timestamp, T0);
}

#[test]
fn test_invalidate_window() {
    let (cache, clock, _store) = memory_cache(SpeedCacheConfig::default());
    let cell = quantize(37.5, 127.0);
    let bucket = bucket_of(90.0);

    cache.add_sample(37.5, 127.0, 90.0, 15.0);
    clock.advance(200);
    assert_eq!(cache.query_target_by_distance(37.5, 127.0, 90.0, 0.0, true), 15.0);

    clock.advance(3);
    assert!(!cache.invalidate_last_hit_default(InvalidateAction::Clear));
    assert!(cache.slot(&cell, bucket).is_some());

    assert_eq!(cache.query_target_by_distance(37.5, 127.0, 90.0, 0.0, true), 15.0);
    clock.advance(1);
    assert!(cache.invalidate_last_hit_default(InvalidateAction::Clear));
    assert!(cache.slot(&cell, bucket).is_none());
}

#[test]
fn test_restart_through_memory_store() {
    let (cache, clock, store) = memory_cache(SpeedCacheConfig::default());
    cache.add_sample(37.5, 127.0, 90.0, 15.0);
    cache.add_sample(37.5, 127.0, 180.0, -4.5);
    assert!(cache.maybe_save_default().unwrap());
    let before = cache.snapshot();
    drop(cache);

    let stored = store.get("SpeedTable").unwrap().unwrap();
    assert!(codec::is_gzip(&stored));

    let (reopened, outcome) =
        SpeedCache::open_with_outcome(SpeedCacheConfig::default(), store, clock);
    assert_eq!(
        outcome,
        LoadOutcome::Restored {
            cells: 1,
            repaired_cells: 0
        }
    );
    assert_eq!(reopened.snapshot(), before);
}

#[test]
fn test_restart_through_file_store() {
    let temp = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(T0));

    for use_gzip in [true, false] {
        let config = SpeedCacheConfig::default().with_gzip(use_gzip);
        let store = Arc::new(FileStore::new(temp.path()));
        let cache = SpeedCache::new(config.clone(), store, clock.clone());
        cache.add_sample(37.5, 127.0, 90.0, 15.0);
        cache.add_sample(37.51, 127.02, 0.0, 22.0);
        cache.close();

        let raw = std::fs::read(temp.path().join("SpeedTable")).unwrap();
        assert_eq!(codec::is_gzip(&raw), use_gzip);

        let store = Arc::new(FileStore::new(temp.path()));
        let reopened = SpeedCache::open(config, store, clock.clone());
        assert_eq!(reopened.snapshot(), cache.snapshot());
    }
}

#[test]
fn test_plain_snapshot_is_read_with_gzip_enabled() {
    let temp = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(T0));

    let writer = SpeedCache::new(
        SpeedCacheConfig::default().with_gzip(false),
        Arc::new(FileStore::new(temp.path())),
        clock.clone(),
    );
    writer.add_sample(37.5, 127.0, 90.0, 15.0);
    writer.close();

    let reader = SpeedCache::open(
        SpeedCacheConfig::default(),
        Arc::new(FileStore::new(temp.path())),
        clock,
    );
    assert_eq!(reader.cell_count(), 1);
}

#[test]
fn test_foreign_snapshot_is_purged() {
    let clock = Arc::new(ManualClock::new(T0));
    let store = Arc::new(MemoryStore::with_entry(
        "SpeedTable",
        br#"{"format":"v4","dir_buckets":16,"cells":{}}"#.to_vec(),
    ));

    let (cache, outcome) =
        SpeedCache::open_with_outcome(SpeedCacheConfig::default(), store.clone(), clock);
    assert!(matches!(outcome, LoadOutcome::Incompatible(_)));
    assert_eq!(cache.cell_count(), 0);
    assert!(store.get("SpeedTable").unwrap().is_none());
}

#[test]
fn test_malformed_cell_is_repaired() {
    let clock = Arc::new(ManualClock::new(T0));
    let payload = br#"{"format":"v4","dir_buckets":8,"cells":{
        "375000,1270000":[[1.0,5]],
        "375001,1270000":[[2.0,5],[null,null],[null,null],[null,null],
                          [null,null],[null,null],[null,null],[null,null]]
    }}"#;
    let store = Arc::new(MemoryStore::with_entry("SpeedTable", payload.to_vec()));

    let (cache, outcome) =
        SpeedCache::open_with_outcome(SpeedCacheConfig::default(), store, clock);
    assert_eq!(
        outcome,
        LoadOutcome::Restored {
            cells: 2,
            repaired_cells: 1
        }
    );
    let stats = cache.stats();
    assert_eq!(stats.cells, 2);
    assert_eq!(stats.populated_slots, 1);
}

#[test]
fn test_custom_storage_key() {
    let config = SpeedCacheConfig::default().with_storage_key("Ramp");
    let (cache, _clock, store) = memory_cache(config);
    cache.add_sample(37.5, 127.0, 90.0, 15.0);
    cache.save().unwrap();

    assert!(store.contains("Ramp"));
    assert!(!store.contains("SpeedTable"));
}
