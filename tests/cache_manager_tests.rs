//! Integration Tests for the Cache Manager
//!
//! Exercises the public API end to end over in-memory and file-backed media
//! with a manually driven clock.

use std::sync::Arc;

use offline_cache::cache::ManualClock;
use offline_cache::persistence::SNAPSHOT_VERSION;
use offline_cache::{
    CacheConfig, CacheManager, FileStorage, KeyValueStorage, MemoryStorage, OfflineAction,
    SetOptions, SyncOutcome,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};

// == Helper Functions ==

const START: u64 = 1_754_000_000_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    name: String,
}

fn build(storage: &MemoryStorage, clock: &ManualClock, config: CacheConfig) -> CacheManager {
    CacheManager::with_clock(config, Arc::new(storage.clone()), Arc::new(clock.clone())).unwrap()
}

fn setup() -> (CacheManager, MemoryStorage, ManualClock) {
    offline_cache::logging::init_tracing();
    let storage = MemoryStorage::new();
    let clock = ManualClock::new(START);
    let manager = build(&storage, &clock, CacheConfig::default());
    (manager, storage, clock)
}

fn persisted(storage: &MemoryStorage) -> Value {
    let raw = storage.get_item("offline-cache").unwrap().expect("snapshot written");
    serde_json::from_str(&raw).unwrap()
}

// == Basic Operations ==

#[tokio::test]
async fn test_user_scenario_with_all_transforms() {
    let (cache, _, clock) = setup();
    let user = User {
        name: "A".to_string(),
    };
    let options = SetOptions::ttl(1000).with_compress(true).with_encrypt(true);

    assert_ok!(cache.set("user:1", &user, options).await);
    assert_eq!(cache.get::<User>("user:1").await, Some(user));

    clock.advance(1001);
    assert_eq!(cache.get::<User>("user:1").await, None);
    assert_eq!(cache.size().await, 0);
    assert!(!cache.keys().await.contains(&"user:1".to_string()));
}

#[tokio::test]
async fn test_expiry_removes_entry() {
    let (cache, storage, clock) = setup();

    cache.set("k", "v", SetOptions::ttl(100)).await.unwrap();
    clock.advance(150);

    assert_eq!(cache.get::<String>("k").await, None);
    assert!(!cache.has("k").await);
    assert!(persisted(&storage)["entries"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_access_accounting() {
    let (cache, _, _) = setup();

    cache.set("k", &json!({"n": 1}), SetOptions::default()).await.unwrap();
    for _ in 0..3 {
        assert!(cache.get::<Value>("k").await.is_some());
    }

    assert_eq!(cache.inspect_entry("k").await.unwrap().access_count, 3);
    let stats = cache.get_stats().await;
    assert_eq!(stats.average_access_count, 3.0);
    assert_eq!(stats.hits, 3);
}

#[tokio::test]
async fn test_delete_reports_presence() {
    let (cache, _, _) = setup();

    cache.set("k", &1, SetOptions::default()).await.unwrap();
    assert!(cache.delete("k").await);
    assert!(!cache.delete("k").await);
}

#[tokio::test]
async fn test_set_rejects_empty_key() {
    let (cache, _, _) = setup();
    assert_err!(cache.set("", "v", SetOptions::default()).await);
}

#[tokio::test]
async fn test_clear_is_idempotent() {
    let (cache, storage, _) = setup();
    cache.set("a", &1, SetOptions::default()).await.unwrap();
    cache.set("b", &2, SetOptions::default()).await.unwrap();

    for _ in 0..2 {
        cache.clear().await;
        assert_eq!(cache.size().await, 0);
        let snapshot = persisted(&storage);
        assert_eq!(snapshot["version"], SNAPSHOT_VERSION);
        assert!(snapshot["entries"].as_array().unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_stats_do_not_sweep() {
    let (cache, _, clock) = setup();
    cache
        .set("old", &1, SetOptions::ttl(10).with_compress(false).with_encrypt(false))
        .await
        .unwrap();
    clock.advance(5);
    cache.set("new", &2, SetOptions::default()).await.unwrap();
    clock.advance(100);

    let stats = cache.get_stats().await;
    assert_eq!(stats.total_entries, 2);
    assert_eq!(stats.oldest_entry, Some(START));
    assert_eq!(stats.newest_entry, Some(START + 5));
    assert_eq!(stats.compression_ratio, 0.5);
    assert_eq!(stats.encryption_ratio, 0.5);

    assert_eq!(cache.size().await, 1);
    assert_eq!(cache.get_stats().await.total_entries, 1);
}

#[tokio::test]
async fn test_invalidate_pattern_and_preload() {
    let (cache, _, _) = setup();
    for key in ["user:1", "user:2", "dashboard:main"] {
        cache.set(key, key, SetOptions::default()).await.unwrap();
    }

    let removed = cache.invalidate_pattern(&Regex::new(r"^user:\d+$").unwrap()).await;
    assert_eq!(removed, 2);

    let written = cache.preload(["dashboard:main", "user:1"]).await.unwrap();
    assert_eq!(written, 1);
    assert_eq!(
        cache.get::<String>("dashboard:main").await.as_deref(),
        Some("dashboard:main")
    );
    let placeholder: Value = cache.get("user:1").await.unwrap();
    assert_eq!(placeholder["preloaded"], true);
}

// == Persistence ==

#[tokio::test]
async fn test_persistence_survives_restart() {
    let (cache, storage, clock) = setup();
    let user = User {
        name: "Ada".to_string(),
    };
    cache.set("user:7", &user, SetOptions::default()).await.unwrap();
    drop(cache);

    let restarted = build(&storage, &clock, CacheConfig::default());
    assert_eq!(restarted.get::<User>("user:7").await, Some(user));
}

#[tokio::test]
async fn test_restart_with_other_passphrase_drops_unreadable_entries() {
    let (cache, storage, clock) = setup();
    cache.set("k", "v", SetOptions::default()).await.unwrap();

    let config = CacheConfig {
        encryption_key: Some("rotated".to_string()),
        ..CacheConfig::default()
    };
    let restarted = build(&storage, &clock, config);

    assert_eq!(restarted.get::<String>("k").await, None);
    assert!(restarted.inspect_entry("k").await.is_none());
}

#[tokio::test]
async fn test_corrupt_snapshot_starts_empty() {
    let storage = MemoryStorage::new();
    storage.set_item("offline-cache", "][").unwrap();

    let cache = build(&storage, &ManualClock::new(START), CacheConfig::default());
    assert_eq!(cache.size().await, 0);

    cache.set("k", &1, SetOptions::default()).await.unwrap();
    assert_eq!(persisted(&storage)["entries"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_full_medium_keeps_memory_authoritative() {
    let storage = MemoryStorage::with_capacity(64);
    let cache = build(&storage, &ManualClock::new(START), CacheConfig::default());

    cache.set("k", &"x".repeat(500), SetOptions::default()).await.unwrap();

    assert_eq!(cache.get::<String>("k").await, Some("x".repeat(500)));
    assert!(storage.get_item("offline-cache").unwrap().is_none());
}

#[tokio::test]
async fn test_file_storage_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(START);
    let open = || {
        let storage = FileStorage::open(dir.path()).unwrap();
        CacheManager::with_clock(
            CacheConfig::default(),
            Arc::new(storage),
            Arc::new(clock.clone()),
        )
        .unwrap()
    };

    let cache = open();
    cache.set("report:q3", &vec![1, 2, 3], SetOptions::default()).await.unwrap();
    drop(cache);

    let reopened = open();
    assert_eq!(reopened.get::<Vec<i32>>("report:q3").await, Some(vec![1, 2, 3]));
}

// == Eviction ==

#[tokio::test]
async fn test_eviction_removes_least_accessed_fifth() {
    let storage = MemoryStorage::new();
    let clock = ManualClock::new(START);
    let config = CacheConfig {
        // Ten 4-byte payloads
        max_size_bytes: 40,
        enable_compression: false,
        enable_encryption: false,
        ..CacheConfig::default()
    };
    let cache = build(&storage, &clock, config);

    for i in 0..10 {
        let key = format!("k{}", i);
        cache.set(&key, &format!("v{}", i), SetOptions::default()).await.unwrap();
        for _ in 0..(10 - i) {
            clock.advance(1);
            cache.get::<String>(&key).await;
        }
    }

    cache.set("extra", "vX", SetOptions::default()).await.unwrap();

    // k9 and k8 were read the fewest times
    let keys = cache.keys().await;
    assert!(!keys.contains(&"k9".to_string()));
    assert!(!keys.contains(&"k8".to_string()));
    assert_eq!(keys.len(), 9);
    assert_eq!(cache.get_stats().await.evictions, 2);
}

// == Offline Queue ==

#[tokio::test]
async fn test_offline_replay_preserves_order() {
    let (cache, _, clock) = setup();

    cache.add_to_offline_queue(OfflineAction::set("a", &1, SetOptions::default()).unwrap());
    clock.advance(1);
    cache.add_to_offline_queue(OfflineAction::set("b", &2, SetOptions::default()).unwrap());
    clock.advance(1);
    cache.add_to_offline_queue(OfflineAction::delete("a"));
    assert_eq!(cache.offline_queue_size(), 3);

    let outcome = cache.sync_offline_queue().await;
    let replayed: Vec<&str> = outcome.processed().iter().map(|i| i.action.tag()).collect();
    assert_eq!(replayed, vec!["SET", "SET", "DELETE"]);
    assert!(matches!(outcome, SyncOutcome::Completed { .. }));

    assert_eq!(cache.keys().await, vec!["b".to_string()]);
    assert_eq!(cache.offline_queue_size(), 0);
}

#[tokio::test]
async fn test_failed_replay_keeps_remainder() {
    let (cache, _, _) = setup();

    cache.add_to_offline_queue(OfflineAction::set("ok", &1, SetOptions::default()).unwrap());
    cache.add_to_offline_queue(OfflineAction::set("", &2, SetOptions::default()).unwrap());
    cache.add_to_offline_queue(OfflineAction::Clear);

    match cache.sync_offline_queue().await {
        SyncOutcome::Halted { processed, error } => {
            assert_eq!(processed.len(), 1);
            assert_eq!(error.action, "SET");
        }
        other => panic!("expected halted replay, got {:?}", other),
    }

    // The clear behind the failing item did not run
    assert_eq!(cache.offline_queue_size(), 2);
    assert!(cache.has("ok").await);

    // The blocking item stays first on the next pass
    assert!(matches!(
        cache.sync_offline_queue().await,
        SyncOutcome::Halted { ref processed, .. } if processed.is_empty()
    ));
}

#[tokio::test]
async fn test_oversized_replay_does_not_block_queue() {
    let storage = MemoryStorage::new();
    let config = CacheConfig {
        max_size_bytes: 64,
        enable_compression: false,
        enable_encryption: false,
        ..CacheConfig::default()
    };
    let cache = build(&storage, &ManualClock::new(START), config);

    let big = "x".repeat(200);
    cache.add_to_offline_queue(OfflineAction::set("big", &big, SetOptions::default()).unwrap());
    cache.add_to_offline_queue(OfflineAction::set("small", "ok", SetOptions::default()).unwrap());

    let outcome = cache.sync_offline_queue().await;
    assert!(matches!(outcome, SyncOutcome::Completed { .. }));
    assert_eq!(outcome.processed().len(), 2);
    assert_eq!(cache.offline_queue_size(), 0);

    // The oversized entry was the only eviction candidate for the next write
    assert!(cache.has("small").await);
    assert!(!cache.has("big").await);
}

#[tokio::test]
async fn test_oversized_set_is_stored() {
    let storage = MemoryStorage::new();
    let config = CacheConfig {
        max_size_bytes: 64,
        enable_compression: false,
        enable_encryption: false,
        ..CacheConfig::default()
    };
    let cache = build(&storage, &ManualClock::new(START), config);

    assert_ok!(cache.set("big", &"x".repeat(200), SetOptions::default()).await);
    assert_eq!(cache.get::<String>("big").await, Some("x".repeat(200)));
}

#[tokio::test]
async fn test_replayed_clear_empties_store() {
    let (cache, storage, _) = setup();
    cache.set("k", &1, SetOptions::default()).await.unwrap();

    cache.add_to_offline_queue(OfflineAction::Clear);
    cache.sync_offline_queue().await;

    assert_eq!(cache.size().await, 0);
    assert!(persisted(&storage)["entries"].as_array().unwrap().is_empty());
}
