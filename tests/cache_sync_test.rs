mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use monitor_cache::cache::ConfigCache;
use monitor_cache::cache::ConfigSyncer;
use monitor_cache::cache::FileConfigSource;
use monitor_cache::config::Settings;
use monitor_cache::constants::PollerType;
use monitor_cache::utils::time::get_now_as_i64;
use monitor_cache::Error;

use crate::common::enable_logger;
use crate::common::write_rows;

fn syncer_for(
    cache: Arc<ConfigCache>,
    path: &Path,
) -> ConfigSyncer {
    ConfigSyncer::new(cache, Arc::new(FileConfigSource::new(path)), Duration::from_secs(60))
}

#[tokio::test]
async fn test_sync_from_file_populates_cache() {
    enable_logger();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rows.json");
    write_rows(&path);

    let cache = Arc::new(ConfigCache::new(&Settings::default()));
    let stats = syncer_for(cache.clone(), &path).sync_once().await.unwrap();
    assert_eq!(stats.get("items").map(|s| s.inserted), Some(3));

    let state = cache.lock();
    let counts = state.stats();
    assert_eq!(counts.hosts, 1);
    assert_eq!(counts.items, 3);
    assert_eq!(counts.triggers, 1);
    assert_eq!(counts.queues[PollerType::Normal.index()], 2);

    let item = state.get_item_by_key("web-01", "agent.ping").unwrap();
    assert_eq!(item.itemid, 102);
    assert_eq!(state.get_host_by_name("web-01").map(|h| h.hostid), Some(1));
}

#[tokio::test]
async fn test_second_identical_pass_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rows.json");
    write_rows(&path);

    let cache = Arc::new(ConfigCache::new(&Settings::default()));
    let syncer = syncer_for(cache.clone(), &path);
    syncer.sync_once().await.unwrap();
    let before = cache.lock().stats();

    let stats = syncer.sync_once().await.unwrap();
    assert_eq!(stats.get("items").map(|s| (s.inserted, s.removed)), Some((0, 0)));
    assert_eq!(cache.lock().stats(), before);
}

#[tokio::test]
async fn test_missing_source_keeps_cache_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(ConfigCache::new(&Settings::default()));
    let revision = cache.revision();

    let result = syncer_for(cache.clone(), &dir.path().join("absent.json")).sync_once().await;

    match result {
        Err(Error::Source(e)) => assert!(e.is_connection_down()),
        other => panic!("expected connection down, got {:?}", other.map(|s| s.revision)),
    }
    assert_eq!(cache.revision(), revision);
    assert_eq!(cache.lock().stats().items, 0);
}

#[tokio::test]
async fn test_claimed_items_leave_the_queue() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rows.json");
    write_rows(&path);

    let cache = Arc::new(ConfigCache::new(&Settings::default()));
    syncer_for(cache.clone(), &path).sync_once().await.unwrap();

    let mut state = cache.lock();
    let claimed = state.get_items_for_poller(PollerType::Normal, get_now_as_i64() + 3600);
    assert_eq!(claimed.len(), 1);
    assert_eq!(state.stats().queues[PollerType::Normal.index()], 1);
}
