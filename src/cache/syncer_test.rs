use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tokio::time::timeout;

use super::*;
use crate::config::CacheConfig;
use crate::config::PollerConfig;
use crate::test_utils::*;
use crate::Error;
use crate::SourceError;

fn test_cache() -> Arc<ConfigCache> {
    Arc::new(ConfigCache::with_config(CacheConfig::default(), PollerConfig::default()))
}

#[tokio::test]
async fn test_sync_once_applies_fetched_rows() {
    let mut source = MockConfigSource::new();
    source.expect_fetch().times(1).returning(|| Ok(sample_rows()));
    let cache = test_cache();
    let syncer = ConfigSyncer::new(cache.clone(), Arc::new(source), Duration::from_secs(60));

    let stats = syncer.sync_once().await.unwrap();

    assert_eq!(stats.get("hosts").map(|s| s.inserted), Some(2));
    assert_eq!(stats.revision, cache.revision());
    assert_eq!(cache.lock().stats().items, 4);
}

#[tokio::test]
async fn test_failed_fetch_leaves_cache_untouched() {
    let mut source = MockConfigSource::new();
    source
        .expect_fetch()
        .times(1)
        .returning(|| Err(SourceError::ConnectionDown("database is down".to_string()).into()));
    let cache = test_cache();
    let syncer = ConfigSyncer::new(cache.clone(), Arc::new(source), Duration::from_secs(60));

    match syncer.sync_once().await {
        Err(Error::Source(e)) => assert!(e.is_connection_down()),
        other => panic!("expected source error, got {:?}", other.map(|s| s.revision)),
    }
    assert_eq!(cache.revision(), 0);
}

#[tokio::test]
async fn test_run_syncs_until_shutdown() {
    let mut source = MockConfigSource::new();
    source.expect_fetch().returning(|| Ok(sample_rows()));
    let cache = test_cache();
    let syncer = ConfigSyncer::new(cache.clone(), Arc::new(source), Duration::from_secs(3600));

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let handle = tokio::spawn(syncer.run(shutdown_rx));

    timeout(Duration::from_secs(5), async {
        while cache.revision() == 0 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(cache.lock().stats().hosts, 2);

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}
