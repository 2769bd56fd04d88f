use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::interval;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::source::ConfigSource;
use super::sync::SyncStats;
use super::ConfigCache;
use crate::constants::PollerType;
use crate::metrics::CONFIG_SYNC_DURATION_SECONDS;
use crate::metrics::CONFIG_SYNC_TOTAL;
use crate::metrics::POLLER_QUEUE_SIZE;
use crate::utils::time::get_now_as_i64;
use crate::Error;
use crate::Result;

/// Periodic synchronizer: fetches rows off the async runtime, then applies them under the
/// cache lock. A failed fetch never touches the cache.
pub struct ConfigSyncer {
    cache: Arc<ConfigCache>,
    source: Arc<dyn ConfigSource>,
    period: Duration,
}

impl ConfigSyncer {
    pub fn new(
        cache: Arc<ConfigCache>,
        source: Arc<dyn ConfigSource>,
        period: Duration,
    ) -> Self {
        Self { cache, source, period }
    }

    /// Runs one pass.
    pub async fn sync_once(&self) -> Result<SyncStats> {
        let source = self.source.clone();
        let fetched = tokio::task::spawn_blocking(move || source.fetch()).await?;
        let rows = match fetched {
            Ok(rows) => rows,
            Err(e) => {
                CONFIG_SYNC_TOTAL.with_label_values(&["failed"]).inc();
                return Err(e);
            }
        };

        let stats = self.cache.sync(&rows, get_now_as_i64());

        CONFIG_SYNC_TOTAL.with_label_values(&["ok"]).inc();
        CONFIG_SYNC_DURATION_SECONDS.observe(stats.duration.as_secs_f64());
        self.report_queue_sizes();
        Ok(stats)
    }

    fn report_queue_sizes(&self) {
        let stats = self.cache.lock().stats();
        for poller_type in PollerType::ALL {
            POLLER_QUEUE_SIZE
                .with_label_values(&[poller_type.as_str()])
                .set(stats.queues[poller_type.index()] as i64);
        }
    }

    /// Syncs at startup and then every period until the shutdown signal fires.
    pub async fn run(
        self,
        mut shutdown_signal: watch::Receiver<()>,
    ) -> Result<()> {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_signal.changed() => {
                    info!("config syncer received shutdown signal");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    match self.sync_once().await {
                        Ok(stats) => debug!(
                            "sync pass {} done: {} changes in {:?}",
                            stats.revision,
                            stats.total_changes(),
                            stats.duration
                        ),
                        Err(Error::Source(e)) if e.is_connection_down() => {
                            warn!("configuration source unavailable, retrying next period: {}", e);
                        }
                        Err(Error::TaskFailed(e)) => {
                            error!("configuration fetch task failed: {}", e);
                        }
                        Err(e) => {
                            error!("sync pass aborted: {}", e);
                        }
                    }
                }
            }
        }
    }
}
