//! In-memory configuration cache.
//!
//! All tables, indices and scheduling queues live in one [`CacheState`] behind a single
//! mutex. [`ConfigCache::lock`] hands out the guard; every query and mutation is a method
//! on the guarded state, and the lock is released when the guard goes out of scope.

mod availability;
mod model;
mod poller;
mod queries;
mod queue;
mod rows;
mod schedule;
mod snapshot;
mod source;
mod state;
mod strpool;
mod sync;
mod syncer;
mod topology;
mod triggers;

pub use availability::*;
pub use model::ItemLocation;
pub use poller::*;
pub use rows::*;
pub use schedule::poller_by_item;
pub use snapshot::*;
pub use source::*;
pub use state::CacheState;
pub use strpool::PooledStr;
pub use strpool::StringPool;
pub use sync::KindStats;
pub use sync::SyncStats;
pub use syncer::*;
pub use triggers::TriggerLock;

#[cfg(test)]
mod strpool_test;
#[cfg(test)]
mod sync_test;
#[cfg(test)]
mod syncer_test;

use parking_lot::Mutex;
use parking_lot::MutexGuard;

use crate::config::CacheConfig;
use crate::config::PollerConfig;
use crate::config::Settings;

pub struct ConfigCache {
    state: Mutex<CacheState>,
}

impl ConfigCache {
    pub fn new(settings: &Settings) -> Self {
        Self::with_config(settings.cache.clone(), settings.pollers.clone())
    }

    pub fn with_config(
        cache_config: CacheConfig,
        poller_config: PollerConfig,
    ) -> Self {
        Self {
            state: Mutex::new(CacheState::new(cache_config, poller_config)),
        }
    }

    /// Blocks until the cache lock is acquired.
    pub fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock()
    }

    /// Applies one fetched row set while holding the lock for the whole pass.
    pub fn sync(
        &self,
        rows: &ConfigRows,
        now: i64,
    ) -> SyncStats {
        self.lock().sync(rows, now)
    }

    pub fn revision(&self) -> u64 {
        self.lock().revision()
    }
}
