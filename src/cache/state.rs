//! Primary tables, secondary indices and scheduling queues of the configuration cache.
//!
//! `CacheState` is only reachable through the guard returned by `ConfigCache::lock`, so every
//! method here runs with the cache lock held; `&mut self` gives the synchronizer and the
//! mutation API exclusive access without any re-entrancy bookkeeping.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use super::model::*;
use super::queue::default_order;
use super::queue::java_order;
use super::queue::pinger_order;
use super::queue::proxy_order;
use super::queue::IndexedHeap;
use super::queue::ItemQueueKey;
use super::strpool::StringPool;
use crate::config::CacheConfig;
use crate::config::PollerConfig;
use crate::constants::InterfaceType;
use crate::constants::PollerType;

/// Resume point of one timer worker walking its trigger bucket.
#[derive(Debug, Default)]
pub struct TimerCursor {
    pub position: usize,
    /// Triggers handed out by the previous call, unlocked on the next one
    pub locked: Vec<u64>,
}

pub struct CacheState {
    pub(crate) pool: StringPool,
    pub(crate) cache_config: CacheConfig,
    pub(crate) poller_config: PollerConfig,
    pub(crate) config: GlobalConfig,

    pub(crate) hosts: HashMap<u64, Host>,
    pub(crate) hosts_by_name: HashMap<Arc<str>, u64>,
    pub(crate) proxies_by_name: HashMap<Arc<str>, u64>,
    pub(crate) psks: HashMap<Arc<str>, Psk>,
    pub(crate) proxies: HashMap<u64, Proxy>,
    pub(crate) inventories: HashMap<u64, HostInventory>,
    pub(crate) host_templates: HashMap<u64, Vec<u64>>,

    pub(crate) gmacros: HashMap<u64, GlobalMacro>,
    pub(crate) gmacros_by_name: HashMap<Arc<str>, Vec<u64>>,
    pub(crate) hmacros: HashMap<u64, HostMacro>,
    pub(crate) hmacros_by_host: HashMap<(u64, Arc<str>), Vec<u64>>,

    pub(crate) interfaces: HashMap<u64, Interface>,
    pub(crate) interfaces_by_host_type: HashMap<(u64, InterfaceType), u64>,

    pub(crate) items: HashMap<u64, Item>,
    pub(crate) items_by_host_key: HashMap<u64, HashMap<Arc<str>, u64>>,
    pub(crate) item_ext: HashMap<u64, ItemExt>,
    pub(crate) logitems: HashMap<u64, LogItem>,
    /// master itemid -> dependent itemids
    pub(crate) dependent_items: HashMap<u64, Vec<u64>>,

    pub(crate) triggers: HashMap<u64, Trigger>,
    pub(crate) trigdeps: HashMap<u64, TriggerDep>,
    /// triggerid -> triggers it depends on
    pub(crate) trigger_deps: HashMap<u64, Vec<u64>>,
    pub(crate) functions: HashMap<u64, Function>,
    /// triggerid -> functionids, rebuilt with the item -> trigger links
    pub(crate) trigger_functions: HashMap<u64, Vec<u64>>,
    pub(crate) timer_triggers: Vec<Vec<u64>>,
    pub(crate) timer_cursors: Vec<TimerCursor>,

    pub(crate) expressions: HashMap<u64, Expression>,
    pub(crate) regexps: HashMap<Arc<str>, Vec<u64>>,
    pub(crate) actions: HashMap<u64, Action>,
    pub(crate) conditions: HashMap<u64, Condition>,

    pub(crate) queues: Vec<IndexedHeap<ItemQueueKey>>,
    pub(crate) proxy_queue: IndexedHeap<i64>,

    /// Bumped after every completed sync pass
    pub(crate) revision: u64,
    pub(crate) last_sync: i64,
}

impl CacheState {
    pub fn new(
        cache_config: CacheConfig,
        poller_config: PollerConfig,
    ) -> Self {
        let timer_forks = cache_config.timer_forks.max(1);
        let queues = PollerType::ALL
            .iter()
            .map(|poller_type| match poller_type {
                PollerType::Pinger => IndexedHeap::new(pinger_order),
                PollerType::Java => IndexedHeap::new(java_order),
                _ => IndexedHeap::new(default_order),
            })
            .collect();

        Self {
            pool: StringPool::new(),
            cache_config,
            poller_config,
            config: GlobalConfig::default(),
            hosts: HashMap::new(),
            hosts_by_name: HashMap::new(),
            proxies_by_name: HashMap::new(),
            psks: HashMap::new(),
            proxies: HashMap::new(),
            inventories: HashMap::new(),
            host_templates: HashMap::new(),
            gmacros: HashMap::new(),
            gmacros_by_name: HashMap::new(),
            hmacros: HashMap::new(),
            hmacros_by_host: HashMap::new(),
            interfaces: HashMap::new(),
            interfaces_by_host_type: HashMap::new(),
            items: HashMap::new(),
            items_by_host_key: HashMap::new(),
            item_ext: HashMap::new(),
            logitems: HashMap::new(),
            dependent_items: HashMap::new(),
            triggers: HashMap::new(),
            trigdeps: HashMap::new(),
            trigger_deps: HashMap::new(),
            functions: HashMap::new(),
            trigger_functions: HashMap::new(),
            timer_triggers: vec![Vec::new(); timer_forks],
            timer_cursors: (0..timer_forks).map(|_| TimerCursor::default()).collect(),
            expressions: HashMap::new(),
            regexps: HashMap::new(),
            actions: HashMap::new(),
            conditions: HashMap::new(),
            queues,
            proxy_queue: IndexedHeap::new(proxy_order),
            revision: 0,
            last_sync: 0,
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn queue_mut(
        &mut self,
        poller_type: PollerType,
    ) -> &mut IndexedHeap<ItemQueueKey> {
        &mut self.queues[poller_type.index()]
    }

    pub(crate) fn queue(
        &self,
        poller_type: PollerType,
    ) -> &IndexedHeap<ItemQueueKey> {
        &self.queues[poller_type.index()]
    }
}

/// Get-or-create with a found flag.
pub(crate) fn find_or_insert<T>(
    table: &mut HashMap<u64, T>,
    id: u64,
    create: impl FnOnce() -> T,
) -> (&mut T, bool) {
    match table.entry(id) {
        Entry::Occupied(e) => (e.into_mut(), true),
        Entry::Vacant(e) => (e.insert(create()), false),
    }
}

/// Ids live in `table` but absent from the rows seen this pass, in ascending order.
pub(crate) fn absent_ids<T>(
    table: &HashMap<u64, T>,
    mut seen: Vec<u64>,
) -> Vec<u64> {
    seen.sort_unstable();
    seen.dedup();
    let mut absent: Vec<u64> = table
        .keys()
        .filter(|id| seen.binary_search(id).is_err())
        .copied()
        .collect();
    absent.sort_unstable();
    absent
}

/// Removes `key` from a name index only when it still maps to `id`.
pub(crate) fn remove_index_entry<K>(
    index: &mut HashMap<K, u64>,
    key: &K,
    id: u64,
) where
    K: std::hash::Hash + Eq,
{
    if index.get(key) == Some(&id) {
        index.remove(key);
    }
}
