//! Poller-facing operations: claiming due items, requeueing results, adaptive SNMP bulk
//! sizing and the proxy poller queue.

use tracing::trace;

use super::availability::AvailabilityDiff;
use super::model::ItemLocation;
use super::model::QueuePriority;
use super::queue::ItemQueueKey;
use super::snapshot::ItemSnapshot;
use super::snapshot::ProxySnapshot;
use super::state::CacheState;
use crate::constants::CheckResult;
use crate::constants::HostStatus;
use crate::constants::ItemState;
use crate::constants::PollerType;
use crate::constants::CHECK_TIMEOUT;
use crate::constants::ITEM_FLAG_DISCOVERY_RULE;
use crate::constants::JAN_2038;
use crate::constants::MAX_JAVA_ITEMS;
use crate::constants::MAX_PINGER_ITEMS;
use crate::constants::MAX_SNMP_ITEMS;
use crate::utils::interval::calculate_proxy_nextcheck;

/// Result of one check as reported back by a poller.
#[derive(Debug, Clone, PartialEq)]
pub struct RequeueItem {
    pub itemid: u64,
    pub state: ItemState,
    pub lastclock: i64,
    pub result: CheckResult,
    /// Error text recorded against the host when the check failed on the network level
    pub error: Option<String>,
}

/// What a proxy poller exchanged with a passive proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProxyRequeue {
    pub config_sent: bool,
    pub data_received: bool,
}

/// Items a batch may continue with after its first item.
fn continues_batch(
    poller_type: PollerType,
    first: &ItemQueueKey,
    next: &ItemQueueKey,
) -> bool {
    match poller_type {
        PollerType::Java => first.interfaceid == next.interfaceid && first.credentials == next.credentials,
        PollerType::Pinger => true,
        _ => first.snmp.is_some() && first.snmp == next.snmp,
    }
}

impl CacheState {
    /// Claims due items of one poller class.
    ///
    /// Items of hosts in a retry backoff are moved to the unreachable poller or postponed
    /// instead of being handed out; claimed items stay out of the queue until requeued.
    pub fn get_items_for_poller(
        &mut self,
        poller_type: PollerType,
        now: i64,
    ) -> Vec<ItemSnapshot> {
        let mut batch = Vec::new();
        let mut first: Option<ItemQueueKey> = None;
        let mut max_items = match poller_type {
            PollerType::Java => MAX_JAVA_ITEMS,
            PollerType::Pinger => MAX_PINGER_ITEMS,
            _ => 1,
        };

        while batch.len() < max_items {
            let Some((itemid, key)) = self.queue(poller_type).peek_min().map(|(id, key)| (id, key.clone())) else {
                break;
            };
            if key.nextcheck > now {
                break;
            }
            if let Some(first) = &first {
                if !continues_batch(poller_type, first, &key) {
                    break;
                }
            }

            self.queue_mut(poller_type).pop_min();
            let Some(item) = self.items.get_mut(&itemid) else {
                continue;
            };
            item.location = ItemLocation::Nowhere;
            let hostid = item.hostid;
            let item_type = item.item_type;
            let not_supported = item.state == ItemState::NotSupported;
            let class = item_type.agent_class();

            if not_supported && self.config.refresh_unsupported == 0 {
                continue;
            }
            let Some(host) = self.hosts.get(&hostid) else {
                continue;
            };
            if host.status != HostStatus::Monitored {
                continue;
            }

            if host.in_nodata_maintenance() {
                self.requeue_item(itemid, false, now, now);
                continue;
            }

            let disable_until = class
                .map(|class| host.agent(class))
                .filter(|agent| agent.errors_from != 0)
                .map_or(0, |agent| agent.disable_until);

            if disable_until == 0 {
                if poller_type == PollerType::Unreachable {
                    self.requeue_item(itemid, false, now, now);
                    continue;
                }
            } else if matches!(poller_type, PollerType::Normal | PollerType::Ipmi | PollerType::Java) {
                let old_poller = Some(poller_type);
                let nextcheck = match self.items.get(&itemid) {
                    Some(item) if disable_until > now => self.unreachable_nextcheck(item, host, now),
                    Some(item) => item.nextcheck,
                    None => continue,
                };
                if let Some(item) = self.items.get_mut(&itemid) {
                    item.poller_type = Some(PollerType::Unreachable);
                    item.nextcheck = nextcheck;
                }
                self.update_item_queue(itemid, old_poller);
                continue;
            } else if disable_until > now {
                self.requeue_item(itemid, true, now, now);
                continue;
            } else if let Some(class) = class {
                if let Some(host) = self.hosts.get_mut(&hostid) {
                    host.agent_mut(class).disable_until = now + CHECK_TIMEOUT;
                }
            }

            let Some(snapshot) = self.claim_item(itemid) else {
                continue;
            };

            if first.is_none() {
                if poller_type == PollerType::Normal
                    && item_type.is_snmp()
                    && snapshot.flags & ITEM_FLAG_DISCOVERY_RULE == 0
                {
                    max_items = self.suggested_snmp_vars(snapshot.interfaceid);
                }
                first = Some(key);
            }
            batch.push(snapshot);
        }

        trace!("{} poller claimed {} items", poller_type.as_str(), batch.len());
        batch
    }

    fn claim_item(
        &mut self,
        itemid: u64,
    ) -> Option<ItemSnapshot> {
        let item = self.items.get_mut(&itemid)?;
        item.location = ItemLocation::Poller;
        self.item_snapshot(itemid)
    }

    /// Returns polled items to their queues and records host availability.
    pub fn requeue_items(
        &mut self,
        results: &[RequeueItem],
        now: i64,
    ) -> Vec<AvailabilityDiff> {
        let mut diffs = Vec::new();

        for result in results {
            let Some(item) = self.items.get_mut(&result.itemid) else {
                continue;
            };
            if item.location == ItemLocation::Poller {
                item.location = ItemLocation::Nowhere;
            }
            item.state = result.state;
            item.lastclock = result.lastclock;
            let hostid = item.hostid;
            let class = item.item_type.agent_class();

            if result.result.is_reachable() {
                item.queue_priority = QueuePriority::Normal;
                if let Some(diff) = class.and_then(|class| self.activate_host(hostid, class, now)) {
                    diffs.push(diff);
                }
                self.requeue_item(result.itemid, false, result.lastclock, now);
            } else {
                item.queue_priority = QueuePriority::Low;
                let error = result.error.as_deref().unwrap_or("");
                if let Some(diff) = class.and_then(|class| self.deactivate_host(hostid, class, now, error)) {
                    diffs.push(diff);
                }
                self.requeue_item(result.itemid, true, now, now);
            }
        }

        diffs
    }

    /// Nextcheck of the head of a poller queue, `JAN_2038` when the queue is empty.
    pub fn get_poller_nextcheck(
        &self,
        poller_type: PollerType,
    ) -> i64 {
        self.queue(poller_type)
            .peek_min()
            .map_or(JAN_2038, |(_, key)| key.nextcheck)
    }

    /// Number of variables to put into the next bulk request on an interface.
    ///
    /// Grows by half while the agent keeps up, then settles just under the smallest
    /// request size known to fail.
    pub fn suggested_snmp_vars(
        &self,
        interfaceid: u64,
    ) -> usize {
        let Some(interface) = self.interfaces.get(&interfaceid) else {
            return 1;
        };
        if !interface.bulk {
            return 1;
        }

        let max_succeed = interface.max_snmp_succeed;
        let min_fail = interface.min_snmp_fail;
        let num = if max_succeed <= 1 {
            max_succeed + 1
        } else {
            max_succeed * 3 / 2
        };

        let num = if num < min_fail {
            num
        } else {
            (max_succeed - 2).max(min_fail - 1)
        };
        num.clamp(1, MAX_SNMP_ITEMS) as usize
    }

    /// Records the outcome of a bulk request. Only widens the known-good size and narrows
    /// the known-bad size.
    pub fn update_interface_snmp_stats(
        &mut self,
        interfaceid: u64,
        max_snmp_succeed: i32,
        min_snmp_fail: i32,
    ) {
        let Some(interface) = self.interfaces.get_mut(&interfaceid) else {
            return;
        };
        if !interface.bulk {
            return;
        }
        if interface.max_snmp_succeed < max_snmp_succeed {
            interface.max_snmp_succeed = max_snmp_succeed;
        }
        if interface.min_snmp_fail > min_snmp_fail {
            interface.min_snmp_fail = min_snmp_fail;
        }
    }

    /// Claims passive proxies due for a config push or data poll.
    pub fn get_proxypoller_hosts(
        &mut self,
        max_hosts: usize,
        now: i64,
    ) -> Vec<ProxySnapshot> {
        let mut proxies = Vec::new();

        while proxies.len() < max_hosts {
            let Some((hostid, nextcheck)) = self.proxy_queue.peek_min().map(|(id, key)| (id, *key)) else {
                break;
            };
            if nextcheck > now {
                break;
            }
            self.proxy_queue.pop_min();

            let Some(proxy) = self.proxies.get_mut(&hostid) else {
                continue;
            };
            proxy.location = ItemLocation::Poller;
            proxies.push(ProxySnapshot {
                hostid,
                config_nextcheck: proxy.config_nextcheck,
                data_nextcheck: proxy.data_nextcheck,
                timediff: proxy.timediff,
                lastaccess: proxy.lastaccess,
            });
        }

        proxies
    }

    pub fn get_proxypoller_nextcheck(&self) -> i64 {
        self.proxy_queue.peek_min().map_or(JAN_2038, |(_, nextcheck)| *nextcheck)
    }

    /// Returns a claimed proxy to the queue, advancing the exchanges it just completed.
    pub fn requeue_proxy(
        &mut self,
        hostid: u64,
        done: ProxyRequeue,
        now: i64,
    ) {
        let config_frequency = self.cache_config.proxyconfig_frequency;
        let data_frequency = self.cache_config.proxydata_frequency;
        let passive = self
            .hosts
            .get(&hostid)
            .is_some_and(|host| host.status == HostStatus::ProxyPassive);
        let Some(proxy) = self.proxies.get_mut(&hostid) else {
            return;
        };

        if done.config_sent {
            proxy.config_nextcheck = calculate_proxy_nextcheck(hostid, config_frequency, now);
        }
        if done.data_received {
            proxy.data_nextcheck = calculate_proxy_nextcheck(hostid, data_frequency, now);
        }

        if proxy.location == ItemLocation::Poller {
            proxy.location = ItemLocation::Nowhere;
        }
        if passive {
            self.proxy_queue.insert(hostid, proxy.nextcheck());
            proxy.location = ItemLocation::Queued;
        }
    }

    pub fn update_proxy_lastaccess(
        &mut self,
        hostid: u64,
        lastaccess: i64,
    ) {
        if let Some(proxy) = self.proxies.get_mut(&hostid) {
            proxy.lastaccess = lastaccess;
        }
    }

    /// Records the proxy clock offset used to skew nextcheck of its hosts' items.
    pub fn set_proxy_timediff(
        &mut self,
        hostid: u64,
        timediff: i64,
    ) {
        if let Some(proxy) = self.proxies.get_mut(&hostid) {
            proxy.timediff = timediff;
        }
    }
}
