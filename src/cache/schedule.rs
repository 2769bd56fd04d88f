//! Poller assignment, nextcheck calculation and queue membership of items.

use super::model::Host;
use super::model::Item;
use super::model::ItemExt;
use super::model::ItemLocation;
use super::queue::ItemQueueKey;
use super::queue::SnmpConnection;
use super::state::CacheState;
use crate::config::PollerConfig;
use crate::constants::HostStatus;
use crate::constants::ItemState;
use crate::constants::ItemStatus;
use crate::constants::ItemType;
use crate::constants::PollerType;
use crate::constants::ITEM_FLAG_DISCOVERY_PROTOTYPE;
use crate::utils::interval::calculate_item_nextcheck;
use crate::utils::interval::calculate_item_nextcheck_unreachable;
use crate::utils::item_key::is_icmpping;

/// Poller class that should handle an item, or `None` when nothing polls it.
pub fn poller_by_item(
    proxy_hostid: u64,
    item_type: ItemType,
    key: &str,
    pollers: &PollerConfig,
) -> Option<PollerType> {
    if proxy_hostid != 0
        && !matches!(item_type, ItemType::Internal | ItemType::Aggregate | ItemType::Calculated)
    {
        return None;
    }

    let poller_type = match item_type {
        ItemType::Simple if is_icmpping(key) => PollerType::Pinger,
        ItemType::ZabbixAgent
        | ItemType::SnmpV1
        | ItemType::SnmpV2c
        | ItemType::SnmpV3
        | ItemType::Internal
        | ItemType::Aggregate
        | ItemType::External
        | ItemType::DbMonitor
        | ItemType::Ssh
        | ItemType::Telnet
        | ItemType::Calculated
        | ItemType::Simple => PollerType::Normal,
        ItemType::Ipmi => PollerType::Ipmi,
        ItemType::Jmx => PollerType::Java,
        _ => return None,
    };

    (pollers.forks(poller_type) > 0).then_some(poller_type)
}

impl CacheState {
    /// Poller class for an item given its host's current availability.
    pub(crate) fn assign_poller(
        &self,
        item: &Item,
        host: &Host,
    ) -> Option<PollerType> {
        if item.status != ItemStatus::Active
            || host.status != HostStatus::Monitored
            || item.flags & ITEM_FLAG_DISCOVERY_PROTOTYPE != 0
        {
            return None;
        }

        let poller_type = poller_by_item(host.proxy_hostid, item.item_type, &item.key, &self.poller_config)?;
        let unreachable = item
            .item_type
            .agent_class()
            .is_some_and(|class| host.agent(class).errors_from != 0);

        match poller_type {
            PollerType::Normal | PollerType::Ipmi | PollerType::Java if unreachable => Some(PollerType::Unreachable),
            poller_type => Some(poller_type),
        }
    }

    /// Items sharing one interface for bulk SNMP or ICMP are scheduled on the same second.
    pub(crate) fn item_seed(
        &self,
        item: &Item,
    ) -> u64 {
        if item.interfaceid != 0 {
            let bulk_snmp = item.item_type.is_snmp()
                && self
                    .interfaces
                    .get(&item.interfaceid)
                    .is_some_and(|interface| interface.bulk);
            let icmp = item.item_type == ItemType::Simple && is_icmpping(&item.key);
            if bulk_snmp || icmp {
                return item.interfaceid;
            }
        }
        item.itemid
    }

    fn effective_delay(
        &self,
        item: &Item,
    ) -> i64 {
        if item.state == ItemState::NotSupported && self.config.refresh_unsupported > 0 {
            self.config.refresh_unsupported
        } else {
            item.delay
        }
    }

    pub(crate) fn reachable_nextcheck(
        &self,
        item: &Item,
        proxy_hostid: u64,
        now: i64,
    ) -> i64 {
        let seed = self.item_seed(item);
        let delay = self.effective_delay(item);
        let timediff = match proxy_hostid {
            0 => None,
            proxyid => self.proxies.get(&proxyid).map(|proxy| proxy.timediff),
        };

        let Some(timediff) = timediff else {
            return calculate_item_nextcheck(seed, item.item_type, delay, &item.flex, now);
        };
        calculate_item_nextcheck(seed, item.item_type, delay, &item.flex, now - timediff) + timediff + 1
    }

    /// Retry time after a failed check. Items without a retry deadline on their agent
    /// class (simple checks, SSH, external...) keep their regular schedule.
    pub(crate) fn unreachable_nextcheck(
        &self,
        item: &Item,
        host: &Host,
        now: i64,
    ) -> i64 {
        let disable_until = item
            .item_type
            .agent_class()
            .map_or(0, |class| host.agent(class).disable_until);
        if disable_until == 0 {
            return self.reachable_nextcheck(item, host.proxy_hostid, now);
        }
        calculate_item_nextcheck_unreachable(self.effective_delay(item), &item.flex, disable_until).max(now)
    }

    /// Re-evaluates poller assignment after a sync touched the item; nextcheck is
    /// recalculated when scheduling columns changed or the item just became pollable.
    pub(crate) fn schedule_item(
        &mut self,
        itemid: u64,
        reschedule: bool,
        now: i64,
    ) {
        let Some(item) = self.items.get(&itemid) else {
            return;
        };
        if item.location == ItemLocation::Poller {
            return;
        }
        let Some(host) = self.hosts.get(&item.hostid) else {
            return;
        };

        let old_poller = item.poller_type;
        let new_poller = self.assign_poller(item, host);
        let nextcheck = match new_poller {
            Some(poller_type) if reschedule || old_poller.is_none() => Some(match poller_type {
                PollerType::Unreachable => self.unreachable_nextcheck(item, host, now),
                _ => self.reachable_nextcheck(item, host.proxy_hostid, now),
            }),
            _ => None,
        };

        if let Some(item) = self.items.get_mut(&itemid) {
            item.poller_type = new_poller;
            if let Some(nextcheck) = nextcheck {
                item.nextcheck = nextcheck;
            }
        }
        self.update_item_queue(itemid, old_poller);
    }

    /// Puts a requeued item back on its poller queue after a check.
    pub(crate) fn requeue_item(
        &mut self,
        itemid: u64,
        unreachable: bool,
        clock: i64,
        now: i64,
    ) {
        let Some(item) = self.items.get(&itemid) else {
            return;
        };
        let Some(host) = self.hosts.get(&item.hostid) else {
            return;
        };

        let old_poller = item.poller_type;
        let new_poller = self.assign_poller(item, host);
        let nextcheck = if unreachable {
            self.unreachable_nextcheck(item, host, now)
        } else {
            self.reachable_nextcheck(item, host.proxy_hostid, clock)
        };

        if let Some(item) = self.items.get_mut(&itemid) {
            if item.location == ItemLocation::Poller {
                item.location = ItemLocation::Nowhere;
            }
            item.poller_type = new_poller;
            item.nextcheck = nextcheck;
        }
        self.update_item_queue(itemid, old_poller);
    }

    /// Keeps queue membership in step with `poller_type` and `nextcheck`. Items claimed
    /// by a poller are left alone until they are requeued.
    pub(crate) fn update_item_queue(
        &mut self,
        itemid: u64,
        old_poller: Option<PollerType>,
    ) {
        let Some(item) = self.items.get(&itemid) else {
            return;
        };
        if item.location == ItemLocation::Poller {
            return;
        }

        let mut location = item.location;
        let new_poller = item.poller_type;
        let key = new_poller.map(|_| self.queue_key(item));

        if location == ItemLocation::Queued && old_poller != new_poller {
            if let Some(old_poller) = old_poller {
                self.queue_mut(old_poller).remove(itemid);
            }
            location = ItemLocation::Nowhere;
        }

        if let (Some(poller_type), Some(key)) = (new_poller, key) {
            let queue = self.queue_mut(poller_type);
            if queue.get(itemid) != Some(&key) {
                queue.insert(itemid, key);
            }
            location = ItemLocation::Queued;
        }

        if let Some(item) = self.items.get_mut(&itemid) {
            item.location = location;
        }
    }

    pub(crate) fn queue_key(
        &self,
        item: &Item,
    ) -> ItemQueueKey {
        let ext = self.item_ext.get(&item.itemid);
        let snmp = match ext {
            Some(ItemExt::Snmp {
                community,
                securityname,
                securitylevel,
                authpassphrase,
                privpassphrase,
                authprotocol,
                privprotocol,
                contextname,
                ..
            }) => Some(SnmpConnection {
                item_type: item.item_type as u8,
                interfaceid: item.interfaceid,
                community: community.share(),
                securityname: securityname.share(),
                securitylevel: *securitylevel,
                authprotocol: *authprotocol,
                privprotocol: *privprotocol,
                authpassphrase: authpassphrase.share(),
                privpassphrase: privpassphrase.share(),
                contextname: contextname.share(),
            }),
            _ => None,
        };
        let credentials = match ext {
            Some(ItemExt::Jmx { username, password, .. }) => Some((username.share(), password.share())),
            _ => None,
        };

        ItemQueueKey {
            nextcheck: item.nextcheck,
            priority: item.queue_priority,
            interfaceid: item.interfaceid,
            snmp,
            credentials,
        }
    }
}
