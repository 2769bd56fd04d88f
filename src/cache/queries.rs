//! Read-mostly lookups returning owned snapshots, plus small direct state setters.

use super::snapshot::ActionSnapshot;
use super::snapshot::CacheStats;
use super::snapshot::ConditionSnapshot;
use super::snapshot::ExpressionSnapshot;
use super::snapshot::HostSnapshot;
use super::snapshot::InterfaceSnapshot;
use super::snapshot::ItemSnapshot;
use super::snapshot::PreprocItem;
use super::snapshot::ProxySnapshot;
use super::state::CacheState;
use crate::cache::model::Host;
use crate::constants::InterfaceType;
use crate::constants::ItemState;
use crate::constants::MaintenanceType;
use crate::constants::PollerType;

impl CacheState {
    fn host_snapshot(
        &self,
        host: &Host,
    ) -> HostSnapshot {
        let psk = host
            .tls_dc_psk
            .as_ref()
            .and_then(|identity| self.psks.get(&**identity))
            .map(|psk| (psk.identity.as_str(), psk.psk.as_str()));
        HostSnapshot::new(host, psk)
    }

    pub fn get_host_by_id(
        &self,
        hostid: u64,
    ) -> Option<HostSnapshot> {
        self.hosts.get(&hostid).map(|host| self.host_snapshot(host))
    }

    pub fn get_host_by_name(
        &self,
        name: &str,
    ) -> Option<HostSnapshot> {
        let hostid = self.hosts_by_name.get(name)?;
        self.get_host_by_id(*hostid)
    }

    pub fn get_proxy_by_name(
        &self,
        name: &str,
    ) -> Option<(HostSnapshot, ProxySnapshot)> {
        let hostid = *self.proxies_by_name.get(name)?;
        let host = self.get_host_by_id(hostid)?;
        let proxy = self.proxies.get(&hostid)?;
        Some((
            host,
            ProxySnapshot {
                hostid,
                config_nextcheck: proxy.config_nextcheck,
                data_nextcheck: proxy.data_nextcheck,
                timediff: proxy.timediff,
                lastaccess: proxy.lastaccess,
            },
        ))
    }

    pub(crate) fn item_snapshot(
        &self,
        itemid: u64,
    ) -> Option<ItemSnapshot> {
        let item = self.items.get(&itemid)?;
        let host_name = self.hosts.get(&item.hostid).map_or("", |host| host.host.as_str());

        let mut snapshot = ItemSnapshot::new(item, host_name);
        snapshot.ext = self.item_ext.get(&itemid).map(Into::into);
        snapshot.interface = self.interfaces.get(&item.interfaceid).map(Into::into);
        snapshot.logtimefmt = self.logitems.get(&itemid).map(|logitem| logitem.logtimefmt.to_string());
        Some(snapshot)
    }

    pub fn get_item_by_id(
        &self,
        itemid: u64,
    ) -> Option<ItemSnapshot> {
        self.item_snapshot(itemid)
    }

    pub fn get_item_by_key(
        &self,
        host: &str,
        key: &str,
    ) -> Option<ItemSnapshot> {
        let hostid = self.hosts_by_name.get(host)?;
        let itemid = self.items_by_host_key.get(hostid)?.get(key)?;
        self.item_snapshot(*itemid)
    }

    /// Main interface of the given type on a host.
    pub fn get_interface_by_type(
        &self,
        hostid: u64,
        interface_type: InterfaceType,
    ) -> Option<InterfaceSnapshot> {
        let interfaceid = self.interfaces_by_host_type.get(&(hostid, interface_type))?;
        self.interfaces.get(interfaceid).map(Into::into)
    }

    pub fn get_host_inventory_value(
        &self,
        hostid: u64,
        field: &str,
    ) -> Option<String> {
        let inventory = self.inventories.get(&hostid)?;
        inventory
            .fields
            .iter()
            .find(|(name, _)| name.as_str() == field)
            .map(|(_, value)| value.to_string())
    }

    /// Records the supported/not-supported outcome written to the database.
    pub fn set_item_db_state(
        &mut self,
        itemid: u64,
        state: ItemState,
        error: &str,
    ) -> bool {
        let Some(item) = self.items.get_mut(&itemid) else {
            return false;
        };
        item.state = state;
        self.pool.replace(true, &mut item.error, error);
        true
    }

    pub fn set_maintenance(
        &mut self,
        hostids: &[u64],
        maintenance_status: bool,
        maintenance_type: MaintenanceType,
        maintenance_from: i64,
    ) {
        for hostid in hostids {
            let Some(host) = self.hosts.get_mut(hostid) else {
                continue;
            };
            // the start time only moves when maintenance is entered or left
            if !host.maintenance_status || !maintenance_status {
                host.maintenance_from = maintenance_from;
            }
            host.maintenance_status = maintenance_status;
            host.maintenance_type = maintenance_type;
        }
    }

    /// Expressions of a global regular expression, in id order.
    pub fn get_expressions_by_name(
        &self,
        name: &str,
    ) -> Vec<ExpressionSnapshot> {
        self.regexps
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|id| self.expressions.get(id))
            .map(Into::into)
            .collect()
    }

    /// Actions of one event source with their conditions in evaluation order.
    pub fn get_actions(
        &self,
        eventsource: u8,
    ) -> Vec<ActionSnapshot> {
        let mut actions: Vec<ActionSnapshot> = self
            .actions
            .values()
            .filter(|action| action.eventsource == eventsource)
            .map(|action| {
                let conditions: Vec<ConditionSnapshot> = action
                    .conditions
                    .iter()
                    .filter_map(|id| self.conditions.get(id))
                    .map(Into::into)
                    .collect();
                ActionSnapshot::new(action, conditions)
            })
            .collect();
        actions.sort_by_key(|action| action.actionid);
        actions
    }

    /// Items the preprocessing manager must know about (with steps, with dependents, or
    /// dependent themselves), or `None` when nothing was synced since `revision`.
    pub fn get_preprocessable_items(
        &self,
        revision: &mut u64,
    ) -> Option<Vec<PreprocItem>> {
        if *revision == self.revision {
            return None;
        }
        *revision = self.revision;

        let mut items: Vec<PreprocItem> = self
            .items
            .values()
            .filter_map(|item| {
                let dependents = self.dependent_items.get(&item.itemid);
                if item.preproc_ops.is_empty() && dependents.is_none() && item.master_itemid == 0 {
                    return None;
                }
                Some(PreprocItem {
                    itemid: item.itemid,
                    item_type: item.item_type,
                    value_type: item.value_type,
                    ops: item.preproc_ops.clone(),
                    dependent_itemids: dependents.cloned().unwrap_or_default(),
                })
            })
            .collect();
        items.sort_by_key(|item| item.itemid);
        Some(items)
    }

    pub fn stats(&self) -> CacheStats {
        let mut queues = [0; PollerType::COUNT];
        for poller_type in PollerType::ALL {
            queues[poller_type.index()] = self.queue(poller_type).len();
        }

        CacheStats {
            hosts: self.hosts.len(),
            proxies: self.proxies.len(),
            psks: self.psks.len(),
            interfaces: self.interfaces.len(),
            items: self.items.len(),
            triggers: self.triggers.len(),
            functions: self.functions.len(),
            trigger_deps: self.trigdeps.len(),
            global_macros: self.gmacros.len(),
            host_macros: self.hmacros.len(),
            expressions: self.expressions.len(),
            actions: self.actions.len(),
            conditions: self.conditions.len(),
            pooled_strings: self.pool.len(),
            queues,
            proxy_queue: self.proxy_queue.len(),
            revision: self.revision,
        }
    }
}
