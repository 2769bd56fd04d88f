use std::collections::HashMap;

use tracing::warn;

use super::KindStats;
use crate::cache::model::Item;
use crate::cache::model::ItemExt;
use crate::cache::model::ItemExtKind;
use crate::cache::model::ItemLocation;
use crate::cache::model::LogItem;
use crate::cache::rows::ItemPreprocRow;
use crate::cache::rows::ItemRow;
use crate::cache::state::absent_ids;
use crate::cache::state::find_or_insert;
use crate::cache::state::remove_index_entry;
use crate::cache::state::CacheState;
use crate::cache::strpool::PooledStr;
use crate::constants::ErrorHandler;
use crate::constants::HostStatus;
use crate::constants::ItemState;
use crate::constants::ItemStatus;
use crate::constants::ItemType;
use crate::constants::PreprocStepType;
use crate::constants::ValueType;
use crate::preprocessing::PreprocOp;
use crate::utils::interval::parse_delay;
use crate::utils::interval::parse_flex_intervals;

struct DecodedItem {
    item_type: ItemType,
    value_type: ValueType,
    status: ItemStatus,
    state: ItemState,
}

fn decode(row: &ItemRow) -> Option<DecodedItem> {
    let decoded = DecodedItem {
        item_type: ItemType::try_from(row.item_type).ok()?,
        value_type: ValueType::try_from(row.value_type).ok()?,
        status: ItemStatus::try_from(row.status).ok()?,
        state: ItemState::try_from(row.state).ok()?,
    };
    Some(decoded)
}

impl CacheState {
    pub(super) fn sync_items(
        &mut self,
        rows: &[ItemRow],
        now: i64,
    ) -> KindStats {
        let mut stats = KindStats::default();
        let mut seen = Vec::with_capacity(rows.len());

        for row in rows {
            let Some(decoded) = decode(row) else {
                warn!("item {} \"{}\" has unknown type, value type or status, skipped", row.itemid, row.key);
                stats.skipped += 1;
                continue;
            };
            let Some(host_status) = self.hosts.get(&row.hostid).map(|host| host.status) else {
                stats.skipped += 1;
                continue;
            };

            seen.push(row.itemid);
            let (item, found) = find_or_insert(&mut self.items, row.itemid, || Item::new(row.itemid));
            stats.record(found);

            let old_hostid = item.hostid;
            let old_key = item.key.share();
            let key_changed = self.pool.replace(found, &mut item.key, &row.key);
            if !found || key_changed || old_hostid != row.hostid {
                if found {
                    if let Some(keys) = self.items_by_host_key.get_mut(&old_hostid) {
                        remove_index_entry(keys, &old_key, row.itemid);
                        if keys.is_empty() {
                            self.items_by_host_key.remove(&old_hostid);
                        }
                    }
                }
                self.items_by_host_key
                    .entry(row.hostid)
                    .or_default()
                    .insert(item.key.share(), row.itemid);
            }

            let delay = parse_delay(&row.delay).unwrap_or_else(|| {
                warn!("item \"{}\" has invalid update interval \"{}\"", row.key, row.delay);
                0
            });
            let flex_changed = self.pool.replace(found, &mut item.delay_flex, &row.delay_flex);
            if flex_changed {
                item.flex = parse_flex_intervals(&row.delay_flex).unwrap_or_else(|| {
                    warn!("item \"{}\" has invalid flexible interval \"{}\"", row.key, row.delay_flex);
                    Vec::new()
                });
            }

            let reschedule = !found
                || flex_changed
                || item.delay != delay
                || item.item_type != decoded.item_type
                || item.status != decoded.status
                || item.hostid != row.hostid
                || item.interfaceid != row.interfaceid;

            item.hostid = row.hostid;
            item.interfaceid = row.interfaceid;
            item.item_type = decoded.item_type;
            item.value_type = decoded.value_type;
            item.status = decoded.status;
            item.flags = row.flags;
            item.delay = delay;
            item.master_itemid = row.master_itemid;

            // runtime-owned once cached
            if !found {
                item.state = decoded.state;
                self.pool.replace(false, &mut item.error, &row.error);
                item.lastlogsize = row.lastlogsize;
                item.mtime = row.mtime;
            }

            if decoded.status == ItemStatus::Active && host_status == HostStatus::Monitored {
                if let Some(class) = decoded.item_type.agent_class() {
                    if let Some(host) = self.hosts.get_mut(&row.hostid) {
                        host.used_interfaces.add(class);
                    }
                }
            }

            self.sync_item_ext(row, decoded.item_type);
            self.sync_log_item(row, decoded.value_type);
            self.schedule_item(row.itemid, reschedule, now);
        }

        for itemid in absent_ids(&self.items, seen) {
            self.remove_item(itemid);
            stats.removed += 1;
        }

        let mut dependents: HashMap<u64, Vec<u64>> = HashMap::new();
        for item in self.items.values() {
            if item.item_type == ItemType::Dependent
                && item.master_itemid != 0
                && self.items.contains_key(&item.master_itemid)
            {
                dependents.entry(item.master_itemid).or_default().push(item.itemid);
            }
        }
        for ids in dependents.values_mut() {
            ids.sort_unstable();
        }
        self.dependent_items = dependents;

        stats
    }

    fn remove_item(
        &mut self,
        itemid: u64,
    ) {
        let Some(mut item) = self.items.remove(&itemid) else {
            return;
        };

        if let Some(keys) = self.items_by_host_key.get_mut(&item.hostid) {
            remove_index_entry(keys, &item.key.share(), itemid);
            if keys.is_empty() {
                self.items_by_host_key.remove(&item.hostid);
            }
        }
        if item.location == ItemLocation::Queued {
            if let Some(poller_type) = item.poller_type {
                self.queue_mut(poller_type).remove(itemid);
            }
        }
        if let Some(ext) = self.item_ext.remove(&itemid) {
            ext.release_strings(&mut self.pool);
        }
        if let Some(mut logitem) = self.logitems.remove(&itemid) {
            self.pool.clear(&mut logitem.logtimefmt);
        }
        item.release_strings(&mut self.pool);
    }

    /// Creates, refreshes or drops the type-specific record so that it always matches
    /// the item's current type.
    fn sync_item_ext(
        &mut self,
        row: &ItemRow,
        item_type: ItemType,
    ) {
        let kind = ItemExtKind::for_type(item_type);
        if let Some(existing) = self.item_ext.get(&row.itemid) {
            if Some(existing.kind()) != kind {
                if let Some(old) = self.item_ext.remove(&row.itemid) {
                    old.release_strings(&mut self.pool);
                }
            }
        }
        let Some(kind) = kind else {
            return;
        };

        let (ext, found) = find_or_insert(&mut self.item_ext, row.itemid, || ItemExt::empty(kind));
        let pool = &mut self.pool;
        match ext {
            ItemExt::Snmp {
                community,
                oid,
                securityname,
                securitylevel,
                authpassphrase,
                privpassphrase,
                authprotocol,
                privprotocol,
                contextname,
            } => {
                pool.replace(found, community, &row.snmp_community);
                pool.replace(found, oid, &row.snmp_oid);
                pool.replace(found, securityname, &row.snmpv3_securityname);
                pool.replace(found, authpassphrase, &row.snmpv3_authpassphrase);
                pool.replace(found, privpassphrase, &row.snmpv3_privpassphrase);
                pool.replace(found, contextname, &row.snmpv3_contextname);
                *securitylevel = row.snmpv3_securitylevel;
                *authprotocol = row.snmpv3_authprotocol;
                *privprotocol = row.snmpv3_privprotocol;
            }
            ItemExt::Ipmi { sensor } => {
                pool.replace(found, sensor, &row.ipmi_sensor);
            }
            ItemExt::Trapper { trapper_hosts } => {
                pool.replace(found, trapper_hosts, &row.trapper_hosts);
            }
            ItemExt::Db {
                params,
                username,
                password,
            } => {
                pool.replace(found, params, &row.params);
                pool.replace(found, username, &row.username);
                pool.replace(found, password, &row.password);
            }
            ItemExt::Ssh {
                authtype,
                username,
                password,
                publickey,
                privatekey,
                params,
            } => {
                *authtype = row.authtype;
                pool.replace(found, username, &row.username);
                pool.replace(found, password, &row.password);
                pool.replace(found, publickey, &row.publickey);
                pool.replace(found, privatekey, &row.privatekey);
                pool.replace(found, params, &row.params);
            }
            ItemExt::Telnet {
                username,
                password,
                params,
            } => {
                pool.replace(found, username, &row.username);
                pool.replace(found, password, &row.password);
                pool.replace(found, params, &row.params);
            }
            ItemExt::Simple { username, password } => {
                pool.replace(found, username, &row.username);
                pool.replace(found, password, &row.password);
            }
            ItemExt::Jmx {
                username,
                password,
                jmx_endpoint,
            } => {
                pool.replace(found, username, &row.username);
                pool.replace(found, password, &row.password);
                pool.replace(found, jmx_endpoint, &row.jmx_endpoint);
            }
            ItemExt::Calculated { formula } => {
                pool.replace(found, formula, &row.params);
            }
        }
    }

    fn sync_log_item(
        &mut self,
        row: &ItemRow,
        value_type: ValueType,
    ) {
        if value_type != ValueType::Log {
            if let Some(mut logitem) = self.logitems.remove(&row.itemid) {
                self.pool.clear(&mut logitem.logtimefmt);
            }
            return;
        }

        let (logitem, found) = find_or_insert(&mut self.logitems, row.itemid, || LogItem {
            itemid: row.itemid,
            logtimefmt: PooledStr::default(),
        });
        self.pool.replace(found, &mut logitem.logtimefmt, &row.logtimefmt);
    }

    /// Attaches ordered preprocessing steps to their items.
    pub(super) fn sync_item_preproc(
        &mut self,
        rows: &[ItemPreprocRow],
    ) -> KindStats {
        let mut stats = KindStats::default();
        let mut steps: HashMap<u64, Vec<(u32, PreprocOp)>> = HashMap::new();

        for row in rows {
            let (Ok(step_type), Ok(error_handler)) = (
                PreprocStepType::try_from(row.step_type),
                ErrorHandler::try_from(row.error_handler),
            ) else {
                warn!(
                    "item {} preprocessing step {} has unknown type {} or error handler {}",
                    row.itemid, row.step, row.step_type, row.error_handler
                );
                stats.skipped += 1;
                continue;
            };
            if !self.items.contains_key(&row.itemid) {
                stats.skipped += 1;
                continue;
            }

            steps.entry(row.itemid).or_default().push((
                row.step,
                PreprocOp {
                    step_type,
                    params: row.params.clone(),
                    error_handler,
                    error_handler_params: row.error_handler_params.clone(),
                },
            ));
        }

        for item in self.items.values_mut() {
            let ops: Vec<PreprocOp> = match steps.remove(&item.itemid) {
                Some(mut item_steps) => {
                    item_steps.sort_by_key(|(step, _)| *step);
                    item_steps.into_iter().map(|(_, op)| op).collect()
                }
                None => Vec::new(),
            };
            if item.preproc_ops == ops {
                continue;
            }
            match (item.preproc_ops.is_empty(), ops.is_empty()) {
                (true, _) => stats.inserted += 1,
                (false, true) => stats.removed += 1,
                (false, false) => stats.updated += 1,
            }
            item.preproc_ops = ops;
        }

        stats
    }
}
