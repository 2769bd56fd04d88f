use tracing::warn;

use super::KindStats;
use crate::cache::model::Interface;
use crate::cache::rows::InterfaceRow;
use crate::cache::state::absent_ids;
use crate::cache::state::find_or_insert;
use crate::cache::state::remove_index_entry;
use crate::cache::state::CacheState;
use crate::cache::strpool::PooledStr;
use crate::constants::InterfaceType;
use crate::constants::MAX_SNMP_ITEMS;

impl CacheState {
    pub(super) fn sync_interfaces(
        &mut self,
        rows: &[InterfaceRow],
    ) -> KindStats {
        let mut stats = KindStats::default();
        let mut seen = Vec::with_capacity(rows.len());

        for row in rows {
            let interface_type = match InterfaceType::try_from(row.interface_type) {
                Ok(interface_type) => interface_type,
                Err(code) => {
                    warn!("interface {} has unknown type {}, skipped", row.interfaceid, code);
                    stats.skipped += 1;
                    continue;
                }
            };
            if !self.hosts.contains_key(&row.hostid) {
                stats.skipped += 1;
                continue;
            }

            seen.push(row.interfaceid);
            let (interface, found) = find_or_insert(&mut self.interfaces, row.interfaceid, || Interface {
                interfaceid: row.interfaceid,
                hostid: row.hostid,
                interface_type,
                main: false,
                useip: false,
                ip: PooledStr::default(),
                dns: PooledStr::default(),
                port: PooledStr::default(),
                bulk: true,
                max_snmp_succeed: 0,
                min_snmp_fail: MAX_SNMP_ITEMS + 1,
            });
            stats.record(found);

            let main = row.main != 0;
            if found && interface.main {
                let old_key = (interface.hostid, interface.interface_type);
                if !main || old_key != (row.hostid, interface_type) {
                    remove_index_entry(&mut self.interfaces_by_host_type, &old_key, row.interfaceid);
                }
            }
            if main {
                self.interfaces_by_host_type
                    .insert((row.hostid, interface_type), row.interfaceid);
            }

            interface.hostid = row.hostid;
            interface.interface_type = interface_type;
            interface.main = main;

            let useip = row.useip != 0;
            let mut address_changed = interface.useip != useip;
            interface.useip = useip;
            address_changed |= self.pool.replace(found, &mut interface.ip, &row.ip);
            address_changed |= self.pool.replace(found, &mut interface.dns, &row.dns);
            address_changed |= self.pool.replace(found, &mut interface.port, &row.port);
            interface.bulk = row.bulk != 0;

            // bulk request sizing learned against the previous address is meaningless now
            if found && address_changed {
                interface.max_snmp_succeed = 0;
                interface.min_snmp_fail = MAX_SNMP_ITEMS + 1;
            }
        }

        for interfaceid in absent_ids(&self.interfaces, seen) {
            if let Some(mut interface) = self.interfaces.remove(&interfaceid) {
                if interface.main {
                    remove_index_entry(
                        &mut self.interfaces_by_host_type,
                        &(interface.hostid, interface.interface_type),
                        interfaceid,
                    );
                }
                interface.release_strings(&mut self.pool);
            }
            stats.removed += 1;
        }

        stats
    }
}
