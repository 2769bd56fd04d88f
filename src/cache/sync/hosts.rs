use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use super::KindStats;
use crate::cache::model::Host;
use crate::cache::model::HostInventory;
use crate::cache::model::ItemLocation;
use crate::cache::model::Proxy;
use crate::cache::model::Psk;
use crate::cache::model::UsedInterfaces;
use crate::cache::rows::HostInventoryRow;
use crate::cache::rows::HostRow;
use crate::cache::rows::HostTemplateRow;
use crate::cache::state::absent_ids;
use crate::cache::state::find_or_insert;
use crate::cache::state::remove_index_entry;
use crate::cache::state::CacheState;
use crate::constants::AgentClass;
use crate::constants::Availability;
use crate::constants::HostStatus;
use crate::constants::MaintenanceType;
use crate::constants::TLS_PSK;
use crate::utils::interval::calculate_proxy_nextcheck;

impl CacheState {
    pub(super) fn sync_hosts(
        &mut self,
        rows: &[HostRow],
        now: i64,
    ) -> KindStats {
        let mut stats = KindStats::default();
        let mut seen = Vec::with_capacity(rows.len());
        // PSK identity -> host that set it first during this pass
        let mut psk_owners: HashMap<String, String> = HashMap::new();

        for row in rows {
            let status = match HostStatus::try_from(row.status) {
                Ok(HostStatus::Template) => continue,
                Ok(status) => status,
                Err(code) => {
                    warn!("host {} has unknown status {}, skipped", row.hostid, code);
                    stats.skipped += 1;
                    continue;
                }
            };

            seen.push(row.hostid);
            let (host, found) = find_or_insert(&mut self.hosts, row.hostid, || Host::new(row.hostid));
            stats.record(found);

            let old_name = host.host.share();
            let old_status = host.status;
            let name_changed = self.pool.replace(found, &mut host.host, &row.host);
            if !found || name_changed || old_status.is_proxy() != status.is_proxy() {
                if found {
                    let index = if old_status.is_proxy() {
                        &mut self.proxies_by_name
                    } else {
                        &mut self.hosts_by_name
                    };
                    remove_index_entry(index, &old_name, row.hostid);
                }
                let index = if status.is_proxy() {
                    &mut self.proxies_by_name
                } else {
                    &mut self.hosts_by_name
                };
                index.insert(host.host.share(), row.hostid);
            }

            host.used_interfaces = if found && host.proxy_hostid != row.proxy_hostid {
                UsedInterfaces::Unknown
            } else {
                UsedInterfaces::Known(0)
            };
            host.proxy_hostid = row.proxy_hostid;
            host.status = status;
            self.pool.replace(found, &mut host.name, &row.name);
            host.ipmi_authtype = row.ipmi_authtype;
            host.ipmi_privilege = row.ipmi_privilege;
            self.pool.replace(found, &mut host.ipmi_username, &row.ipmi_username);
            self.pool.replace(found, &mut host.ipmi_password, &row.ipmi_password);
            host.maintenance_status = row.maintenance_status != 0;
            host.maintenance_type =
                MaintenanceType::try_from(row.maintenance_type).unwrap_or(MaintenanceType::Normal);
            host.maintenance_from = row.maintenance_from;
            host.tls_connect = row.tls_connect;
            host.tls_accept = row.tls_accept;
            self.pool.replace(found, &mut host.tls_issuer, &row.tls_issuer);
            self.pool.replace(found, &mut host.tls_subject, &row.tls_subject);

            // availability is owned by the pollers once the host is cached
            if !found {
                let agents = [
                    (AgentClass::Zabbix, &row.agent),
                    (AgentClass::Snmp, &row.snmp),
                    (AgentClass::Ipmi, &row.ipmi),
                    (AgentClass::Jmx, &row.jmx),
                ];
                for (class, agent_row) in agents {
                    let agent = host.agent_mut(class);
                    agent.available =
                        Availability::try_from(agent_row.available).unwrap_or(Availability::Unknown);
                    agent.errors_from = agent_row.errors_from;
                    agent.disable_until = agent_row.disable_until;
                    self.pool.replace(false, &mut agent.error, &agent_row.error);
                }
            }

            self.sync_host_psk(row, &mut psk_owners);
            self.sync_proxy(row.hostid, status, row.lastaccess, now);
        }

        for hostid in absent_ids(&self.hosts, seen) {
            self.remove_host(hostid);
            stats.removed += 1;
        }

        stats
    }

    fn remove_host(
        &mut self,
        hostid: u64,
    ) {
        let Some(mut host) = self.hosts.remove(&hostid) else {
            return;
        };

        let index = if host.status.is_proxy() {
            &mut self.proxies_by_name
        } else {
            &mut self.hosts_by_name
        };
        remove_index_entry(index, &host.host.share(), hostid);

        if let Some(identity) = host.tls_dc_psk.take() {
            self.psk_release(&identity);
        }
        self.remove_proxy(hostid);
        host.release_strings(&mut self.pool);
    }

    /// Keeps the host's shared PSK reference and the PSK refcounts in step with the row.
    fn sync_host_psk(
        &mut self,
        row: &HostRow,
        owners: &mut HashMap<String, String>,
    ) {
        let wants_psk = (row.tls_connect == TLS_PSK || row.tls_accept & TLS_PSK != 0)
            && !row.tls_psk_identity.is_empty();
        let Some(current) = self.hosts.get(&row.hostid).map(|host| host.tls_dc_psk.clone()) else {
            return;
        };

        match (current, wants_psk) {
            (None, false) => {}
            (Some(old), false) => {
                self.psk_release(&old);
                if let Some(host) = self.hosts.get_mut(&row.hostid) {
                    host.tls_dc_psk = None;
                }
            }
            (Some(old), true) if &*old == row.tls_psk_identity.as_str() => {
                self.psk_check_value(row, owners);
            }
            (old, true) => {
                if let Some(old) = old {
                    self.psk_release(&old);
                }
                let identity = self.psk_acquire(row, owners);
                if let Some(host) = self.hosts.get_mut(&row.hostid) {
                    host.tls_dc_psk = identity;
                }
            }
        }
    }

    /// Find-or-create the PSK named by the row and take one reference on it.
    fn psk_acquire(
        &mut self,
        row: &HostRow,
        owners: &mut HashMap<String, String>,
    ) -> Option<Arc<str>> {
        let identity = row.tls_psk_identity.as_str();
        if !self.psks.contains_key(identity) {
            let identity_str = self.pool.intern(identity);
            let psk = self.pool.intern(&row.tls_psk);
            self.psks.insert(
                identity_str.share(),
                Psk {
                    identity: identity_str,
                    psk,
                    refcount: 0,
                },
            );
        }
        self.psk_check_value(row, owners);

        let psk = self.psks.get_mut(identity)?;
        psk.refcount += 1;
        Some(psk.identity.share())
    }

    /// The first host seen with an identity during a pass decides its value.
    fn psk_check_value(
        &mut self,
        row: &HostRow,
        owners: &mut HashMap<String, String>,
    ) {
        let identity = row.tls_psk_identity.as_str();
        let Some(psk) = self.psks.get_mut(identity) else {
            return;
        };

        if psk.psk.as_str() != row.tls_psk {
            match owners.get(identity) {
                Some(owner) if *owner != row.host => {
                    warn!(
                        "host \"{}\" uses PSK identity \"{}\" with a value different from host \"{}\", keeping the value of \"{}\"",
                        row.host, identity, owner, owner
                    );
                }
                _ => {
                    self.pool.replace(true, &mut psk.psk, &row.tls_psk);
                }
            }
        }
        owners.entry(identity.to_string()).or_insert_with(|| row.host.clone());
    }

    fn psk_release(
        &mut self,
        identity: &Arc<str>,
    ) {
        let last = match self.psks.get_mut(&**identity) {
            Some(psk) => {
                psk.refcount = psk.refcount.saturating_sub(1);
                psk.refcount == 0
            }
            None => {
                warn!("releasing unknown PSK identity \"{}\"", identity);
                false
            }
        };
        if last {
            if let Some(mut psk) = self.psks.remove(&**identity) {
                self.pool.clear(&mut psk.identity);
                self.pool.clear(&mut psk.psk);
            }
        }
    }

    fn sync_proxy(
        &mut self,
        hostid: u64,
        status: HostStatus,
        lastaccess: i64,
        now: i64,
    ) {
        if !status.is_proxy() {
            self.remove_proxy(hostid);
            return;
        }

        let config_frequency = self.cache_config.proxyconfig_frequency;
        let data_frequency = self.cache_config.proxydata_frequency;
        let (proxy, _) = find_or_insert(&mut self.proxies, hostid, || Proxy {
            hostid,
            config_nextcheck: calculate_proxy_nextcheck(hostid, config_frequency, now),
            data_nextcheck: calculate_proxy_nextcheck(hostid, data_frequency, now),
            timediff: 0,
            lastaccess,
            location: ItemLocation::Nowhere,
        });

        if status == HostStatus::ProxyPassive {
            if proxy.location != ItemLocation::Poller {
                self.proxy_queue.insert(hostid, proxy.nextcheck());
                proxy.location = ItemLocation::Queued;
            }
        } else if proxy.location == ItemLocation::Queued {
            self.proxy_queue.remove(hostid);
            proxy.location = ItemLocation::Nowhere;
        }
    }

    fn remove_proxy(
        &mut self,
        hostid: u64,
    ) {
        if let Some(proxy) = self.proxies.remove(&hostid) {
            if proxy.location == ItemLocation::Queued {
                self.proxy_queue.remove(hostid);
            }
        }
    }

    pub(super) fn sync_host_inventory(
        &mut self,
        rows: &[HostInventoryRow],
    ) -> KindStats {
        let mut stats = KindStats::default();
        let mut seen = Vec::with_capacity(rows.len());

        for row in rows {
            if !self.hosts.contains_key(&row.hostid) {
                stats.skipped += 1;
                continue;
            }
            seen.push(row.hostid);
            let (inventory, found) = find_or_insert(&mut self.inventories, row.hostid, || HostInventory {
                hostid: row.hostid,
                inventory_mode: 0,
                fields: Vec::new(),
            });
            stats.record(found);

            inventory.inventory_mode = row.inventory_mode;
            let unchanged = inventory.fields.len() == row.fields.len()
                && inventory
                    .fields
                    .iter()
                    .zip(row.fields.iter())
                    .all(|((name, value), (row_name, row_value))| name == row_name.as_str() && value == row_value.as_str());
            if !unchanged {
                for (name, value) in inventory.fields.drain(..) {
                    self.pool.release(name);
                    self.pool.release(value);
                }
                for (name, value) in &row.fields {
                    let entry = (self.pool.intern(name), self.pool.intern(value));
                    inventory.fields.push(entry);
                }
            }
        }

        for hostid in absent_ids(&self.inventories, seen) {
            if let Some(mut inventory) = self.inventories.remove(&hostid) {
                for (name, value) in inventory.fields.drain(..) {
                    self.pool.release(name);
                    self.pool.release(value);
                }
            }
            stats.removed += 1;
        }

        stats
    }

    /// Template links are rebuilt wholesale; they carry no pooled data.
    pub(super) fn sync_host_templates(
        &mut self,
        rows: &[HostTemplateRow],
    ) -> KindStats {
        let mut stats = KindStats::default();
        let mut links: HashMap<u64, Vec<u64>> = HashMap::new();
        for row in rows {
            links.entry(row.hostid).or_default().push(row.templateid);
        }
        for templates in links.values_mut() {
            templates.sort_unstable();
            templates.dedup();
        }

        for hostid in links.keys() {
            stats.record(self.host_templates.contains_key(hostid));
        }
        stats.removed = self.host_templates.keys().filter(|hostid| !links.contains_key(hostid)).count();
        self.host_templates = links;

        stats
    }
}
