//! Cache-resident records. Text fields are pooled; cross-record links are ids resolved
//! through the owning tables on every lookup.

use std::sync::Arc;

use crate::constants::AgentClass;
use crate::constants::Availability;
use crate::constants::HostStatus;
use crate::constants::InterfaceType;
use crate::constants::ItemState;
use crate::constants::ItemStatus;
use crate::constants::ItemType;
use crate::constants::MaintenanceType;
use crate::constants::PollerType;
use crate::constants::TriggerState;
use crate::constants::TriggerStatus;
use crate::constants::TriggerValue;
use crate::constants::ValueType;
use crate::preprocessing::PreprocOp;
use crate::utils::interval::FlexInterval;

use super::strpool::PooledStr;
use super::strpool::StringPool;

/// Where an item currently sits with respect to the poller queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemLocation {
    #[default]
    Nowhere,
    Queued,
    Poller,
}

/// Ordering within one nextcheck second; `Low` marks items of unreachable hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum QueuePriority {
    High,
    #[default]
    Normal,
    Low,
}

#[derive(Debug, Default)]
pub struct GlobalConfig {
    pub refresh_unsupported: i64,
    pub default_inventory_mode: i8,
}

/// Availability of one agent class on a host.
#[derive(Debug)]
pub struct AgentAvailability {
    pub available: Availability,
    pub errors_from: i64,
    pub disable_until: i64,
    pub error: PooledStr,
}

impl Default for AgentAvailability {
    fn default() -> Self {
        Self {
            available: Availability::Unknown,
            errors_from: 0,
            disable_until: 0,
            error: PooledStr::default(),
        }
    }
}

/// Which agent classes are polled by at least one active item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsedInterfaces {
    /// Proxy assignment just changed; items have not been re-observed yet
    Unknown,
    Known(u8),
}

impl Default for UsedInterfaces {
    fn default() -> Self {
        UsedInterfaces::Known(0)
    }
}

impl UsedInterfaces {
    pub fn add(
        &mut self,
        class: AgentClass,
    ) {
        if let UsedInterfaces::Known(mask) = self {
            *mask |= class.flag();
        }
    }

    pub fn uses(
        &self,
        class: AgentClass,
    ) -> Option<bool> {
        match self {
            UsedInterfaces::Unknown => None,
            UsedInterfaces::Known(mask) => Some(mask & class.flag() != 0),
        }
    }
}

#[derive(Debug)]
pub struct Host {
    pub hostid: u64,
    pub proxy_hostid: u64,
    pub host: PooledStr,
    pub name: PooledStr,
    pub status: HostStatus,
    pub ipmi_authtype: i8,
    pub ipmi_privilege: u8,
    pub ipmi_username: PooledStr,
    pub ipmi_password: PooledStr,
    pub availability: [AgentAvailability; AgentClass::COUNT],
    pub availability_ts: i64,
    pub maintenance_status: bool,
    pub maintenance_type: MaintenanceType,
    pub maintenance_from: i64,
    pub tls_connect: u8,
    pub tls_accept: u8,
    pub tls_issuer: PooledStr,
    pub tls_subject: PooledStr,
    /// Identity of the shared PSK record, if any
    pub tls_dc_psk: Option<Arc<str>>,
    pub used_interfaces: UsedInterfaces,
}

impl Host {
    pub fn new(hostid: u64) -> Self {
        Self {
            hostid,
            proxy_hostid: 0,
            host: PooledStr::default(),
            name: PooledStr::default(),
            status: HostStatus::Monitored,
            ipmi_authtype: 0,
            ipmi_privilege: 2,
            ipmi_username: PooledStr::default(),
            ipmi_password: PooledStr::default(),
            availability: Default::default(),
            availability_ts: 0,
            maintenance_status: false,
            maintenance_type: MaintenanceType::Normal,
            maintenance_from: 0,
            tls_connect: 0,
            tls_accept: 0,
            tls_issuer: PooledStr::default(),
            tls_subject: PooledStr::default(),
            tls_dc_psk: None,
            used_interfaces: UsedInterfaces::default(),
        }
    }

    pub fn agent(
        &self,
        class: AgentClass,
    ) -> &AgentAvailability {
        &self.availability[class.index()]
    }

    pub fn agent_mut(
        &mut self,
        class: AgentClass,
    ) -> &mut AgentAvailability {
        &mut self.availability[class.index()]
    }

    pub fn in_nodata_maintenance(&self) -> bool {
        self.maintenance_status && self.maintenance_type == MaintenanceType::NoData
    }

    pub(crate) fn release_strings(
        &mut self,
        pool: &mut StringPool,
    ) {
        pool.clear(&mut self.host);
        pool.clear(&mut self.name);
        pool.clear(&mut self.ipmi_username);
        pool.clear(&mut self.ipmi_password);
        pool.clear(&mut self.tls_issuer);
        pool.clear(&mut self.tls_subject);
        for agent in self.availability.iter_mut() {
            pool.clear(&mut agent.error);
        }
    }
}

/// Shared pre-shared key; `refcount` equals the number of hosts pointing at it.
#[derive(Debug)]
pub struct Psk {
    pub identity: PooledStr,
    pub psk: PooledStr,
    pub refcount: usize,
}

#[derive(Debug)]
pub struct Proxy {
    pub hostid: u64,
    pub config_nextcheck: i64,
    pub data_nextcheck: i64,
    pub timediff: i64,
    pub lastaccess: i64,
    pub location: ItemLocation,
}

impl Proxy {
    pub fn nextcheck(&self) -> i64 {
        self.config_nextcheck.min(self.data_nextcheck)
    }
}

#[derive(Debug)]
pub struct HostInventory {
    pub hostid: u64,
    pub inventory_mode: i8,
    pub fields: Vec<(PooledStr, PooledStr)>,
}

#[derive(Debug)]
pub struct Interface {
    pub interfaceid: u64,
    pub hostid: u64,
    pub interface_type: InterfaceType,
    pub main: bool,
    pub useip: bool,
    pub ip: PooledStr,
    pub dns: PooledStr,
    pub port: PooledStr,
    pub bulk: bool,
    pub max_snmp_succeed: i32,
    pub min_snmp_fail: i32,
}

impl Interface {
    pub(crate) fn release_strings(
        &mut self,
        pool: &mut StringPool,
    ) {
        pool.clear(&mut self.ip);
        pool.clear(&mut self.dns);
        pool.clear(&mut self.port);
    }
}

#[derive(Debug)]
pub struct GlobalMacro {
    pub globalmacroid: u64,
    pub name: PooledStr,
    pub context: Option<PooledStr>,
    pub value: PooledStr,
}

#[derive(Debug)]
pub struct HostMacro {
    pub hostmacroid: u64,
    pub hostid: u64,
    pub name: PooledStr,
    pub context: Option<PooledStr>,
    pub value: PooledStr,
}

#[derive(Debug)]
pub struct Item {
    pub itemid: u64,
    pub hostid: u64,
    pub interfaceid: u64,
    pub item_type: ItemType,
    pub value_type: ValueType,
    pub key: PooledStr,
    pub status: ItemStatus,
    pub state: ItemState,
    pub error: PooledStr,
    pub flags: u8,
    pub delay: i64,
    pub delay_flex: PooledStr,
    pub flex: Vec<FlexInterval>,
    pub nextcheck: i64,
    pub lastclock: i64,
    pub lastlogsize: u64,
    pub mtime: i32,
    pub master_itemid: u64,
    pub poller_type: Option<PollerType>,
    pub location: ItemLocation,
    pub queue_priority: QueuePriority,
    pub data_expected_from: i64,
    /// Sorted ids of triggers using this item
    pub triggers: Vec<u64>,
    pub preproc_ops: Vec<PreprocOp>,
}

impl Item {
    pub fn new(itemid: u64) -> Self {
        Self {
            itemid,
            hostid: 0,
            interfaceid: 0,
            item_type: ItemType::ZabbixAgent,
            value_type: ValueType::Float,
            key: PooledStr::default(),
            status: ItemStatus::Active,
            state: ItemState::Normal,
            error: PooledStr::default(),
            flags: 0,
            delay: 0,
            delay_flex: PooledStr::default(),
            flex: Vec::new(),
            nextcheck: 0,
            lastclock: 0,
            lastlogsize: 0,
            mtime: 0,
            master_itemid: 0,
            poller_type: None,
            location: ItemLocation::Nowhere,
            queue_priority: QueuePriority::Normal,
            data_expected_from: 0,
            triggers: Vec::new(),
            preproc_ops: Vec::new(),
        }
    }

    pub(crate) fn release_strings(
        &mut self,
        pool: &mut StringPool,
    ) {
        pool.clear(&mut self.key);
        pool.clear(&mut self.error);
        pool.clear(&mut self.delay_flex);
    }
}

/// Type-specific item data stored apart from the item itself.
#[derive(Debug)]
pub enum ItemExt {
    Snmp {
        community: PooledStr,
        oid: PooledStr,
        securityname: PooledStr,
        securitylevel: u8,
        authpassphrase: PooledStr,
        privpassphrase: PooledStr,
        authprotocol: u8,
        privprotocol: u8,
        contextname: PooledStr,
    },
    Ipmi {
        sensor: PooledStr,
    },
    Trapper {
        trapper_hosts: PooledStr,
    },
    Db {
        params: PooledStr,
        username: PooledStr,
        password: PooledStr,
    },
    Ssh {
        authtype: u8,
        username: PooledStr,
        password: PooledStr,
        publickey: PooledStr,
        privatekey: PooledStr,
        params: PooledStr,
    },
    Telnet {
        username: PooledStr,
        password: PooledStr,
        params: PooledStr,
    },
    Simple {
        username: PooledStr,
        password: PooledStr,
    },
    Jmx {
        username: PooledStr,
        password: PooledStr,
        jmx_endpoint: PooledStr,
    },
    Calculated {
        formula: PooledStr,
    },
}

/// Extension record variant an item type needs, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemExtKind {
    Snmp,
    Ipmi,
    Trapper,
    Db,
    Ssh,
    Telnet,
    Simple,
    Jmx,
    Calculated,
}

impl ItemExtKind {
    pub fn for_type(item_type: ItemType) -> Option<Self> {
        match item_type {
            ItemType::SnmpV1 | ItemType::SnmpV2c | ItemType::SnmpV3 => Some(ItemExtKind::Snmp),
            ItemType::Ipmi => Some(ItemExtKind::Ipmi),
            ItemType::Trapper => Some(ItemExtKind::Trapper),
            ItemType::DbMonitor => Some(ItemExtKind::Db),
            ItemType::Ssh => Some(ItemExtKind::Ssh),
            ItemType::Telnet => Some(ItemExtKind::Telnet),
            ItemType::Simple => Some(ItemExtKind::Simple),
            ItemType::Jmx => Some(ItemExtKind::Jmx),
            ItemType::Calculated => Some(ItemExtKind::Calculated),
            _ => None,
        }
    }
}

impl ItemExt {
    pub fn kind(&self) -> ItemExtKind {
        match self {
            ItemExt::Snmp { .. } => ItemExtKind::Snmp,
            ItemExt::Ipmi { .. } => ItemExtKind::Ipmi,
            ItemExt::Trapper { .. } => ItemExtKind::Trapper,
            ItemExt::Db { .. } => ItemExtKind::Db,
            ItemExt::Ssh { .. } => ItemExtKind::Ssh,
            ItemExt::Telnet { .. } => ItemExtKind::Telnet,
            ItemExt::Simple { .. } => ItemExtKind::Simple,
            ItemExt::Jmx { .. } => ItemExtKind::Jmx,
            ItemExt::Calculated { .. } => ItemExtKind::Calculated,
        }
    }

    /// Empty record of the given kind; fields are filled through `StringPool::replace`.
    pub fn empty(kind: ItemExtKind) -> Self {
        match kind {
            ItemExtKind::Snmp => ItemExt::Snmp {
                community: PooledStr::default(),
                oid: PooledStr::default(),
                securityname: PooledStr::default(),
                securitylevel: 0,
                authpassphrase: PooledStr::default(),
                privpassphrase: PooledStr::default(),
                authprotocol: 0,
                privprotocol: 0,
                contextname: PooledStr::default(),
            },
            ItemExtKind::Ipmi => ItemExt::Ipmi {
                sensor: PooledStr::default(),
            },
            ItemExtKind::Trapper => ItemExt::Trapper {
                trapper_hosts: PooledStr::default(),
            },
            ItemExtKind::Db => ItemExt::Db {
                params: PooledStr::default(),
                username: PooledStr::default(),
                password: PooledStr::default(),
            },
            ItemExtKind::Ssh => ItemExt::Ssh {
                authtype: 0,
                username: PooledStr::default(),
                password: PooledStr::default(),
                publickey: PooledStr::default(),
                privatekey: PooledStr::default(),
                params: PooledStr::default(),
            },
            ItemExtKind::Telnet => ItemExt::Telnet {
                username: PooledStr::default(),
                password: PooledStr::default(),
                params: PooledStr::default(),
            },
            ItemExtKind::Simple => ItemExt::Simple {
                username: PooledStr::default(),
                password: PooledStr::default(),
            },
            ItemExtKind::Jmx => ItemExt::Jmx {
                username: PooledStr::default(),
                password: PooledStr::default(),
                jmx_endpoint: PooledStr::default(),
            },
            ItemExtKind::Calculated => ItemExt::Calculated {
                formula: PooledStr::default(),
            },
        }
    }

    pub(crate) fn release_strings(
        self,
        pool: &mut StringPool,
    ) {
        let strings: Vec<PooledStr> = match self {
            ItemExt::Snmp {
                community,
                oid,
                securityname,
                authpassphrase,
                privpassphrase,
                contextname,
                ..
            } => vec![community, oid, securityname, authpassphrase, privpassphrase, contextname],
            ItemExt::Ipmi { sensor } => vec![sensor],
            ItemExt::Trapper { trapper_hosts } => vec![trapper_hosts],
            ItemExt::Db {
                params,
                username,
                password,
            } => vec![params, username, password],
            ItemExt::Ssh {
                username,
                password,
                publickey,
                privatekey,
                params,
                ..
            } => vec![username, password, publickey, privatekey, params],
            ItemExt::Telnet {
                username,
                password,
                params,
            } => vec![username, password, params],
            ItemExt::Simple { username, password } => vec![username, password],
            ItemExt::Jmx {
                username,
                password,
                jmx_endpoint,
            } => vec![username, password, jmx_endpoint],
            ItemExt::Calculated { formula } => vec![formula],
        };
        for s in strings {
            pool.release(s);
        }
    }
}

#[derive(Debug)]
pub struct LogItem {
    pub itemid: u64,
    pub logtimefmt: PooledStr,
}

#[derive(Debug)]
pub struct Trigger {
    pub triggerid: u64,
    pub description: PooledStr,
    pub expression: PooledStr,
    pub recovery_expression: PooledStr,
    /// Expression with user macros expanded; cleared on every sync pass
    pub expression_ex: Option<PooledStr>,
    pub error: PooledStr,
    pub priority: u8,
    pub trigger_type: u8,
    pub value: TriggerValue,
    pub state: TriggerState,
    pub status: TriggerStatus,
    pub lastchange: i64,
    pub topoindex: u32,
    pub locked: bool,
    pub functional: bool,
    pub timer: bool,
}

impl Trigger {
    pub fn new(triggerid: u64) -> Self {
        Self {
            triggerid,
            description: PooledStr::default(),
            expression: PooledStr::default(),
            recovery_expression: PooledStr::default(),
            expression_ex: None,
            error: PooledStr::default(),
            priority: 0,
            trigger_type: 0,
            value: TriggerValue::Ok,
            state: TriggerState::Normal,
            status: TriggerStatus::Enabled,
            lastchange: 0,
            topoindex: 1,
            locked: false,
            functional: true,
            timer: false,
        }
    }

    pub(crate) fn clear_expression_ex(
        &mut self,
        pool: &mut StringPool,
    ) {
        if let Some(old) = self.expression_ex.take() {
            pool.release(old);
        }
    }

    pub(crate) fn release_strings(
        &mut self,
        pool: &mut StringPool,
    ) {
        pool.clear(&mut self.description);
        pool.clear(&mut self.expression);
        pool.clear(&mut self.recovery_expression);
        pool.clear(&mut self.error);
        self.clear_expression_ex(pool);
    }

    /// Whether this trigger, as an upstream dependency, suppresses its dependents.
    pub fn is_blocking(&self) -> bool {
        self.value == TriggerValue::Problem
            && self.state == TriggerState::Normal
            && self.status == TriggerStatus::Enabled
            && self.functional
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerDep {
    pub triggerdepid: u64,
    pub triggerid_down: u64,
    pub triggerid_up: u64,
}

#[derive(Debug)]
pub struct Function {
    pub functionid: u64,
    pub itemid: u64,
    pub triggerid: u64,
    pub function: PooledStr,
    pub parameter: PooledStr,
    pub timer: bool,
}

#[derive(Debug)]
pub struct Expression {
    pub expressionid: u64,
    pub regexp: PooledStr,
    pub expression: PooledStr,
    pub expression_type: u8,
    pub delimiter: char,
    pub case_sensitive: bool,
}

#[derive(Debug)]
pub struct Action {
    pub actionid: u64,
    pub name: PooledStr,
    pub eventsource: u8,
    pub evaltype: u8,
    pub formula: PooledStr,
    /// Condition ids in evaluation order
    pub conditions: Vec<u64>,
}

#[derive(Debug)]
pub struct Condition {
    pub conditionid: u64,
    pub actionid: u64,
    pub conditiontype: u8,
    pub operator: u8,
    pub value: PooledStr,
    pub value2: PooledStr,
}
