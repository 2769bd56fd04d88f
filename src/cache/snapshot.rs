//! Owned copies of cache records handed out by the query API. Nothing here borrows the
//! cache, so callers may keep them after the lock guard is dropped.

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

use super::model::Action;
use super::model::AgentAvailability;
use super::model::Condition;
use super::model::Expression;
use super::model::Host;
use super::model::Interface;
use super::model::Item;
use super::model::ItemExt;
use super::model::ItemLocation;
use super::model::Trigger;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSnapshot {
    pub available: Availability,
    pub errors_from: i64,
    pub disable_until: i64,
    pub error: String,
}

impl From<&AgentAvailability> for AgentSnapshot {
    fn from(agent: &AgentAvailability) -> Self {
        Self {
            available: agent.available,
            errors_from: agent.errors_from,
            disable_until: agent.disable_until,
            error: agent.error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSnapshot {
    pub hostid: u64,
    pub proxy_hostid: u64,
    pub host: String,
    pub name: String,
    pub status: HostStatus,
    pub ipmi_authtype: i8,
    pub ipmi_privilege: u8,
    pub ipmi_username: String,
    pub ipmi_password: String,
    pub availability: [AgentSnapshot; AgentClass::COUNT],
    pub maintenance_status: bool,
    pub maintenance_type: MaintenanceType,
    pub maintenance_from: i64,
    pub tls_connect: u8,
    pub tls_accept: u8,
    pub tls_issuer: String,
    pub tls_subject: String,
    pub tls_psk_identity: String,
    pub tls_psk: String,
}

impl HostSnapshot {
    pub fn agent(
        &self,
        class: AgentClass,
    ) -> &AgentSnapshot {
        &self.availability[class.index()]
    }

    pub(crate) fn new(
        host: &Host,
        psk: Option<(&str, &str)>,
    ) -> Self {
        let (identity, value) = psk.unwrap_or(("", ""));
        Self {
            hostid: host.hostid,
            proxy_hostid: host.proxy_hostid,
            host: host.host.to_string(),
            name: host.name.to_string(),
            status: host.status,
            ipmi_authtype: host.ipmi_authtype,
            ipmi_privilege: host.ipmi_privilege,
            ipmi_username: host.ipmi_username.to_string(),
            ipmi_password: host.ipmi_password.to_string(),
            availability: [
                host.agent(AgentClass::Zabbix).into(),
                host.agent(AgentClass::Snmp).into(),
                host.agent(AgentClass::Ipmi).into(),
                host.agent(AgentClass::Jmx).into(),
            ],
            maintenance_status: host.maintenance_status,
            maintenance_type: host.maintenance_type,
            maintenance_from: host.maintenance_from,
            tls_connect: host.tls_connect,
            tls_accept: host.tls_accept,
            tls_issuer: host.tls_issuer.to_string(),
            tls_subject: host.tls_subject.to_string(),
            tls_psk_identity: identity.to_string(),
            tls_psk: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSnapshot {
    pub interfaceid: u64,
    pub hostid: u64,
    pub interface_type: InterfaceType,
    pub main: bool,
    pub useip: bool,
    pub ip: String,
    pub dns: String,
    pub port: String,
    pub bulk: bool,
}

impl InterfaceSnapshot {
    /// Address polled: IP or DNS name depending on `useip`
    pub fn address(&self) -> &str {
        if self.useip {
            &self.ip
        } else {
            &self.dns
        }
    }
}

impl From<&Interface> for InterfaceSnapshot {
    fn from(interface: &Interface) -> Self {
        Self {
            interfaceid: interface.interfaceid,
            hostid: interface.hostid,
            interface_type: interface.interface_type,
            main: interface.main,
            useip: interface.useip,
            ip: interface.ip.to_string(),
            dns: interface.dns.to_string(),
            port: interface.port.to_string(),
            bulk: interface.bulk,
        }
    }
}

/// Type-specific item data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemExtSnapshot {
    Snmp {
        community: String,
        oid: String,
        securityname: String,
        securitylevel: u8,
        authpassphrase: String,
        privpassphrase: String,
        authprotocol: u8,
        privprotocol: u8,
        contextname: String,
    },
    Ipmi {
        sensor: String,
    },
    Trapper {
        trapper_hosts: String,
    },
    Db {
        params: String,
        username: String,
        password: String,
    },
    Ssh {
        authtype: u8,
        username: String,
        password: String,
        publickey: String,
        privatekey: String,
        params: String,
    },
    Telnet {
        username: String,
        password: String,
        params: String,
    },
    Simple {
        username: String,
        password: String,
    },
    Jmx {
        username: String,
        password: String,
        jmx_endpoint: String,
    },
    Calculated {
        formula: String,
    },
}

impl From<&ItemExt> for ItemExtSnapshot {
    fn from(ext: &ItemExt) -> Self {
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
            } => ItemExtSnapshot::Snmp {
                community: community.to_string(),
                oid: oid.to_string(),
                securityname: securityname.to_string(),
                securitylevel: *securitylevel,
                authpassphrase: authpassphrase.to_string(),
                privpassphrase: privpassphrase.to_string(),
                authprotocol: *authprotocol,
                privprotocol: *privprotocol,
                contextname: contextname.to_string(),
            },
            ItemExt::Ipmi { sensor } => ItemExtSnapshot::Ipmi {
                sensor: sensor.to_string(),
            },
            ItemExt::Trapper { trapper_hosts } => ItemExtSnapshot::Trapper {
                trapper_hosts: trapper_hosts.to_string(),
            },
            ItemExt::Db {
                params,
                username,
                password,
            } => ItemExtSnapshot::Db {
                params: params.to_string(),
                username: username.to_string(),
                password: password.to_string(),
            },
            ItemExt::Ssh {
                authtype,
                username,
                password,
                publickey,
                privatekey,
                params,
            } => ItemExtSnapshot::Ssh {
                authtype: *authtype,
                username: username.to_string(),
                password: password.to_string(),
                publickey: publickey.to_string(),
                privatekey: privatekey.to_string(),
                params: params.to_string(),
            },
            ItemExt::Telnet {
                username,
                password,
                params,
            } => ItemExtSnapshot::Telnet {
                username: username.to_string(),
                password: password.to_string(),
                params: params.to_string(),
            },
            ItemExt::Simple { username, password } => ItemExtSnapshot::Simple {
                username: username.to_string(),
                password: password.to_string(),
            },
            ItemExt::Jmx {
                username,
                password,
                jmx_endpoint,
            } => ItemExtSnapshot::Jmx {
                username: username.to_string(),
                password: password.to_string(),
                jmx_endpoint: jmx_endpoint.to_string(),
            },
            ItemExt::Calculated { formula } => ItemExtSnapshot::Calculated {
                formula: formula.to_string(),
            },
        }
    }
}

/// Item together with what a poller needs to check it.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSnapshot {
    pub itemid: u64,
    pub hostid: u64,
    pub host: String,
    pub interfaceid: u64,
    pub item_type: ItemType,
    pub value_type: ValueType,
    pub key: String,
    pub status: ItemStatus,
    pub state: ItemState,
    pub error: String,
    pub flags: u8,
    pub delay: i64,
    pub delay_flex: String,
    pub nextcheck: i64,
    pub lastclock: i64,
    pub lastlogsize: u64,
    pub mtime: i32,
    pub master_itemid: u64,
    pub poller_type: Option<PollerType>,
    pub location: ItemLocation,
    pub triggers: Vec<u64>,
    pub logtimefmt: Option<String>,
    pub ext: Option<ItemExtSnapshot>,
    pub interface: Option<InterfaceSnapshot>,
}

impl ItemSnapshot {
    pub(crate) fn new(
        item: &Item,
        host_name: &str,
    ) -> Self {
        Self {
            itemid: item.itemid,
            hostid: item.hostid,
            host: host_name.to_string(),
            interfaceid: item.interfaceid,
            item_type: item.item_type,
            value_type: item.value_type,
            key: item.key.to_string(),
            status: item.status,
            state: item.state,
            error: item.error.to_string(),
            flags: item.flags,
            delay: item.delay,
            delay_flex: item.delay_flex.to_string(),
            nextcheck: item.nextcheck,
            lastclock: item.lastclock,
            lastlogsize: item.lastlogsize,
            mtime: item.mtime,
            master_itemid: item.master_itemid,
            poller_type: item.poller_type,
            location: item.location,
            triggers: item.triggers.clone(),
            logtimefmt: None,
            ext: None,
            interface: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSnapshot {
    pub triggerid: u64,
    pub description: String,
    pub expression: String,
    pub recovery_expression: String,
    /// Expression with user macros expanded
    pub expression_ex: String,
    pub error: String,
    pub priority: u8,
    pub trigger_type: u8,
    pub value: TriggerValue,
    pub state: TriggerState,
    pub status: TriggerStatus,
    pub lastchange: i64,
    pub topoindex: u32,
    pub functional: bool,
}

impl TriggerSnapshot {
    pub(crate) fn new(
        trigger: &Trigger,
        expression_ex: String,
    ) -> Self {
        Self {
            triggerid: trigger.triggerid,
            description: trigger.description.to_string(),
            expression: trigger.expression.to_string(),
            recovery_expression: trigger.recovery_expression.to_string(),
            expression_ex,
            error: trigger.error.to_string(),
            priority: trigger.priority,
            trigger_type: trigger.trigger_type,
            value: trigger.value,
            state: trigger.state,
            status: trigger.status,
            lastchange: trigger.lastchange,
            topoindex: trigger.topoindex,
            functional: trigger.functional,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionSnapshot {
    pub expressionid: u64,
    pub regexp: String,
    pub expression: String,
    pub expression_type: u8,
    pub delimiter: char,
    pub case_sensitive: bool,
}

impl From<&Expression> for ExpressionSnapshot {
    fn from(expression: &Expression) -> Self {
        Self {
            expressionid: expression.expressionid,
            regexp: expression.regexp.to_string(),
            expression: expression.expression.to_string(),
            expression_type: expression.expression_type,
            delimiter: expression.delimiter,
            case_sensitive: expression.case_sensitive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionSnapshot {
    pub conditionid: u64,
    pub conditiontype: u8,
    pub operator: u8,
    pub value: String,
    pub value2: String,
}

impl From<&Condition> for ConditionSnapshot {
    fn from(condition: &Condition) -> Self {
        Self {
            conditionid: condition.conditionid,
            conditiontype: condition.conditiontype,
            operator: condition.operator,
            value: condition.value.to_string(),
            value2: condition.value2.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSnapshot {
    pub actionid: u64,
    pub name: String,
    pub eventsource: u8,
    pub evaltype: u8,
    pub formula: String,
    pub conditions: Vec<ConditionSnapshot>,
}

impl ActionSnapshot {
    pub(crate) fn new(
        action: &Action,
        conditions: Vec<ConditionSnapshot>,
    ) -> Self {
        Self {
            actionid: action.actionid,
            name: action.name.to_string(),
            eventsource: action.eventsource,
            evaltype: action.evaltype,
            formula: action.formula.to_string(),
            conditions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxySnapshot {
    pub hostid: u64,
    pub config_nextcheck: i64,
    pub data_nextcheck: i64,
    pub timediff: i64,
    pub lastaccess: i64,
}

/// Preprocessing view of one item, fed to the preprocessing manager.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocItem {
    pub itemid: u64,
    pub item_type: ItemType,
    pub value_type: ValueType,
    pub ops: Vec<PreprocOp>,
    pub dependent_itemids: Vec<u64>,
}

/// Record counts of the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hosts: usize,
    pub proxies: usize,
    pub psks: usize,
    pub interfaces: usize,
    pub items: usize,
    pub triggers: usize,
    pub functions: usize,
    pub trigger_deps: usize,
    pub global_macros: usize,
    pub host_macros: usize,
    pub expressions: usize,
    pub actions: usize,
    pub conditions: usize,
    pub pooled_strings: usize,
    /// Queue lengths indexed by `PollerType::index`
    pub queues: [usize; PollerType::COUNT],
    pub proxy_queue: usize,
    pub revision: u64,
}
