//! Row sets as delivered by the configuration source, one vector per entity kind.
//!
//! Enumerated columns keep their numeric database codes; the synchronizer decodes them.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigRow {
    pub refresh_unsupported: i64,
    pub default_inventory_mode: i8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostAgentRow {
    pub available: u8,
    pub errors_from: i64,
    pub disable_until: i64,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostRow {
    pub hostid: u64,
    pub proxy_hostid: u64,
    pub host: String,
    pub name: String,
    pub status: u8,
    pub ipmi_authtype: i8,
    pub ipmi_privilege: u8,
    pub ipmi_username: String,
    pub ipmi_password: String,
    pub agent: HostAgentRow,
    pub snmp: HostAgentRow,
    pub ipmi: HostAgentRow,
    pub jmx: HostAgentRow,
    pub maintenance_status: u8,
    pub maintenance_type: u8,
    pub maintenance_from: i64,
    pub tls_connect: u8,
    pub tls_accept: u8,
    pub tls_issuer: String,
    pub tls_subject: String,
    pub tls_psk_identity: String,
    pub tls_psk: String,
    pub lastaccess: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostInventoryRow {
    pub hostid: u64,
    pub inventory_mode: i8,
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostTemplateRow {
    pub hosttemplateid: u64,
    pub hostid: u64,
    pub templateid: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalMacroRow {
    pub globalmacroid: u64,
    #[serde(rename = "macro")]
    pub macro_name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostMacroRow {
    pub hostmacroid: u64,
    pub hostid: u64,
    #[serde(rename = "macro")]
    pub macro_name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceRow {
    pub interfaceid: u64,
    pub hostid: u64,
    #[serde(rename = "type")]
    pub interface_type: u8,
    pub main: u8,
    pub useip: u8,
    pub ip: String,
    pub dns: String,
    pub port: String,
    pub bulk: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemRow {
    pub itemid: u64,
    pub hostid: u64,
    pub interfaceid: u64,
    #[serde(rename = "type")]
    pub item_type: u8,
    pub value_type: u8,
    pub key: String,
    pub status: u8,
    pub state: u8,
    pub error: String,
    pub flags: u8,
    pub delay: String,
    pub delay_flex: String,
    pub lastlogsize: u64,
    pub mtime: i32,
    pub master_itemid: u64,
    pub snmp_community: String,
    pub snmp_oid: String,
    pub snmpv3_securityname: String,
    pub snmpv3_securitylevel: u8,
    pub snmpv3_authpassphrase: String,
    pub snmpv3_privpassphrase: String,
    pub snmpv3_authprotocol: u8,
    pub snmpv3_privprotocol: u8,
    pub snmpv3_contextname: String,
    pub ipmi_sensor: String,
    pub trapper_hosts: String,
    pub params: String,
    pub username: String,
    pub password: String,
    pub publickey: String,
    pub privatekey: String,
    pub authtype: u8,
    pub jmx_endpoint: String,
    pub logtimefmt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemPreprocRow {
    pub item_preprocid: u64,
    pub itemid: u64,
    pub step: u32,
    #[serde(rename = "type")]
    pub step_type: u8,
    pub params: String,
    pub error_handler: u8,
    pub error_handler_params: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerRow {
    pub triggerid: u64,
    pub description: String,
    pub expression: String,
    pub recovery_expression: String,
    pub error: String,
    pub priority: u8,
    #[serde(rename = "type")]
    pub trigger_type: u8,
    pub value: u8,
    pub state: u8,
    pub status: u8,
    pub lastchange: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerDepRow {
    pub triggerdepid: u64,
    pub triggerid_down: u64,
    pub triggerid_up: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionRow {
    pub functionid: u64,
    pub itemid: u64,
    pub triggerid: u64,
    #[serde(rename = "name")]
    pub function: String,
    pub parameter: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpressionRow {
    pub expressionid: u64,
    /// Name of the global regular expression this entry belongs to
    pub name: String,
    pub expression: String,
    pub expression_type: u8,
    pub exp_delimiter: String,
    pub case_sensitive: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionRow {
    pub actionid: u64,
    pub name: String,
    pub eventsource: u8,
    pub evaltype: u8,
    pub formula: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionRow {
    pub conditionid: u64,
    pub actionid: u64,
    pub conditiontype: u8,
    pub operator: u8,
    pub value: String,
    pub value2: String,
}

/// One full fetch, in synchronization order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigRows {
    pub config: Option<ConfigRow>,
    pub hosts: Vec<HostRow>,
    pub host_inventory: Vec<HostInventoryRow>,
    pub host_templates: Vec<HostTemplateRow>,
    pub global_macros: Vec<GlobalMacroRow>,
    pub host_macros: Vec<HostMacroRow>,
    pub interfaces: Vec<InterfaceRow>,
    pub items: Vec<ItemRow>,
    pub item_preproc: Vec<ItemPreprocRow>,
    pub triggers: Vec<TriggerRow>,
    pub trigger_deps: Vec<TriggerDepRow>,
    pub functions: Vec<FunctionRow>,
    pub expressions: Vec<ExpressionRow>,
    pub actions: Vec<ActionRow>,
    pub conditions: Vec<ConditionRow>,
}

impl ConfigRows {
    pub fn row_count(&self) -> usize {
        self.config.iter().count()
            + self.hosts.len()
            + self.host_inventory.len()
            + self.host_templates.len()
            + self.global_macros.len()
            + self.host_macros.len()
            + self.interfaces.len()
            + self.items.len()
            + self.item_preproc.len()
            + self.triggers.len()
            + self.trigger_deps.len()
            + self.functions.len()
            + self.expressions.len()
            + self.actions.len()
            + self.conditions.len()
    }
}
