use crate::cache::ConfigRows;
use crate::cache::FunctionRow;
use crate::cache::HostRow;
use crate::cache::InterfaceRow;
use crate::cache::ItemRow;
use crate::cache::TriggerDepRow;
use crate::cache::TriggerRow;

pub fn host_row(
    hostid: u64,
    host: &str,
) -> HostRow {
    HostRow {
        hostid,
        host: host.to_string(),
        name: host.to_string(),
        ipmi_privilege: 2,
        ..Default::default()
    }
}

pub fn agent_interface_row(
    interfaceid: u64,
    hostid: u64,
) -> InterfaceRow {
    InterfaceRow {
        interfaceid,
        hostid,
        interface_type: 1,
        main: 1,
        useip: 1,
        ip: "127.0.0.1".to_string(),
        port: "10050".to_string(),
        bulk: 1,
        ..Default::default()
    }
}

pub fn snmp_interface_row(
    interfaceid: u64,
    hostid: u64,
) -> InterfaceRow {
    InterfaceRow {
        interfaceid,
        hostid,
        interface_type: 2,
        main: 1,
        useip: 1,
        ip: "10.0.0.1".to_string(),
        port: "161".to_string(),
        bulk: 1,
        ..Default::default()
    }
}

/// Passive agent item with a 60 second interval.
pub fn agent_item_row(
    itemid: u64,
    hostid: u64,
    interfaceid: u64,
    key: &str,
) -> ItemRow {
    ItemRow {
        itemid,
        hostid,
        interfaceid,
        item_type: 0,
        value_type: 3,
        key: key.to_string(),
        delay: "60".to_string(),
        ..Default::default()
    }
}

/// SNMPv2c item with a 60 second interval.
pub fn snmp_item_row(
    itemid: u64,
    hostid: u64,
    interfaceid: u64,
    key: &str,
) -> ItemRow {
    ItemRow {
        itemid,
        hostid,
        interfaceid,
        item_type: 4,
        value_type: 3,
        key: key.to_string(),
        delay: "60".to_string(),
        snmp_community: "public".to_string(),
        snmp_oid: format!("1.3.6.1.2.1.2.2.1.10.{}", itemid),
        ..Default::default()
    }
}

pub fn trigger_row(
    triggerid: u64,
    expression: &str,
) -> TriggerRow {
    TriggerRow {
        triggerid,
        description: format!("trigger {}", triggerid),
        expression: expression.to_string(),
        priority: 2,
        ..Default::default()
    }
}

pub fn function_row(
    functionid: u64,
    itemid: u64,
    triggerid: u64,
    function: &str,
) -> FunctionRow {
    FunctionRow {
        functionid,
        itemid,
        triggerid,
        function: function.to_string(),
        parameter: "0".to_string(),
    }
}

pub fn trigger_dep_row(
    triggerdepid: u64,
    triggerid_down: u64,
    triggerid_up: u64,
) -> TriggerDepRow {
    TriggerDepRow {
        triggerdepid,
        triggerid_down,
        triggerid_up,
    }
}

/// Two agent hosts with one interface, two items and one trigger each.
pub fn sample_rows() -> ConfigRows {
    ConfigRows {
        hosts: vec![host_row(1, "web-01"), host_row(2, "db-01")],
        interfaces: vec![agent_interface_row(11, 1), agent_interface_row(21, 2)],
        items: vec![
            agent_item_row(101, 1, 11, "system.cpu.load"),
            agent_item_row(102, 1, 11, "vm.memory.size[available]"),
            agent_item_row(201, 2, 21, "system.cpu.load"),
            agent_item_row(202, 2, 21, "net.tcp.service[mysql]"),
        ],
        triggers: vec![
            trigger_row(1001, "{1}>5"),
            trigger_row(2001, "{2}=0"),
        ],
        functions: vec![
            function_row(1, 101, 1001, "last"),
            function_row(2, 202, 2001, "last"),
        ],
        ..Default::default()
    }
}
