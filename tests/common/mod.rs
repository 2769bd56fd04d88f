use std::path::Path;

use monitor_cache::cache::ConfigRows;
use serde_json::json;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    env_logger::init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for integration test.");
}

/// One agent host with a load item, a scaled copy of it and a ping item.
pub fn rows_document() -> serde_json::Value {
    json!({
        "hosts": [
            { "hostid": 1, "host": "web-01", "name": "web-01", "ipmi_privilege": 2 }
        ],
        "interfaces": [
            { "interfaceid": 11, "hostid": 1, "type": 1, "main": 1, "useip": 1,
              "ip": "127.0.0.1", "port": "10050", "bulk": 1 }
        ],
        "items": [
            { "itemid": 101, "hostid": 1, "interfaceid": 11, "type": 0, "value_type": 3,
              "key": "system.cpu.load", "delay": "60" },
            { "itemid": 102, "hostid": 1, "interfaceid": 11, "type": 0, "value_type": 3,
              "key": "agent.ping", "delay": "30" },
            { "itemid": 103, "hostid": 1, "interfaceid": 0, "type": 18, "value_type": 0,
              "key": "system.cpu.load.percent", "delay": "0", "master_itemid": 101 }
        ],
        "item_preproc": [
            { "item_preprocid": 1, "itemid": 101, "step": 1, "type": 1, "params": "2" },
            { "item_preprocid": 2, "itemid": 103, "step": 1, "type": 1, "params": "0.5" }
        ],
        "triggers": [
            { "triggerid": 1001, "description": "high load", "expression": "{1}>5", "priority": 2 }
        ],
        "functions": [
            { "functionid": 1, "itemid": 101, "triggerid": 1001, "function": "last", "parameter": "0" }
        ]
    })
}

#[allow(dead_code)]
pub fn rows() -> ConfigRows {
    serde_json::from_value(rows_document()).expect("valid rows document")
}

#[allow(dead_code)]
pub fn write_rows(path: &Path) {
    std::fs::write(path, serde_json::to_vec_pretty(&rows_document()).unwrap()).unwrap();
}
