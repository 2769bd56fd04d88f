use super::model::ItemExtKind;
use super::model::UsedInterfaces;
use super::rows::*;
use super::state::CacheState;
use crate::constants::AgentClass;
use crate::constants::ErrorHandler;
use crate::constants::InterfaceType;
use crate::constants::PollerType;
use crate::constants::PreprocStepType;
use crate::constants::TLS_PSK;
use crate::preprocessing::PreprocOp;
use crate::test_utils::*;

const NOW: i64 = 1_700_000_000;

fn psk_host_row(
    hostid: u64,
    host: &str,
    identity: &str,
    psk: &str,
) -> HostRow {
    HostRow {
        tls_connect: TLS_PSK,
        tls_accept: TLS_PSK,
        tls_psk_identity: identity.to_string(),
        tls_psk: psk.to_string(),
        ..host_row(hostid, host)
    }
}

/// Every PSK refcount equals the number of hosts pointing at it.
fn assert_psk_refcounts(state: &CacheState) {
    for (identity, psk) in &state.psks {
        let users = state
            .hosts
            .values()
            .filter(|host| host.tls_dc_psk.as_deref() == Some(&**identity))
            .count();
        assert_eq!(psk.refcount, users, "refcount of PSK {}", identity);
        assert!(psk.refcount > 0);
    }
}

#[test]
fn test_sync_twice_is_idempotent() {
    enable_logger();
    let mut state = test_state();
    let rows = sample_rows();

    let first = state.sync(&rows, NOW);
    let pooled = state.pool.len();
    let host = state.get_host_by_id(1);
    let item = state.get_item_by_id(101);
    let queued = state.stats().queues;

    let second = state.sync(&rows, NOW + 60);

    assert_eq!(first.get("hosts").map(|s| s.inserted), Some(2));
    assert_eq!(first.get("items").map(|s| s.inserted), Some(4));
    let hosts = second.get("hosts").unwrap();
    assert_eq!((hosts.inserted, hosts.updated, hosts.removed), (0, 2, 0));
    assert_eq!(second.total_changes(), 0);
    assert_eq!(state.pool.len(), pooled);
    assert_eq!(state.get_host_by_id(1), host);
    assert_eq!(state.get_item_by_id(101), item);
    assert_eq!(state.stats().queues, queued);
    assert_eq!(state.hosts_by_name.len(), 2);
    assert_eq!(state.items_by_host_key.values().map(|keys| keys.len()).sum::<usize>(), 4);
    assert_eq!(state.revision(), 2);
}

/// # Case 1: a host missing from the rows is removed together with its name index entry
/// # Case 2: items, interfaces and functions of the removed host go with it
/// # Case 3: the pooled host name is released
#[test]
fn test_sync_removes_records_absent_from_rows() {
    let mut state = test_state();
    state.sync(&sample_rows(), NOW);
    assert!(state.get_host_by_name("db-01").is_some());

    let mut rows = sample_rows();
    rows.hosts.retain(|row| row.hostid != 2);
    rows.triggers.retain(|row| row.triggerid != 2001);
    let stats = state.sync(&rows, NOW + 60);

    // Case 1
    assert!(state.get_host_by_id(2).is_none());
    assert!(state.get_host_by_name("db-01").is_none());
    assert_eq!(stats.get("hosts").map(|s| s.removed), Some(1));

    // Case 2
    assert!(state.get_item_by_id(201).is_none());
    assert!(state.get_item_by_key("db-01", "net.tcp.service[mysql]").is_none());
    assert_eq!(stats.get("items").map(|s| s.skipped), Some(2));
    assert_eq!(stats.get("items").map(|s| s.removed), Some(2));
    assert!(state.get_interface_by_type(2, InterfaceType::Agent).is_none());
    assert_eq!(state.functions.len(), 1);
    assert_eq!(state.stats().queues[PollerType::Normal.index()], 2);

    // Case 3
    assert_eq!(state.pool.refcount("db-01"), 0);
    assert_eq!(state.pool.refcount("net.tcp.service[mysql]"), 0);
    // still used by item 101
    assert_eq!(state.pool.refcount("system.cpu.load"), 1);
}

#[test]
fn test_sync_live_ids_match_row_ids() {
    let mut state = test_state();
    let mut rows = sample_rows();
    state.sync(&rows, NOW);

    rows.items.push(agent_item_row(103, 1, 11, "agent.ping"));
    rows.items.retain(|row| row.itemid != 102);
    state.sync(&rows, NOW + 60);

    let mut live: Vec<u64> = state.items.keys().copied().collect();
    live.sort_unstable();
    let mut expected: Vec<u64> = rows.items.iter().map(|row| row.itemid).collect();
    expected.sort_unstable();
    assert_eq!(live, expected);
}

#[test]
fn test_templates_are_not_cached_and_their_items_are_skipped() {
    let mut state = test_state();
    let mut rows = sample_rows();
    rows.hosts.push(HostRow {
        status: 3,
        ..host_row(50, "Template OS Linux")
    });
    rows.items.push(agent_item_row(501, 50, 0, "system.uptime"));

    let stats = state.sync(&rows, NOW);

    assert!(state.get_host_by_id(50).is_none());
    assert!(state.get_item_by_id(501).is_none());
    assert_eq!(stats.get("items").map(|s| s.skipped), Some(1));
}

#[test]
fn test_item_key_index_follows_key_change() {
    let mut state = test_state();
    let mut rows = sample_rows();
    state.sync(&rows, NOW);

    rows.items[0].key = "system.cpu.load[all,avg1]".to_string();
    state.sync(&rows, NOW + 60);

    assert!(state.get_item_by_key("web-01", "system.cpu.load").is_none());
    let item = state.get_item_by_key("web-01", "system.cpu.load[all,avg1]").unwrap();
    assert_eq!(item.itemid, 101);
    assert_eq!(item.host, "web-01");
    // host 2 still has its own item with the old key
    assert_eq!(state.get_item_by_key("db-01", "system.cpu.load").map(|i| i.itemid), Some(201));
}

/// # Case 1: an SNMP item turned trapper gets a trapper record, the SNMP strings are released
/// # Case 2: a log item turned float loses its log record
#[test]
fn test_type_change_replaces_item_extension() {
    let mut state = test_state();
    let mut rows = ConfigRows {
        hosts: vec![host_row(1, "switch-01")],
        interfaces: vec![snmp_interface_row(12, 1), agent_interface_row(11, 1)],
        items: vec![
            snmp_item_row(301, 1, 12, "ifInOctets[1]"),
            ItemRow {
                value_type: 2,
                logtimefmt: "yyyyMMdd:hhmmss".to_string(),
                ..agent_item_row(302, 1, 11, "log[/var/log/syslog]")
            },
        ],
        ..Default::default()
    };
    state.sync(&rows, NOW);

    assert_eq!(state.item_ext.get(&301).map(|ext| ext.kind()), Some(ItemExtKind::Snmp));
    assert_eq!(state.pool.refcount("public"), 1);
    assert!(state.queue_key(&state.items[&301]).snmp.is_some());
    assert!(state.logitems.contains_key(&302));
    assert_eq!(state.pool.refcount("yyyyMMdd:hhmmss"), 1);

    rows.items[0].item_type = 2;
    rows.items[0].trapper_hosts = "10.0.0.0/24".to_string();
    rows.items[1].value_type = 0;
    state.sync(&rows, NOW + 60);

    // Case 1
    assert_eq!(state.item_ext.get(&301).map(|ext| ext.kind()), Some(ItemExtKind::Trapper));
    assert_eq!(state.pool.refcount("public"), 0);
    assert_eq!(state.pool.refcount("10.0.0.0/24"), 1);
    assert!(state.queue_key(&state.items[&301]).snmp.is_none());
    assert_eq!(state.stats().queues[PollerType::Normal.index()], 1);

    // Case 2
    assert!(!state.logitems.contains_key(&302));
    assert_eq!(state.pool.refcount("yyyyMMdd:hhmmss"), 0);
}

/// # Case 1: hosts sharing an identity share one PSK record
/// # Case 2: the first host of a pass decides a conflicting value
/// # Case 3: dropping PSK from a host releases its reference
/// # Case 4: the last reference removes the record
#[test]
fn test_psk_refcount() {
    let mut state = test_state();
    let mut rows = ConfigRows {
        hosts: vec![
            psk_host_row(1, "web-01", "psk-a", "aaaa"),
            psk_host_row(2, "web-02", "psk-a", "bbbb"),
            psk_host_row(3, "web-03", "psk-b", "cccc"),
        ],
        ..Default::default()
    };

    // Case 1
    state.sync(&rows, NOW);
    assert_eq!(state.psks.len(), 2);
    assert_eq!(state.psks.get("psk-a").map(|psk| psk.refcount), Some(2));
    assert_psk_refcounts(&state);

    // Case 2
    assert_eq!(state.get_host_by_id(2).unwrap().tls_psk, "aaaa");
    state.sync(&rows, NOW + 60);
    assert_eq!(state.get_host_by_id(1).unwrap().tls_psk, "aaaa");
    assert_psk_refcounts(&state);

    // Case 3
    rows.hosts[1] = host_row(2, "web-02");
    state.sync(&rows, NOW + 120);
    assert_eq!(state.psks.get("psk-a").map(|psk| psk.refcount), Some(1));
    assert_eq!(state.get_host_by_id(2).unwrap().tls_psk_identity, "");
    assert_psk_refcounts(&state);

    // Case 4
    rows.hosts.remove(0);
    state.sync(&rows, NOW + 180);
    assert!(state.psks.get("psk-a").is_none());
    assert_eq!(state.pool.refcount("psk-a"), 0);
    assert_eq!(state.pool.refcount("aaaa"), 0);
    assert_psk_refcounts(&state);
}

#[test]
fn test_psk_identity_change_moves_reference() {
    let mut state = test_state();
    let mut rows = ConfigRows {
        hosts: vec![psk_host_row(1, "web-01", "psk-a", "aaaa")],
        ..Default::default()
    };
    state.sync(&rows, NOW);

    rows.hosts[0] = psk_host_row(1, "web-01", "psk-z", "zzzz");
    state.sync(&rows, NOW + 60);

    assert!(state.psks.get("psk-a").is_none());
    assert_eq!(state.psks.get("psk-z").map(|psk| psk.refcount), Some(1));
    let host = state.get_host_by_id(1).unwrap();
    assert_eq!((host.tls_psk_identity.as_str(), host.tls_psk.as_str()), ("psk-z", "zzzz"));
}

/// # Case 1: used interfaces are learned from active items
/// # Case 2: a proxy change makes them unknown and stops direct polling
/// # Case 3: the next pass learns them again
#[test]
fn test_used_interfaces_and_proxy_move() {
    let mut state = test_state();
    let mut rows = sample_rows();

    // Case 1
    state.sync(&rows, NOW);
    assert_eq!(
        state.hosts.get(&1).map(|host| host.used_interfaces),
        Some(UsedInterfaces::Known(AgentClass::Zabbix.flag()))
    );
    assert_eq!(state.stats().queues[PollerType::Normal.index()], 4);

    // Case 2
    rows.hosts.push(HostRow {
        status: 6,
        ..host_row(9, "proxy-9")
    });
    rows.hosts[0].proxy_hostid = 9;
    state.sync(&rows, NOW + 60);
    assert_eq!(state.hosts.get(&1).map(|host| host.used_interfaces), Some(UsedInterfaces::Unknown));
    assert_eq!(state.stats().queues[PollerType::Normal.index()], 2);
    assert!(state.get_proxy_by_name("proxy-9").is_some());
    assert!(state.get_host_by_name("proxy-9").is_none());
    assert_eq!(state.proxy_queue.len(), 1);

    // Case 3
    state.sync(&rows, NOW + 120);
    assert_eq!(
        state.hosts.get(&1).map(|host| host.used_interfaces),
        Some(UsedInterfaces::Known(AgentClass::Zabbix.flag()))
    );
}

#[test]
fn test_main_interface_index() {
    let mut state = test_state();
    let mut rows = sample_rows();
    rows.interfaces.push(snmp_interface_row(12, 1));
    rows.interfaces.push(InterfaceRow {
        main: 0,
        ..agent_interface_row(13, 1)
    });
    state.sync(&rows, NOW);

    assert_eq!(state.get_interface_by_type(1, InterfaceType::Agent).map(|i| i.interfaceid), Some(11));
    assert_eq!(state.get_interface_by_type(1, InterfaceType::Snmp).map(|i| i.interfaceid), Some(12));
    assert!(state.get_interface_by_type(1, InterfaceType::Ipmi).is_none());

    rows.interfaces.retain(|row| row.interfaceid != 11);
    state.sync(&rows, NOW + 60);
    assert!(state.get_interface_by_type(1, InterfaceType::Agent).is_none());
}

#[test]
fn test_item_preproc_steps_and_dependents() {
    let mut state = test_state();
    let mut rows = sample_rows();
    rows.items.push(ItemRow {
        item_type: 18,
        master_itemid: 101,
        delay: "0".to_string(),
        ..agent_item_row(103, 1, 0, "cpu.load.dependent")
    });
    rows.item_preproc = vec![
        ItemPreprocRow {
            item_preprocid: 2,
            itemid: 101,
            step: 2,
            step_type: 9,
            ..Default::default()
        },
        ItemPreprocRow {
            item_preprocid: 1,
            itemid: 101,
            step: 1,
            step_type: 1,
            params: "8".to_string(),
            ..Default::default()
        },
        ItemPreprocRow {
            item_preprocid: 3,
            itemid: 999,
            step: 1,
            step_type: 1,
            params: "2".to_string(),
            ..Default::default()
        },
    ];

    let stats = state.sync(&rows, NOW);
    assert_eq!(stats.get("item_preproc").map(|s| (s.inserted, s.skipped)), Some((1, 1)));

    let mut revision = 0;
    let items = state.get_preprocessable_items(&mut revision).unwrap();
    assert_eq!(revision, state.revision());
    assert_eq!(items.iter().map(|item| item.itemid).collect::<Vec<_>>(), vec![101, 103]);
    assert_eq!(items[0].dependent_itemids, vec![103]);
    assert!(items[1].ops.is_empty());
    assert_eq!(
        items[0].ops,
        vec![
            PreprocOp {
                step_type: PreprocStepType::Multiplier,
                params: "8".to_string(),
                error_handler: ErrorHandler::Default,
                error_handler_params: String::new(),
            },
            PreprocOp {
                step_type: PreprocStepType::DeltaValue,
                params: String::new(),
                error_handler: ErrorHandler::Default,
                error_handler_params: String::new(),
            },
        ]
    );
    assert!(state.get_preprocessable_items(&mut revision).is_none());

    state.sync(&rows, NOW + 60);
    assert!(state.get_preprocessable_items(&mut revision).is_some());
}

#[test]
fn test_runtime_fields_are_not_overwritten_by_rows() {
    let mut state = test_state();
    let mut rows = sample_rows();
    rows.hosts[0].agent.available = 1;
    state.sync(&rows, NOW);

    state.deactivate_host(1, AgentClass::Zabbix, NOW, "connection refused");
    state.sync(&rows, NOW + 60);

    let host = state.get_host_by_id(1).unwrap();
    assert_eq!(host.agent(AgentClass::Zabbix).errors_from, NOW);
}

#[test]
fn test_global_and_host_macros_are_indexed_by_name() {
    let mut state = test_state();
    let mut rows = sample_rows();
    rows.global_macros = vec![
        GlobalMacroRow {
            globalmacroid: 1,
            macro_name: "{$CPU.MAX}".to_string(),
            value: "5".to_string(),
        },
        GlobalMacroRow {
            globalmacroid: 2,
            macro_name: "bad macro".to_string(),
            value: "x".to_string(),
        },
    ];
    rows.host_macros = vec![HostMacroRow {
        hostmacroid: 1,
        hostid: 1,
        macro_name: "{$CPU.MAX:\"web\"}".to_string(),
        value: "9".to_string(),
    }];

    let stats = state.sync(&rows, NOW);

    assert_eq!(stats.get("global_macros").map(|s| (s.inserted, s.skipped)), Some((1, 1)));
    assert_eq!(state.gmacros_by_name.get("CPU.MAX").map(|ids| ids.len()), Some(1));
    assert_eq!(state.hmacros.get(&1).and_then(|m| m.context.as_ref()).map(|c| c.to_string()), Some("web".to_string()));

    rows.global_macros.clear();
    state.sync(&rows, NOW + 60);
    assert!(state.gmacros_by_name.get("CPU.MAX").is_none());
}
