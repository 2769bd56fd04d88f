use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::worker::process_task;
use super::*;
use crate::cache::ConfigCache;
use crate::cache::ConfigRows;
use crate::cache::ItemPreprocRow;
use crate::cache::ItemRow;
use crate::config::CacheConfig;
use crate::config::PollerConfig;
use crate::config::PreprocessingConfig;
use crate::constants::ItemType;
use crate::constants::PreprocStepType;
use crate::constants::ValueType;
use crate::errors::BusError;
use crate::test_utils::*;
use crate::utils::time::Timespec;
use crate::Result;

const NOW: i64 = 1_700_000_000;
const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    bus: MessageBus,
    sink: Arc<MemoryHistorySink>,
    shutdown_tx: watch::Sender<()>,
    handle: JoinHandle<Result<ManagerStats>>,
}

impl Harness {
    fn start(rows: ConfigRows) -> Self {
        enable_logger();
        let cache = Arc::new(ConfigCache::with_config(CacheConfig::default(), PollerConfig::default()));
        cache.sync(&rows, NOW);

        let (bus, events) = MessageBus::new();
        let sink = Arc::new(MemoryHistorySink::new());
        let settings = PreprocessingConfig {
            tick_ms: 3_600_000,
            ..Default::default()
        };
        let manager = PreprocessingManager::new(cache, sink.clone(), settings, events);

        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let handle = tokio::spawn(manager.run(shutdown_rx));
        Self {
            bus,
            sink,
            shutdown_tx,
            handle,
        }
    }

    fn client(&self) -> PreprocessingClient {
        PreprocessingClient::connect(&self.bus, &PreprocessingConfig::default()).unwrap()
    }

    /// Bus connection acting as a worker whose replies the test controls.
    fn fake_worker(&self) -> BusConnection {
        let worker = self.bus.connect().unwrap();
        worker
            .send(&Message::Register {
                pid: 4242,
                parent_pid: std::process::id(),
            })
            .unwrap();
        worker
    }

    async fn stop(self) -> ManagerStats {
        self.shutdown_tx.send(()).unwrap();
        self.handle.await.unwrap().unwrap()
    }
}

async fn next_task(worker: &mut BusConnection) -> Task {
    match timeout(WAIT, worker.recv()).await.unwrap().unwrap() {
        Message::Task(task) => task,
        other => panic!("expected task, got {:?}", other),
    }
}

/// Asserts that nothing is dispatched to `worker` for a short while.
async fn assert_idle(worker: &mut BusConnection) {
    assert!(timeout(Duration::from_millis(100), worker.recv()).await.is_err());
}

fn reply(
    worker: &BusConnection,
    task: Task,
) {
    worker.send(&Message::TaskResult(process_task(task))).unwrap();
}

fn value(
    itemid: u64,
    raw: &str,
    sec: i64,
) -> ItemValue {
    ItemValue::new(itemid, ValueType::Uint64, Variant::Str(raw.to_string()), Timespec::new(sec, 0))
}

fn preproc_row(
    item_preprocid: u64,
    itemid: u64,
    step_type: PreprocStepType,
    params: &str,
) -> ItemPreprocRow {
    ItemPreprocRow {
        item_preprocid,
        itemid,
        step: 1,
        step_type: step_type as u8,
        params: params.to_string(),
        ..Default::default()
    }
}

fn multiplier_rows() -> ConfigRows {
    let mut rows = sample_rows();
    rows.item_preproc = vec![
        preproc_row(1, 101, PreprocStepType::Multiplier, "2"),
        preproc_row(2, 102, PreprocStepType::Multiplier, "3"),
    ];
    rows
}

fn sent(
    client: &mut PreprocessingClient,
    values: Vec<ItemValue>,
) {
    for value in values {
        client.add_value(value).unwrap();
    }
    client.send_pending().unwrap();
}

#[tokio::test]
async fn test_values_without_steps_are_flushed_directly() {
    let harness = Harness::start(sample_rows());
    let mut client = harness.client();

    sent(
        &mut client,
        vec![
            value(101, "42", NOW),
            ItemValue::not_supported(102, ValueType::Uint64, "Unsupported item key.", Timespec::new(NOW, 0)),
        ],
    );
    assert_eq!(client.queue_size().await.unwrap(), 0);

    let values = harness.sink.values();
    assert_eq!(values.len(), 2);
    assert_eq!(values[0].itemid, 101);
    assert_eq!(values[0].value, Some(Variant::Ui64(42)));
    assert_eq!(values[1].value, None);
    assert_eq!(values[1].error.as_deref(), Some("Unsupported item key."));
    assert_eq!(harness.sink.flush_count(), 2);

    let stats = harness.stop().await;
    assert_eq!(stats.direct, 2);
    assert_eq!(stats.queued, 0);
}

#[tokio::test]
async fn test_queued_value_is_processed_by_worker() {
    let harness = Harness::start(multiplier_rows());
    let mut worker = harness.fake_worker();
    let mut client = harness.client();

    sent(&mut client, vec![value(101, "21", NOW)]);
    let task = next_task(&mut worker).await;
    assert_eq!(task.itemid, 101);
    assert_eq!(task.ops, vec![PreprocOp::new(PreprocStepType::Multiplier, "2")]);
    assert_eq!(client.queue_size().await.unwrap(), 1);
    assert!(harness.sink.values().is_empty());

    reply(&worker, task);
    assert_eq!(client.queue_size().await.unwrap(), 0);
    let values = harness.sink.take();
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].value, Some(Variant::Ui64(42)));

    let stats = harness.stop().await;
    assert_eq!((stats.queued, stats.processed, stats.flushed), (1, 1, 1));
}

#[tokio::test]
async fn test_results_are_flushed_in_arrival_order() {
    let harness = Harness::start(multiplier_rows());
    let mut first = harness.fake_worker();
    let mut second = harness.fake_worker();
    let mut client = harness.client();

    sent(&mut client, vec![value(101, "1", NOW), value(102, "1", NOW)]);
    let task_101 = next_task(&mut first).await;
    let task_102 = next_task(&mut second).await;
    assert_eq!((task_101.itemid, task_102.itemid), (101, 102));

    reply(&second, task_102);
    assert_eq!(client.queue_size().await.unwrap(), 2);
    assert!(harness.sink.values().is_empty());

    reply(&first, task_101);
    assert_eq!(client.queue_size().await.unwrap(), 0);
    let flushed: Vec<(u64, Option<Variant>)> =
        harness.sink.values().into_iter().map(|v| (v.itemid, v.value)).collect();
    assert_eq!(flushed, vec![(101, Some(Variant::Ui64(2))), (102, Some(Variant::Ui64(3)))]);
}

/// Delta values of one item are processed one after another, each seeing the history
/// of the previous one. An older timestamp never replaces newer history.
#[tokio::test]
async fn test_delta_values_are_chained() {
    let mut rows = sample_rows();
    rows.item_preproc = vec![preproc_row(1, 101, PreprocStepType::DeltaValue, "")];
    let harness = Harness::start(rows);
    let mut first = harness.fake_worker();
    let mut second = harness.fake_worker();
    let mut client = harness.client();

    sent(&mut client, vec![value(101, "100", 10), value(101, "150", 5)]);
    let task = next_task(&mut first).await;
    assert_eq!(task.ts, Timespec::new(10, 0));
    assert!(task.history.is_empty());
    assert_idle(&mut second).await;

    reply(&first, task);
    let task = next_task(&mut first).await;
    assert_eq!(task.ts, Timespec::new(5, 0));
    assert_eq!(task.history.len(), 1);
    assert_eq!(task.history[0].value, Variant::Ui64(100));
    reply(&first, task);

    sent(&mut client, vec![value(101, "200", 30)]);
    let task = next_task(&mut first).await;
    assert_eq!(task.history[0].ts, Timespec::new(10, 0));
    assert_eq!(task.history[0].value, Variant::Ui64(100));
    reply(&first, task);

    assert_eq!(client.queue_size().await.unwrap(), 0);
    let flushed: Vec<Option<Variant>> = harness.sink.values().into_iter().map(|v| v.value).collect();
    assert_eq!(flushed, vec![Some(Variant::Ui64(50)), Some(Variant::Ui64(100))]);
}

/// A finished delta value is flushed as soon as its successor is dispatched, not at
/// the next tick.
#[tokio::test]
async fn test_released_delta_value_is_flushed_on_dispatch() {
    let mut rows = sample_rows();
    rows.item_preproc = vec![preproc_row(1, 101, PreprocStepType::DeltaValue, "")];
    let harness = Harness::start(rows);
    let mut worker = harness.fake_worker();
    let mut client = harness.client();

    sent(&mut client, vec![value(101, "100", 10), value(101, "150", 20)]);
    let task = next_task(&mut worker).await;
    reply(&worker, task);

    let task = next_task(&mut worker).await;
    assert_eq!(task.ts, Timespec::new(20, 0));
    assert_eq!(client.queue_size().await.unwrap(), 1);

    reply(&worker, task);
    assert_eq!(client.queue_size().await.unwrap(), 0);
    let flushed: Vec<Option<Variant>> = harness.sink.values().into_iter().map(|v| v.value).collect();
    assert_eq!(flushed, vec![Some(Variant::Ui64(50))]);
}

#[tokio::test]
async fn test_hold_defers_flush() {
    let harness = Harness::start(sample_rows());
    let mut client = harness.client();

    client.hold().unwrap();
    sent(&mut client, vec![value(101, "1", NOW), value(102, "2", NOW)]);
    assert_eq!(client.queue_size().await.unwrap(), 2);
    assert!(harness.sink.values().is_empty());

    client.flush().unwrap();
    assert_eq!(client.queue_size().await.unwrap(), 0);
    assert_eq!(harness.sink.values().len(), 2);
    assert_eq!(harness.sink.flush_count(), 1);
}

/// # Case 1: an internal value arriving behind a busy request is flushed first
/// # Case 2: the queued request follows once processed
#[tokio::test]
async fn test_internal_values_overtake_the_backlog() {
    let harness = Harness::start(multiplier_rows());
    let mut worker = harness.fake_worker();
    let mut client = harness.client();

    sent(&mut client, vec![value(101, "21", NOW)]);
    let task = next_task(&mut worker).await;

    // Case 1
    let mut internal = value(102, "7", NOW);
    internal.item_type = ItemType::Internal;
    sent(&mut client, vec![internal]);
    assert_eq!(client.queue_size().await.unwrap(), 1);
    let flushed: Vec<(u64, Option<Variant>)> =
        harness.sink.values().into_iter().map(|v| (v.itemid, v.value)).collect();
    assert_eq!(flushed, vec![(102, Some(Variant::Ui64(7)))]);

    // Case 2
    reply(&worker, task);
    assert_eq!(client.queue_size().await.unwrap(), 0);
    let itemids: Vec<u64> = harness.sink.values().into_iter().map(|v| v.itemid).collect();
    assert_eq!(itemids, vec![102, 101]);

    let stats = harness.stop().await;
    assert_eq!((stats.direct, stats.queued), (1, 1));
}

#[tokio::test]
async fn test_dependent_items_receive_master_value() {
    let mut rows = sample_rows();
    for (itemid, key) in [(103, "cpu.load.scaled"), (104, "cpu.load.copy")] {
        rows.items.push(ItemRow {
            item_type: 18,
            master_itemid: 101,
            delay: "0".to_string(),
            ..agent_item_row(itemid, 1, 0, key)
        });
    }
    rows.item_preproc = vec![
        preproc_row(1, 101, PreprocStepType::Multiplier, "2"),
        preproc_row(2, 103, PreprocStepType::Multiplier, "10"),
    ];
    let harness = Harness::start(rows);
    let mut worker = harness.fake_worker();
    let mut client = harness.client();

    sent(&mut client, vec![value(101, "5", NOW)]);
    let master = next_task(&mut worker).await;
    reply(&worker, master);

    let dependent = next_task(&mut worker).await;
    assert_eq!(dependent.itemid, 103);
    assert_eq!(dependent.value, Variant::Ui64(10));
    assert_eq!(dependent.ts, Timespec::new(NOW, 0));
    reply(&worker, dependent);

    assert_eq!(client.queue_size().await.unwrap(), 0);
    let flushed: Vec<(u64, Option<Variant>)> =
        harness.sink.values().into_iter().map(|v| (v.itemid, v.value)).collect();
    assert_eq!(
        flushed,
        vec![
            (101, Some(Variant::Ui64(10))),
            (103, Some(Variant::Ui64(100))),
            (104, Some(Variant::Ui64(10))),
        ]
    );
}

#[tokio::test]
async fn test_failed_master_does_not_fan_out() {
    let mut rows = sample_rows();
    rows.items.push(ItemRow {
        item_type: 18,
        master_itemid: 101,
        delay: "0".to_string(),
        ..agent_item_row(103, 1, 0, "cpu.load.copy")
    });
    rows.item_preproc = vec![preproc_row(1, 101, PreprocStepType::Multiplier, "2")];
    let harness = Harness::start(rows);
    let mut worker = harness.fake_worker();
    let mut client = harness.client();

    sent(&mut client, vec![value(101, "not a number", NOW)]);
    let task = next_task(&mut worker).await;
    reply(&worker, task);

    assert_eq!(client.queue_size().await.unwrap(), 0);
    let values = harness.sink.values();
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].itemid, 101);
    assert!(values[0].error.as_deref().unwrap_or_default().starts_with("cannot apply multiplier"));
}

#[tokio::test]
async fn test_disconnected_worker_task_is_requeued() {
    let harness = Harness::start(multiplier_rows());
    let mut lost = harness.fake_worker();
    let mut client = harness.client();

    sent(&mut client, vec![value(101, "4", NOW)]);
    let task = next_task(&mut lost).await;
    assert_eq!(task.itemid, 101);
    drop(lost);

    let mut replacement = harness.fake_worker();
    let task = next_task(&mut replacement).await;
    assert_eq!(task.itemid, 101);
    reply(&replacement, task);

    assert_eq!(client.queue_size().await.unwrap(), 0);
    assert_eq!(harness.sink.values()[0].value, Some(Variant::Ui64(8)));
}

#[tokio::test]
async fn test_foreign_worker_is_rejected() {
    let harness = Harness::start(multiplier_rows());
    let mut foreign = harness.bus.connect().unwrap();
    foreign
        .send(&Message::Register {
            pid: 4242,
            parent_pid: std::process::id().wrapping_add(1),
        })
        .unwrap();

    let result = timeout(WAIT, foreign.recv()).await.unwrap();
    assert!(matches!(result, Err(BusError::Closed)));

    let mut client = harness.client();
    sent(&mut client, vec![value(101, "4", NOW)]);
    assert_eq!(client.queue_size().await.unwrap(), 1);
}

#[tokio::test]
async fn test_shutdown_discards_unflushed_requests() {
    let harness = Harness::start(multiplier_rows());
    let mut client = harness.client();

    sent(&mut client, vec![value(101, "1", NOW), value(102, "1", NOW)]);
    assert_eq!(client.queue_size().await.unwrap(), 2);

    let stats = harness.stop().await;
    assert_eq!(stats.queued, 2);
    assert_eq!(stats.discarded, 2);
    assert_eq!(stats.flushed, 0);
}

#[tokio::test]
async fn test_test_request_runs_on_worker() {
    let harness = Harness::start(sample_rows());
    let (worker_shutdown_tx, worker_shutdown_rx) = watch::channel(());
    let worker = PreprocessingWorker::connect(0, &harness.bus).unwrap();
    let worker_handle = tokio::spawn(worker.run(worker_shutdown_rx));
    let mut client = harness.client();

    let result = timeout(
        WAIT,
        client.test(TestRequest {
            value_type: ValueType::Uint64,
            value: Some(" 0x10 ".to_string()),
            ts: Timespec::new(NOW, 0),
            ops: vec![
                PreprocOp::new(PreprocStepType::Trim, " "),
                PreprocOp::new(PreprocStepType::Regsub, "0x([0-9a-f]+)\n\\1"),
                PreprocOp::new(PreprocStepType::Hex2Dec, ""),
            ],
            history: Vec::new(),
        }),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(
        result.results,
        vec![
            Variant::Str("0x10".into()),
            Variant::Str("10".into()),
            Variant::Ui64(16),
        ]
    );
    assert_eq!(result.value, Variant::Ui64(16));

    worker_shutdown_tx.send(()).unwrap();
    worker_handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_direct_value_is_flushed_once() {
    let mut sink = MockHistorySink::new();
    sink.expect_add_value()
        .withf(|v| v.itemid == 101 && v.value == Some(Variant::Ui64(7)) && v.error.is_none())
        .times(1)
        .return_const(());
    sink.expect_flush().times(1).return_const(());

    let cache = Arc::new(ConfigCache::with_config(CacheConfig::default(), PollerConfig::default()));
    cache.sync(&sample_rows(), NOW);
    let (bus, events) = MessageBus::new();
    let manager = PreprocessingManager::new(cache, Arc::new(sink), PreprocessingConfig::default(), events);
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let handle = tokio::spawn(manager.run(shutdown_rx));

    let mut client = PreprocessingClient::connect(&bus, &PreprocessingConfig::default()).unwrap();
    sent(&mut client, vec![value(101, "7", NOW)]);
    assert_eq!(client.queue_size().await.unwrap(), 0);

    shutdown_tx.send(()).unwrap();
    let stats = handle.await.unwrap().unwrap();
    assert_eq!(stats.direct, 1);
}
