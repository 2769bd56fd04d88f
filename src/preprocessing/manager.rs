//! Preprocessing manager: queues raw values, hands them to workers and flushes results
//! to history in arrival order.
//!
//! The manager is a single task owning every piece of its state. It reacts to bus events
//! and to a periodic tick; nothing else touches the queue.
//!
//! Request life cycle:
//! ```text
//!   values ──► Queued ──► Processing ──► Done ──► flushed to HistorySink
//!                 ▲            │
//!                 └────────────┘ worker disconnected
//! ```
//! A request is flushed only once it reached the head of the queue as `Done` with no
//! other request still waiting on its delta history.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::watch;
use tokio::time::interval;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::BusEvent;
use super::ClientId;
use super::HistoryCache;
use super::HistorySink;
use super::ItemValue;
use super::Message;
use super::PreprocOp;
use super::ProcessedValue;
use super::RequestId;
use super::RequestQueue;
use super::Task;
use super::TaskResult;
use super::TestRequest;
use super::TestResult;
use super::Variant;
use crate::cache::ConfigCache;
use crate::cache::PreprocItem;
use crate::config::PreprocessingConfig;
use crate::constants::ItemState;
use crate::constants::ItemType;
use crate::constants::ValueType;
use crate::errors::BusError;
use crate::errors::PreprocessingError;
use crate::metrics::PREPROCESSING_QUEUE_SIZE;
use crate::metrics::PREPROCESSING_VALUES_TOTAL;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Queued,
    Processing,
    Done,
}

#[derive(Debug)]
struct Request {
    state: RequestState,
    value: ItemValue,
    /// Snapshot taken at enqueue time; later config syncs do not affect it
    ops: Vec<PreprocOp>,
    /// Earlier delta request of the same item that must finish first
    pending: Option<RequestId>,
    /// Number of requests waiting on this one
    locks: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assignment {
    Request(RequestId),
    /// Test run on behalf of the given client
    Test(ClientId),
}

#[derive(Debug)]
struct WorkerSlot {
    pid: u32,
    task: Option<Assignment>,
}

/// Counters reported when the manager stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerStats {
    /// Values that went through the request queue
    pub queued: u64,
    /// Requests completed by workers
    pub processed: u64,
    /// Values handed to the history sink
    pub flushed: u64,
    /// Values that needed no preprocessing
    pub direct: u64,
    /// Requests still queued at shutdown
    pub discarded: u64,
}

pub struct PreprocessingManager {
    cache: Arc<ConfigCache>,
    sink: Arc<dyn HistorySink>,
    settings: PreprocessingConfig,
    events: UnboundedReceiver<BusEvent>,
    /// Workers must report this process as their parent
    parent_pid: u32,

    clients: HashMap<ClientId, UnboundedSender<Vec<u8>>>,
    workers: HashMap<ClientId, WorkerSlot>,

    items: HashMap<u64, PreprocItem>,
    revision: u64,
    history: HistoryCache,

    queue: RequestQueue<Request>,
    /// Most recently enqueued delta request per item
    linked_items: HashMap<u64, RequestId>,
    pending_tests: VecDeque<(ClientId, TestRequest)>,
    hold: usize,

    stats: ManagerStats,
}

impl PreprocessingManager {
    pub fn new(
        cache: Arc<ConfigCache>,
        sink: Arc<dyn HistorySink>,
        settings: PreprocessingConfig,
        events: UnboundedReceiver<BusEvent>,
    ) -> Self {
        Self {
            cache,
            sink,
            settings,
            events,
            parent_pid: std::process::id(),
            clients: HashMap::new(),
            workers: HashMap::new(),
            items: HashMap::new(),
            revision: 0,
            history: HistoryCache::new(),
            queue: RequestQueue::new(),
            linked_items: HashMap::new(),
            pending_tests: VecDeque::new(),
            hold: 0,
            stats: ManagerStats::default(),
        }
    }

    /// Serves bus events until shutdown is signalled or every bus handle is gone.
    pub async fn run(
        mut self,
        mut shutdown_signal: watch::Receiver<()>,
    ) -> Result<ManagerStats> {
        let mut ticker = interval(Duration::from_millis(self.settings.tick_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("preprocessing manager started");
        loop {
            tokio::select! {
                biased;
                _ = shutdown_signal.changed() => {
                    info!("preprocessing manager received shutdown signal");
                    break;
                }
                event = self.events.recv() => {
                    match event {
                        Some(event) => self.handle_event(event)?,
                        None => {
                            debug!("message bus closed");
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    self.assign_tasks();
                    self.flush_queue();
                }
            }
        }

        Ok(self.shutdown())
    }

    fn shutdown(mut self) -> ManagerStats {
        let discarded = self.queue.len();
        if discarded > 0 {
            warn!("discarding {} preprocessing requests not yet flushed", discarded);
        }
        self.stats.discarded = discarded as u64;
        PREPROCESSING_QUEUE_SIZE.set(0);

        info!(
            "preprocessing manager stopped: queued {}, processed {}, flushed {}, direct {}",
            self.stats.queued, self.stats.processed, self.stats.flushed, self.stats.direct
        );
        self.stats
    }

    fn handle_event(
        &mut self,
        event: BusEvent,
    ) -> Result<()> {
        match event {
            BusEvent::Connected { client_id, sender } => {
                trace!("client {} connected", client_id);
                self.clients.insert(client_id, sender);
            }
            BusEvent::Disconnected { client_id } => self.on_disconnect(client_id),
            BusEvent::Message { client_id, payload } => {
                if !self.clients.contains_key(&client_id) {
                    debug!("ignoring message from dropped client {}", client_id);
                    return Ok(());
                }
                match Message::decode(&payload) {
                    Ok(message) => self.handle_message(client_id, message)?,
                    Err(e) => error!("cannot decode message from client {}: {}", client_id, e),
                }
            }
        }
        Ok(())
    }

    fn handle_message(
        &mut self,
        client_id: ClientId,
        message: Message,
    ) -> Result<()> {
        match message {
            Message::Register { pid, parent_pid } => self.on_register(client_id, pid, parent_pid),
            Message::Values(values) => self.on_values(values),
            Message::Hold => self.hold += 1,
            Message::Flush => {
                self.hold = self.hold.saturating_sub(1);
                self.flush_queue();
            }
            Message::QueueSizeRequest => {
                let size = Message::QueueSize(self.queue.len() as u64);
                if let Err(e) = self.send_to(client_id, &size) {
                    warn!("cannot send queue size to client {}: {}", client_id, e);
                }
            }
            Message::TestRequest(request) => {
                self.pending_tests.push_back((client_id, request));
                self.assign_tasks();
            }
            Message::TaskResult(result) => self.on_task_result(client_id, result)?,
            Message::TestResult(result) => self.on_test_result(client_id, result)?,
            other => {
                warn!("unexpected {} message from client {}", other.name(), client_id);
            }
        }
        Ok(())
    }

    fn on_register(
        &mut self,
        client_id: ClientId,
        pid: u32,
        parent_pid: u32,
    ) {
        if parent_pid != self.parent_pid {
            let e = PreprocessingError::ForeignWorker {
                pid,
                expected: self.parent_pid,
            };
            error!("rejecting worker registration from client {}: {}", client_id, e);
            self.clients.remove(&client_id);
            return;
        }

        info!("preprocessing worker {} registered as client {}", pid, client_id);
        self.workers.insert(client_id, WorkerSlot { pid, task: None });
        self.assign_tasks();
    }

    fn on_disconnect(
        &mut self,
        client_id: ClientId,
    ) {
        self.clients.remove(&client_id);
        self.pending_tests.retain(|(owner, _)| *owner != client_id);

        let Some(worker) = self.workers.remove(&client_id) else {
            return;
        };
        warn!("preprocessing worker {} disconnected", worker.pid);

        match worker.task {
            Some(Assignment::Request(id)) => {
                if let Some(request) = self.queue.get_mut(id) {
                    debug!("requeueing value of item {}", request.value.itemid);
                    request.state = RequestState::Queued;
                }
            }
            Some(Assignment::Test(owner)) => {
                // The test request is lost with the worker.
                let result = Message::TestResult(TestResult {
                    results: Vec::new(),
                    value: Variant::Error("preprocessing worker disconnected".to_string()),
                    history: Vec::new(),
                });
                if let Err(e) = self.send_to(owner, &result) {
                    debug!("cannot report test failure to client {}: {}", owner, e);
                }
            }
            None => {}
        }
        self.assign_tasks();
    }

    fn on_values(
        &mut self,
        values: Vec<ItemValue>,
    ) {
        self.sync_items();
        for value in values {
            self.add_value(value);
        }
        self.assign_tasks();
        self.flush_queue();
    }

    /// Refreshes the local item copy when the cache moved to a new revision.
    fn sync_items(&mut self) {
        let Some(items) = self.cache.lock().get_preprocessable_items(&mut self.revision) else {
            return;
        };
        self.items = items.into_iter().map(|item| (item.itemid, item)).collect();

        let items = &self.items;
        let pruned = self.history.retain(|itemid| {
            items
                .get(&itemid)
                .filter(|item| item.ops.iter().any(|op| op.step_type.is_delta()))
                .map(|item| item.value_type)
        });
        debug!(
            "synced {} preprocessable items at revision {}, pruned {} histories",
            self.items.len(),
            self.revision,
            pruned
        );
    }

    fn add_value(
        &mut self,
        value: ItemValue,
    ) {
        let internal = value.item_type == ItemType::Internal
            || self
                .items
                .get(&value.itemid)
                .is_some_and(|item| item.item_type == ItemType::Internal);
        let ops = match self.items.get(&value.itemid) {
            Some(item) if !internal && value.state == ItemState::Normal => item.ops.clone(),
            _ => {
                self.add_direct(value, internal);
                return;
            }
        };

        self.stats.queued += 1;
        PREPROCESSING_VALUES_TOTAL.with_label_values(&["queued"]).inc();
        self.enqueue_request(value, ops, None);
    }

    /// Values needing no preprocessing skip the queue unless earlier values still wait in it.
    /// Internal values then jump to the head and go out ahead of the backlog.
    fn add_direct(
        &mut self,
        value: ItemValue,
        internal: bool,
    ) {
        self.stats.direct += 1;
        PREPROCESSING_VALUES_TOTAL.with_label_values(&["direct"]).inc();

        if self.queue.is_empty() && self.hold == 0 {
            if let Some(processed) = to_processed(value) {
                self.sink.add_value(processed);
                self.sink.flush();
                self.stats.flushed += 1;
            }
            return;
        }

        let request = Request {
            state: RequestState::Done,
            value,
            ops: Vec::new(),
            pending: None,
            locks: 0,
        };
        if internal {
            self.queue.enqueue_first(request);
            self.flush_queue();
        } else {
            self.queue.enqueue(request);
        }
    }

    /// Inserts a request, at the tail or right after `after`. A request without steps is
    /// done at once and its dependents follow it. Returns the last request inserted.
    fn enqueue_request(
        &mut self,
        value: ItemValue,
        ops: Vec<PreprocOp>,
        after: Option<RequestId>,
    ) -> RequestId {
        let itemid = value.itemid;
        let has_delta = ops.iter().any(|op| op.step_type.is_delta());
        let state = if ops.is_empty() {
            RequestState::Done
        } else {
            RequestState::Queued
        };
        let request = Request {
            state,
            value,
            ops,
            pending: None,
            locks: 0,
        };
        let id = match after {
            Some(anchor) => self.queue.enqueue_after(anchor, request),
            None => self.queue.enqueue(request),
        };

        if has_delta {
            if let Some(prior) = self.linked_items.insert(itemid, id) {
                let waits = match self.queue.get_mut(prior) {
                    Some(prior_request) if prior_request.state != RequestState::Done => {
                        prior_request.locks += 1;
                        true
                    }
                    _ => false,
                };
                if waits {
                    if let Some(request) = self.queue.get_mut(id) {
                        request.pending = Some(prior);
                    }
                }
            }
        }

        if state == RequestState::Done {
            return self.fan_out(id);
        }
        id
    }

    /// Enqueues the values of dependent items right after the finished request `id`.
    fn fan_out(
        &mut self,
        id: RequestId,
    ) -> RequestId {
        let Some(request) = self.queue.get(id) else {
            return id;
        };
        if request.value.value.is_none() || request.value.value.is_error() {
            return id;
        }
        let Some(master) = self.items.get(&request.value.itemid) else {
            return id;
        };

        let master_value = request.value.value.clone();
        let ts = request.value.ts;
        let dependents: Vec<(u64, ValueType, Vec<PreprocOp>)> = master
            .dependent_itemids
            .iter()
            .filter_map(|itemid| self.items.get(itemid))
            .map(|item| (item.itemid, item.value_type, item.ops.clone()))
            .collect();

        let mut anchor = id;
        for (itemid, value_type, ops) in dependents {
            let mut value = ItemValue::new(itemid, value_type, master_value.clone(), ts);
            value.item_type = ItemType::Dependent;

            PREPROCESSING_VALUES_TOTAL.with_label_values(&["dependent"]).inc();
            anchor = self.enqueue_request(value, ops, Some(anchor));
        }
        anchor
    }

    fn on_task_result(
        &mut self,
        client_id: ClientId,
        result: TaskResult,
    ) -> Result<()> {
        let id = match self.take_assignment(client_id)? {
            Assignment::Request(id) => id,
            Assignment::Test(_) => {
                return Err(PreprocessingError::QueueCorrupted(format!(
                    "worker {} answered a test request with a task result",
                    client_id
                ))
                .into())
            }
        };

        let request = self.queue.get_mut(id).ok_or_else(|| {
            PreprocessingError::QueueCorrupted(format!("request of worker {} is gone", client_id))
        })?;
        if request.value.itemid != result.itemid {
            return Err(PreprocessingError::QueueCorrupted(format!(
                "worker {} returned item {} for item {}",
                client_id, result.itemid, request.value.itemid
            ))
            .into());
        }

        request.state = RequestState::Done;
        request.value.value = result.value;
        let itemid = request.value.itemid;
        let value_type = request.value.value_type;

        self.history.update(itemid, value_type, result.history);
        if self.linked_items.get(&itemid) == Some(&id) {
            self.linked_items.remove(&itemid);
        }
        self.stats.processed += 1;

        self.fan_out(id);
        self.flush_queue();
        self.assign_tasks();
        Ok(())
    }

    fn on_test_result(
        &mut self,
        client_id: ClientId,
        result: TestResult,
    ) -> Result<()> {
        let owner = match self.take_assignment(client_id)? {
            Assignment::Test(owner) => owner,
            Assignment::Request(_) => {
                return Err(PreprocessingError::QueueCorrupted(format!(
                    "worker {} answered a task with a test result",
                    client_id
                ))
                .into())
            }
        };

        if let Err(e) = self.send_to(owner, &Message::TestResult(result)) {
            debug!("test requester {} went away: {}", owner, e);
        }
        self.assign_tasks();
        Ok(())
    }

    fn take_assignment(
        &mut self,
        client_id: ClientId,
    ) -> Result<Assignment> {
        let worker = self
            .workers
            .get_mut(&client_id)
            .ok_or(PreprocessingError::UnknownWorker(client_id))?;
        worker.task.take().ok_or_else(|| {
            PreprocessingError::QueueCorrupted(format!("worker {} had no task", client_id)).into()
        })
    }

    /// Hands pending tests first, then queued requests, to idle workers.
    fn assign_tasks(&mut self) {
        let mut idle: Vec<ClientId> = self
            .workers
            .iter()
            .filter(|(_, worker)| worker.task.is_none())
            .map(|(client_id, _)| *client_id)
            .collect();
        idle.sort_unstable();

        let mut released = false;
        for client_id in idle {
            if let Some((owner, request)) = self.pending_tests.pop_front() {
                if self.send_to(client_id, &Message::TestRequest(request.clone())).is_err() {
                    self.pending_tests.push_front((owner, request));
                    continue;
                }
                self.set_assignment(client_id, Assignment::Test(owner));
                continue;
            }

            let Some(id) = self.next_request() else {
                break;
            };
            let Some(task) = self.build_task(id) else {
                break;
            };
            if let Err(e) = self.send_to(client_id, &Message::Task(task)) {
                warn!("cannot send task to worker client {}: {}", client_id, e);
                continue;
            }

            if let Some(request) = self.queue.get_mut(id) {
                request.state = RequestState::Processing;
                if let Some(prior) = request.pending.take() {
                    if let Some(prior_request) = self.queue.get_mut(prior) {
                        prior_request.locks = prior_request.locks.saturating_sub(1);
                        released = true;
                    }
                }
            }
            self.set_assignment(client_id, Assignment::Request(id));
        }

        if released {
            self.flush_queue();
        } else {
            PREPROCESSING_QUEUE_SIZE.set(self.queue.len() as i64);
        }
    }

    /// Head-most queued request whose delta predecessor, if any, is done.
    fn next_request(&self) -> Option<RequestId> {
        self.queue
            .iter()
            .find(|(_, request)| {
                request.state == RequestState::Queued
                    && request.pending.map_or(true, |prior| {
                        self.queue
                            .get(prior)
                            .map_or(true, |prior| prior.state == RequestState::Done)
                    })
            })
            .map(|(id, _)| id)
    }

    fn build_task(
        &self,
        id: RequestId,
    ) -> Option<Task> {
        let request = self.queue.get(id)?;
        Some(Task {
            itemid: request.value.itemid,
            value_type: request.value.value_type,
            value: request.value.value.clone(),
            ts: request.value.ts,
            ops: request.ops.clone(),
            history: self.history.get(request.value.itemid),
        })
    }

    fn set_assignment(
        &mut self,
        client_id: ClientId,
        assignment: Assignment,
    ) {
        if let Some(worker) = self.workers.get_mut(&client_id) {
            worker.task = Some(assignment);
        }
    }

    /// Moves finished requests from the queue head to the history sink.
    fn flush_queue(&mut self) {
        if self.hold > 0 {
            return;
        }

        let mut flushed = 0;
        while let Some((_, head)) = self.queue.peek() {
            if head.state != RequestState::Done || head.locks > 0 {
                break;
            }
            let Some((_, request)) = self.queue.dequeue() else {
                break;
            };
            if let Some(processed) = to_processed(request.value) {
                self.sink.add_value(processed);
                flushed += 1;
            }
        }

        if flushed > 0 {
            self.sink.flush();
            self.stats.flushed += flushed;
            trace!("flushed {} values", flushed);
        }
        PREPROCESSING_QUEUE_SIZE.set(self.queue.len() as i64);
    }

    fn send_to(
        &self,
        client_id: ClientId,
        message: &Message,
    ) -> std::result::Result<(), BusError> {
        let sender = self.clients.get(&client_id).ok_or(BusError::Closed)?;
        sender.send(message.encode()?).map_err(|_| BusError::Closed)
    }
}

/// Shapes a finished value for history. Empty values are kept only when they carry
/// log metadata.
fn to_processed(value: ItemValue) -> Option<ProcessedValue> {
    let mut processed = ProcessedValue {
        itemid: value.itemid,
        value_type: value.value_type,
        ts: value.ts,
        value: None,
        error: None,
        lastlogsize: value.lastlogsize,
        mtime: value.mtime,
    };

    if value.state == ItemState::NotSupported {
        processed.error = Some(value.error.unwrap_or_default());
        return Some(processed);
    }

    match value.value {
        Variant::None if value.lastlogsize.is_none() => return None,
        Variant::None => {}
        Variant::Error(error) => processed.error = Some(error),
        other => match convert_to_value_type(&other, value.value_type) {
            Ok(converted) => processed.value = Some(converted),
            Err(error) => processed.error = Some(error),
        },
    }
    Some(processed)
}

fn convert_to_value_type(
    value: &Variant,
    value_type: ValueType,
) -> std::result::Result<Variant, String> {
    let converted = match value_type {
        ValueType::Float => value.to_numeric(value_type).filter(|v| matches!(v, Variant::Dbl(_))),
        ValueType::Uint64 => value.to_numeric(value_type).filter(|v| matches!(v, Variant::Ui64(_))),
        ValueType::Str | ValueType::Text | ValueType::Log => value.to_text().map(Variant::Str),
    };
    converted.ok_or_else(|| {
        format!(
            "Value \"{}\" of type \"{}\" is not suitable for value type \"{:?}\"",
            value.value_desc(),
            value.type_desc(),
            value_type
        )
    })
}
