//! Messages exchanged between preprocessing clients, workers and the manager.
//!
//! Every message travels as one opaque byte payload encoded with `bincode`. Optional
//! strings are `Option<String>`, so an absent string and an empty one stay distinct.

use serde::Deserialize;
use serde::Serialize;

use super::HistoryValue;
use super::PreprocOp;
use super::Variant;
use crate::constants::ItemState;
use crate::constants::ItemType;
use crate::constants::ValueType;
use crate::errors::BusError;
use crate::utils::time::Timespec;

/// A raw value collected by a poller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemValue {
    pub itemid: u64,
    pub item_type: ItemType,
    pub value_type: ValueType,
    pub state: ItemState,
    pub value: Variant,
    /// Set for not supported values
    pub error: Option<String>,
    pub ts: Timespec,
    pub lastlogsize: Option<u64>,
    pub mtime: Option<i32>,
}

impl ItemValue {
    pub fn new(
        itemid: u64,
        value_type: ValueType,
        value: Variant,
        ts: Timespec,
    ) -> Self {
        Self {
            itemid,
            item_type: ItemType::ZabbixAgent,
            value_type,
            state: ItemState::Normal,
            value,
            error: None,
            ts,
            lastlogsize: None,
            mtime: None,
        }
    }

    pub fn not_supported(
        itemid: u64,
        value_type: ValueType,
        error: &str,
        ts: Timespec,
    ) -> Self {
        Self {
            state: ItemState::NotSupported,
            error: Some(error.to_string()),
            ..Self::new(itemid, value_type, Variant::None, ts)
        }
    }
}

/// Work handed to a worker: a value, the steps to run and the item's delta history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub itemid: u64,
    pub value_type: ValueType,
    pub value: Variant,
    pub ts: Timespec,
    pub ops: Vec<PreprocOp>,
    pub history: Vec<HistoryValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub itemid: u64,
    pub value: Variant,
    pub history: Vec<HistoryValue>,
}

/// Ad-hoc run of a step list; item history is not touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRequest {
    pub value_type: ValueType,
    pub value: Option<String>,
    pub ts: Timespec,
    pub ops: Vec<PreprocOp>,
    pub history: Vec<HistoryValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Value after each executed step
    pub results: Vec<Variant>,
    pub value: Variant,
    pub history: Vec<HistoryValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// First message of a worker connection
    Register { pid: u32, parent_pid: u32 },
    Values(Vec<ItemValue>),
    /// Keep processed values in the queue until the matching `Flush`
    Hold,
    Flush,
    QueueSizeRequest,
    QueueSize(u64),
    Task(Task),
    TaskResult(TaskResult),
    TestRequest(TestRequest),
    TestResult(TestResult),
}

impl Message {
    pub fn encode(&self) -> Result<Vec<u8>, BusError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, BusError> {
        Ok(bincode::deserialize(payload)?)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Message::Register { .. } => "register",
            Message::Values(_) => "values",
            Message::Hold => "hold",
            Message::Flush => "flush",
            Message::QueueSizeRequest => "queue size request",
            Message::QueueSize(_) => "queue size",
            Message::Task(_) => "task",
            Message::TaskResult(_) => "task result",
            Message::TestRequest(_) => "test request",
            Message::TestResult(_) => "test result",
        }
    }
}
