use parking_lot::Mutex;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use super::Variant;
use crate::constants::ValueType;
use crate::utils::time::Timespec;

/// Value leaving the preprocessing pipeline towards history storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedValue {
    pub itemid: u64,
    pub value_type: ValueType,
    pub ts: Timespec,
    /// `None` when only log metadata changed
    pub value: Option<Variant>,
    /// Set when the item became not supported
    pub error: Option<String>,
    pub lastlogsize: Option<u64>,
    pub mtime: Option<i32>,
}

/// Destination of processed values. Values arrive in the order they were accepted,
/// and `flush` marks the end of a batch.
#[cfg_attr(test, automock)]
pub trait HistorySink: Send + Sync + 'static {
    fn add_value(
        &self,
        value: ProcessedValue,
    );

    fn flush(&self);
}

/// Sink keeping every value in memory; used by the service binary and tests.
#[derive(Debug, Default)]
pub struct MemoryHistorySink {
    values: Mutex<Vec<ProcessedValue>>,
    flushes: Mutex<usize>,
}

impl MemoryHistorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn values(&self) -> Vec<ProcessedValue> {
        self.values.lock().clone()
    }

    /// Removes and returns everything received so far.
    pub fn take(&self) -> Vec<ProcessedValue> {
        std::mem::take(&mut *self.values.lock())
    }

    pub fn flush_count(&self) -> usize {
        *self.flushes.lock()
    }
}

impl HistorySink for MemoryHistorySink {
    fn add_value(
        &self,
        value: ProcessedValue,
    ) {
        self.values.lock().push(value);
    }

    fn flush(&self) {
        *self.flushes.lock() += 1;
    }
}

/// Sink that only reports values through `tracing`; used when no history storage is
/// attached to the service.
#[derive(Debug, Default)]
pub struct TracingHistorySink;

impl HistorySink for TracingHistorySink {
    fn add_value(
        &self,
        value: ProcessedValue,
    ) {
        match (&value.value, &value.error) {
            (_, Some(error)) => debug!("item {} not supported at {:?}: {}", value.itemid, value.ts, error),
            (Some(v), None) => debug!("item {} = {} at {:?}", value.itemid, v.value_desc(), value.ts),
            (None, None) => debug!("item {} log position {:?}", value.itemid, value.lastlogsize),
        }
    }

    fn flush(&self) {}
}
