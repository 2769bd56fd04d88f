use tracing::trace;

use super::BusConnection;
use super::ItemValue;
use super::Message;
use super::MessageBus;
use super::TestRequest;
use super::TestResult;
use crate::config::PreprocessingConfig;
use crate::errors::BusError;
use crate::Result;

/// Poller-side handle of the preprocessing manager.
///
/// Values are buffered locally and sent in batches, either once `max_values_local`
/// values are pending or on [`PreprocessingClient::send_pending`].
pub struct PreprocessingClient {
    connection: BusConnection,
    pending: Vec<ItemValue>,
    max_values_local: usize,
}

impl PreprocessingClient {
    pub fn connect(
        bus: &MessageBus,
        settings: &PreprocessingConfig,
    ) -> Result<Self> {
        Ok(Self {
            connection: bus.connect()?,
            pending: Vec::new(),
            max_values_local: settings.max_values_local,
        })
    }

    pub fn add_value(
        &mut self,
        value: ItemValue,
    ) -> Result<()> {
        self.pending.push(value);
        if self.pending.len() >= self.max_values_local {
            self.send_pending()?;
        }
        Ok(())
    }

    /// Sends buffered values; returns how many were sent.
    pub fn send_pending(&mut self) -> Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        let values = std::mem::take(&mut self.pending);
        let count = values.len();
        self.connection.send(&Message::Values(values))?;
        trace!("sent {} values to preprocessing", count);
        Ok(count)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Keeps processed values in the manager until the matching [`Self::flush`].
    pub fn hold(&self) -> Result<()> {
        self.connection.send(&Message::Hold)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.send_pending()?;
        self.connection.send(&Message::Flush)?;
        Ok(())
    }

    /// Number of requests waiting in the manager queue.
    pub async fn queue_size(&mut self) -> Result<u64> {
        self.connection.send(&Message::QueueSizeRequest)?;
        match self.connection.recv().await? {
            Message::QueueSize(size) => Ok(size),
            other => Err(BusError::UnexpectedMessage(other.name().to_string()).into()),
        }
    }

    /// Runs a step list on an ad-hoc value without touching item history.
    pub async fn test(
        &mut self,
        request: TestRequest,
    ) -> Result<TestResult> {
        self.connection.send(&Message::TestRequest(request))?;
        match self.connection.recv().await? {
            Message::TestResult(result) => Ok(result),
            other => Err(BusError::UnexpectedMessage(other.name().to_string()).into()),
        }
    }
}
