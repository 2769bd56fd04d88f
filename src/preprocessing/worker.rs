use tokio::sync::watch;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::execute_steps;
use super::BusConnection;
use super::Message;
use super::MessageBus;
use super::Task;
use super::TaskResult;
use super::TestRequest;
use super::TestResult;
use super::Variant;
use crate::errors::BusError;
use crate::Result;

/// Executes preprocessing tasks handed out by the manager, one at a time.
pub struct PreprocessingWorker {
    id: usize,
    connection: BusConnection,
}

impl PreprocessingWorker {
    /// Connects to the manager and registers as a worker of this process.
    pub fn connect(
        id: usize,
        bus: &MessageBus,
    ) -> Result<Self> {
        let connection = bus.connect()?;
        let pid = std::process::id();
        connection.send(&Message::Register { pid, parent_pid: pid })?;
        debug!("preprocessing worker #{} registered as client {}", id, connection.client_id());

        Ok(Self { id, connection })
    }

    pub async fn run(
        mut self,
        mut shutdown_signal: watch::Receiver<()>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_signal.changed() => {
                    info!("preprocessing worker #{} received shutdown signal", self.id);
                    return Ok(());
                }
                message = self.connection.recv() => {
                    match message {
                        Ok(Message::Task(task)) => {
                            let result = process_task(task);
                            self.connection.send(&Message::TaskResult(result))?;
                        }
                        Ok(Message::TestRequest(request)) => {
                            let result = process_test(request);
                            self.connection.send(&Message::TestResult(result))?;
                        }
                        Ok(other) => {
                            warn!("preprocessing worker #{} ignores {} message", self.id, other.name());
                        }
                        Err(BusError::Closed) => {
                            info!("preprocessing worker #{} disconnected by manager", self.id);
                            return Err(BusError::Closed.into());
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }
    }
}

pub(crate) fn process_task(task: Task) -> TaskResult {
    let outcome = execute_steps(task.value_type, task.value, task.ts, &task.ops, &task.history);
    TaskResult {
        itemid: task.itemid,
        value: outcome.value,
        history: outcome.history,
    }
}

pub(crate) fn process_test(request: TestRequest) -> TestResult {
    let value = request.value.map(Variant::Str).unwrap_or_default();
    let outcome = execute_steps(request.value_type, value, request.ts, &request.ops, &request.history);
    TestResult {
        results: outcome.results,
        value: outcome.value,
        history: outcome.history,
    }
}
