//! Error hierarchy for the configuration cache and preprocessing pipeline.
//!
//! Cache Query/Mutation calls are infallible by contract; the variants below cover the
//! row source, process bootstrap, the message bus and the preprocessing manager.

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Settings loading failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration row source failures (aborts the current sync pass)
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Preprocessing manager and worker failures
    #[error(transparent)]
    Preprocessing(#[from] PreprocessingError),

    /// Message bus transport and codec failures
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    SignalSenderClosed(String),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The source is unreachable; the pass is retried at the next interval
    #[error("Connection down: {0}")]
    ConnectionDown(String),

    /// A query for one entity kind failed
    #[error("Query for {kind} rows failed: {reason}")]
    Query { kind: &'static str, reason: String },

    /// Row data could not be decoded
    #[error("Malformed rows: {0}")]
    Parse(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PreprocessingError {
    #[error("Unknown worker client {0}")]
    UnknownWorker(u64),

    #[error("Worker process {pid} is not a child of {expected}")]
    ForeignWorker { pid: u32, expected: u32 },

    #[error("Request queue corrupted: {0}")]
    QueueCorrupted(String),
}

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error(transparent)]
    Codec(#[from] bincode::Error),

    #[error("Message bus closed")]
    Closed,

    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),
}

impl SourceError {
    /// Whether the failure is the "connection down" sentinel rather than a query/data error.
    pub fn is_connection_down(&self) -> bool {
        matches!(self, SourceError::ConnectionDown(_))
    }
}
