//! Item value preprocessing.
//!
//! Pollers hand raw values to the [`PreprocessingManager`] through a [`PreprocessingClient`].
//! Values of items without steps go straight to the [`HistorySink`]; the rest are queued,
//! executed by [`PreprocessingWorker`]s in parallel and flushed in arrival order. Delta steps
//! of one item are chained so that each computation sees the history left by the previous
//! value.

mod bus;
mod client;
mod history;
mod manager;
mod protocol;
mod queue;
mod sink;
mod steps;
mod variant;
mod worker;

pub use bus::*;
pub use client::*;
pub use history::*;
pub use manager::*;
pub use protocol::*;
pub use queue::*;
pub use sink::*;
pub use steps::*;
pub use variant::*;
pub use worker::*;

#[cfg(test)]
mod history_test;
#[cfg(test)]
mod manager_test;
#[cfg(test)]
mod steps_test;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::ErrorHandler;
use crate::constants::PreprocStepType;

/// One configured preprocessing step of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocOp {
    pub step_type: PreprocStepType,
    pub params: String,
    pub error_handler: ErrorHandler,
    pub error_handler_params: String,
}

impl PreprocOp {
    pub fn new(
        step_type: PreprocStepType,
        params: &str,
    ) -> Self {
        Self {
            step_type,
            params: params.to_string(),
            error_handler: ErrorHandler::Default,
            error_handler_params: String::new(),
        }
    }

    pub fn with_error_handler(
        mut self,
        error_handler: ErrorHandler,
        params: &str,
    ) -> Self {
        self.error_handler = error_handler;
        self.error_handler_params = params.to_string();
        self
    }
}
