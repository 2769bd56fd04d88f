//! In-memory monitoring configuration cache with poller scheduling queues and an item
//! value preprocessing pipeline.
//!
//! - [`cache`]: configuration tables, indices and per-poller queues behind one lock
//! - [`preprocessing`]: manager, workers and clients exchanging messages over a bus

pub mod cache;
pub mod config;
pub mod constants;
mod errors;
pub mod metrics;
pub mod preprocessing;
pub mod utils;

pub use errors::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
