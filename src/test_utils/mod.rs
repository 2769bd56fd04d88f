//! Shared helpers for unit tests: logger bootstrap and configuration row fixtures.
mod common;
mod rows;

pub use common::*;
pub use rows::*;
