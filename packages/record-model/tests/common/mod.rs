//! Common test utilities for record-model
//!
//! Shared fixtures, assertions and store wrappers for the integration tests.

#![allow(dead_code)]

mod assertions;
mod fixtures;
mod stores;

pub use assertions::*;
pub use fixtures::*;
pub use stores::*;
