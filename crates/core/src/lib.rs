//! Domain types and pure telemetry logic for the weld-shop live core.
//!
//! Nothing in this crate performs I/O or holds shared state: the threshold
//! classifier and the group aggregation are plain functions over values so
//! they can be tested in isolation.

pub mod error;
pub mod telemetry;
pub mod types;
