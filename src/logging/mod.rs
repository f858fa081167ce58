// file: src/logging/mod.rs
// version: 2.0.0
// guid: i9j0k1l2-m3n4-5678-9012-345678ijklmn

//! Logging system for the cluster provisioner

pub mod logger;

pub use logger::{init_json_logger, init_logger, with_async_operation_span};
