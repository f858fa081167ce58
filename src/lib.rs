// file: src/lib.rs
// version: 3.0.0
// guid: d82472d1-7f0f-4eb4-b0a3-6e1547103eb4

//! # Cluster Provisioner
//!
//! Installs Kubernetes clusters (single master or highly available) and
//! the Elastic Stack on remote Linux hosts over SSH. Every remote action
//! is a recorded step; the first failing step ends the run.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod installer;
pub mod logging;
pub mod network;
pub mod reporter;
pub mod steps;

pub use error::{ProvisionError, Result};

/// Version information for the provisioner
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
