// file: src/config/mod.rs
// version: 2.0.0
// guid: a1b2c3d4-e5f6-7a8b-9c0d-1e2f3a4b5c6d

//! Configuration module for the cluster provisioner
//!
//! Handles loading and validation of cluster topologies, Elastic Stack
//! options and execution settings.

pub mod cluster;
pub mod elastic;
pub mod loader;
pub mod node;

pub use cluster::ClusterConfig;
pub use elastic::{InstallOptions, NodeMode};
pub use loader::ConfigLoader;
pub use node::NodeConnection;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeouts applied to remote commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSettings {
    /// Short probe commands (`id -u`, `cat /etc/os-release`)
    pub command_timeout_secs: u64,
    /// Installation scripts
    pub step_timeout_secs: u64,
}

impl ExecutionSettings {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            command_timeout_secs: 30,
            step_timeout_secs: 600,
        }
    }
}
