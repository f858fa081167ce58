// file: src/steps/mod.rs
// version: 2.0.0
// guid: 3d0f3f57-5c61-4b8f-9a55-2b1f0d7e6a10

//! Installation step log
//!
//! Every remote action performed by an installer is recorded as an
//! [`InstallationStep`] that moves through `pending -> running -> success|failed`
//! exactly once.

pub mod runner;

pub use runner::{StepRunner, DETECT_ENVIRONMENT};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a step execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Step created, not yet started
    Pending,

    /// Step is executing on its node
    Running,

    /// Step completed successfully
    Success,

    /// Step failed; the run stops here
    Failed,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Success | StepStatus::Failed)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Success => "success",
            StepStatus::Failed => "failed",
        };
        f.write_str(text)
    }
}

/// One remote action on one node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallationStep {
    /// Human readable step name, e.g. "Join worker"
    pub name: String,

    /// Node identity rendered as `user@host:port`
    pub node: String,

    pub status: StepStatus,

    /// Captured stdout; absent for sensitive steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl InstallationStep {
    pub fn new(name: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node: node.into(),
            status: StepStatus::Pending,
            output: None,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn mark_running(&mut self) {
        debug_assert_eq!(self.status, StepStatus::Pending);
        self.status = StepStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_success(&mut self, output: Option<String>) {
        debug_assert_eq!(self.status, StepStatus::Running);
        self.status = StepStatus::Success;
        self.output = output;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        debug_assert!(!self.status.is_terminal());
        self.status = StepStatus::Failed;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock time between start and finish, once finished
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}
