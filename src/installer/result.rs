// file: src/installer/result.rs
// version: 1.0.0
// guid: a85d3c17-6e2f-4b90-8c41-f37e0d9b2a64

//! Terminal outcome of an installation run

use crate::catalog::OsFamily;
use crate::steps::InstallationStep;
use serde::Serialize;

/// Outcome of a Kubernetes cluster installation
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Master and worker join commands, on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_command: Option<String>,

    #[serde(skip)]
    pub steps: Vec<InstallationStep>,
}

impl ExecutionResult {
    pub fn succeeded(
        message: impl Into<String>,
        join_command: String,
        steps: Vec<InstallationStep>,
    ) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
            join_command: Some(join_command),
            steps,
        }
    }

    pub fn failed(error: impl Into<String>, steps: Vec<InstallationStep>) -> Self {
        Self {
            success: false,
            message: "Installation failed".to_string(),
            error: Some(error.into()),
            join_command: None,
            steps,
        }
    }
}

/// Outcome of an Elastic Stack installation
#[derive(Debug, Clone, Serialize)]
pub struct InstallResult {
    pub success: bool,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub elastic_password: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub elasticsearch_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kibana_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_family: Option<OsFamily>,

    #[serde(skip)]
    pub steps: Vec<InstallationStep>,
}

impl InstallResult {
    pub fn failed(error: impl Into<String>, steps: Vec<InstallationStep>) -> Self {
        Self {
            success: false,
            message: "Elastic Stack installation failed".to_string(),
            error: Some(error.into()),
            elastic_password: None,
            elasticsearch_url: None,
            kibana_url: None,
            os_family: None,
            steps,
        }
    }
}

/// Outcome shared by both installers, for rendering
pub trait RunOutcome {
    fn success(&self) -> bool;
    fn steps(&self) -> &[InstallationStep];
}

impl RunOutcome for ExecutionResult {
    fn success(&self) -> bool {
        self.success
    }

    fn steps(&self) -> &[InstallationStep] {
        &self.steps
    }
}

impl RunOutcome for InstallResult {
    fn success(&self) -> bool {
        self.success
    }

    fn steps(&self) -> &[InstallationStep] {
        &self.steps
    }
}
