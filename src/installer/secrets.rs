// file: src/installer/secrets.rs
// version: 1.0.0
// guid: 2f7e9a60-5b1c-4e83-9d24-c6a0b8f1e735

//! Extraction of join artifacts and credentials from step output

use crate::catalog::kubernetes::{CERT_KEY_MARKER, JOIN_CMD_MARKER};
use crate::error::ProvisionError;
use crate::Result;

/// Values needed to add nodes to a bootstrapped cluster
#[derive(Clone, PartialEq, Eq)]
pub struct JoinArtifacts {
    pub certificate_key: String,
    pub join_command: String,
}

impl std::fmt::Debug for JoinArtifacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinArtifacts")
            .field("certificate_key", &"********")
            .field("join_command", &"********")
            .finish()
    }
}

/// Find both marker lines regardless of their order
pub fn parse_join_artifacts(stdout: &str) -> Result<JoinArtifacts> {
    let mut certificate_key = None;
    let mut join_command = None;

    for line in stdout.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix(CERT_KEY_MARKER) {
            certificate_key = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix(JOIN_CMD_MARKER) {
            join_command = Some(value.trim().to_string());
        }
    }

    let certificate_key = certificate_key
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ProvisionError::parse("certificate key not found in join output"))?;
    let join_command = join_command
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ProvisionError::parse("join command not found in join output"))?;

    Ok(JoinArtifacts {
        certificate_key,
        join_command,
    })
}

/// Password printed by `elasticsearch-reset-password` after `New value:`
pub fn parse_password(stdout: &str) -> Result<String> {
    stdout
        .lines()
        .find_map(|line| line.split_once("New value:"))
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ProvisionError::parse("elastic password not found in reset output"))
}

/// Token value from the `SERVICE_TOKEN elastic/kibana/<name> = <token>` line
pub fn parse_service_token(stdout: &str) -> Result<String> {
    stdout
        .lines()
        .filter(|line| line.contains("SERVICE_TOKEN"))
        .find_map(|line| line.split_once('='))
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ProvisionError::parse("kibana service token not found in output"))
}
