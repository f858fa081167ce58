// file: src/installer/probe.rs
// version: 1.0.0
// guid: 9c4b7e21-3f8a-4d6c-a1e5-0b2d7f6c8e93

//! Privilege and operating system detection on a target host

use crate::catalog::{detect_os_family, OsFamily};
use crate::error::ProvisionError;
use crate::network::RemoteExecutor;
use crate::Result;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// How scripts gain root on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeMode {
    /// Logged in as uid 0
    Root,
    /// Non-root user with passwordless `sudo -n`
    Sudo,
}

impl PrivilegeMode {
    /// Whether scripts must be wrapped with `sudo -n`
    pub fn elevate(&self) -> bool {
        matches!(self, PrivilegeMode::Sudo)
    }
}

impl fmt::Display for PrivilegeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivilegeMode::Root => f.write_str("root"),
            PrivilegeMode::Sudo => f.write_str("sudo"),
        }
    }
}

/// Result of probing one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEnvironment {
    pub os_family: OsFamily,
    pub privilege: PrivilegeMode,
}

impl fmt::Display for NodeEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "os_family={} privilege={}", self.os_family, self.privilege)
    }
}

pub struct EnvironmentProber {
    timeout: Duration,
}

impl EnvironmentProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Determine privilege mode, then OS family, over an open session
    pub async fn probe(&self, session: &mut dyn RemoteExecutor) -> Result<NodeEnvironment> {
        let privilege = self.privilege_mode(session).await?;

        let release = session.execute("cat /etc/os-release", self.timeout).await?;
        if !release.success() {
            return Err(ProvisionError::unsupported(format!(
                "cannot read /etc/os-release: {}",
                release.failure_message()
            )));
        }

        let (os_id, version_id) = parse_os_release(&release.stdout);
        if os_id.is_empty() {
            return Err(ProvisionError::unsupported("OS ID not found in /etc/os-release"));
        }
        if version_id.is_empty() {
            return Err(ProvisionError::unsupported(
                "OS VERSION_ID not found in /etc/os-release",
            ));
        }
        debug!("os-release: ID={} VERSION_ID={}", os_id, version_id);
        let os_family = detect_os_family(&os_id, &version_id)?;

        Ok(NodeEnvironment {
            os_family,
            privilege,
        })
    }

    async fn privilege_mode(&self, session: &mut dyn RemoteExecutor) -> Result<PrivilegeMode> {
        let uid = session.execute("id -u", self.timeout).await?;
        if uid.success() && uid.stdout.trim() == "0" {
            return Ok(PrivilegeMode::Root);
        }

        let sudo = session.execute("sudo -n true", self.timeout).await?;
        if sudo.success() {
            Ok(PrivilegeMode::Sudo)
        } else {
            Err(ProvisionError::PrivilegeError(
                "root or passwordless sudo is required on the target host".to_string(),
            ))
        }
    }
}

/// Extract `ID` and `VERSION_ID` from os-release text; missing fields are empty
pub fn parse_os_release(content: &str) -> (String, String) {
    let mut os_id = String::new();
    let mut version_id = String::new();

    for line in content.lines() {
        if let Some(value) = line.strip_prefix("ID=") {
            os_id = unquote(value);
        } else if let Some(value) = line.strip_prefix("VERSION_ID=") {
            version_id = unquote(value);
        }
    }

    (os_id, version_id)
}

fn unquote(value: &str) -> String {
    value.trim().trim_matches(|c| c == '"' || c == '\'').to_string()
}
