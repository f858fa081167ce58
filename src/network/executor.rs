// file: src/network/executor.rs
// version: 2.0.0
// guid: exec0001-2345-6789-abcd-ef0123456789

//! Remote command execution traits

use crate::config::NodeConnection;
use crate::Result;
use std::time::Duration;

/// Captured result of one remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Message describing a failure: stderr, else the exit code
    pub fn failure_message(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("exit code {}", self.exit_code)
        } else {
            stderr.to_string()
        }
    }
}

/// An open session on one remote host
#[async_trait::async_trait]
pub trait RemoteExecutor: Send {
    /// Execute a single command and collect its output
    async fn execute(&mut self, command: &str, timeout: Duration) -> Result<CommandOutput>;

    /// Execute a multi-line script through `bash -c`, optionally elevated
    async fn execute_script(
        &mut self,
        script: &str,
        elevate: bool,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        let command = wrap_script(script, elevate);
        self.execute(&command, timeout).await
    }

    /// Close the session
    fn disconnect(&mut self);
}

/// Opens sessions; one session is opened per installation step
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, node: &NodeConnection) -> Result<Box<dyn RemoteExecutor>>;
}

/// Quote a script into a single `bash -c` invocation.
///
/// Single quotes inside the script are closed, emitted as `"'"` and reopened.
pub fn wrap_script(script: &str, elevate: bool) -> String {
    let escaped = script.replace('\'', r#"'"'"'"#);
    let prefix = if elevate { "sudo -n " } else { "" };
    format!("{}bash -c '{}'", prefix, escaped)
}

/// Open a session, run a trivial command and close it again
pub async fn test_connection(
    connector: &dyn Connector,
    node: &NodeConnection,
    timeout: Duration,
) -> Result<()> {
    let mut session = connector.connect(node).await?;
    let output = session.execute("echo connection-ok", timeout).await;
    session.disconnect();

    let output = output?;
    if output.success() {
        Ok(())
    } else {
        Err(crate::error::ProvisionError::command(
            node.to_string(),
            "Test connection",
            output.failure_message(),
        ))
    }
}
