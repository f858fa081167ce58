// file: src/steps/runner.rs
// version: 1.1.0
// guid: 5e2d8c14-0a7b-4f39-b6e1-7c9a2f4d3b58

//! Runs one remote step per SSH session and records it in the step log

use super::InstallationStep;
use crate::config::{ExecutionSettings, NodeConnection};
use crate::error::ProvisionError;
use crate::installer::probe::{EnvironmentProber, NodeEnvironment};
use crate::network::{CommandOutput, Connector};
use crate::reporter::ProgressReporter;
use crate::Result;
use tracing::debug;

/// Name of the probing step recorded for every node
pub const DETECT_ENVIRONMENT: &str = "Detect environment";

/// Executes steps sequentially and keeps the ordered step log for a run
pub struct StepRunner<'a> {
    connector: &'a dyn Connector,
    reporter: &'a dyn ProgressReporter,
    settings: ExecutionSettings,
    steps: Vec<InstallationStep>,
}

impl<'a> StepRunner<'a> {
    pub fn new(
        connector: &'a dyn Connector,
        reporter: &'a dyn ProgressReporter,
        settings: ExecutionSettings,
    ) -> Self {
        Self {
            connector,
            reporter,
            settings,
            steps: Vec::new(),
        }
    }

    /// Step log in execution order
    pub fn steps(&self) -> &[InstallationStep] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<InstallationStep> {
        self.steps
    }

    /// Run `script` on `node` and return its stdout.
    ///
    /// A non-zero exit status marks the step failed and returns a command
    /// error naming the node and step.
    pub async fn run_step(
        &mut self,
        node: &NodeConnection,
        name: &str,
        script: &str,
        elevate: bool,
    ) -> Result<String> {
        self.run(node, name, script, elevate, false).await
    }

    /// Like [`run_step`](Self::run_step) but stdout is neither logged nor kept in the step log
    pub async fn run_sensitive_step(
        &mut self,
        node: &NodeConnection,
        name: &str,
        script: &str,
        elevate: bool,
    ) -> Result<String> {
        self.run(node, name, script, elevate, true).await
    }

    /// Probe privilege mode and OS family of `node` as a recorded step
    pub async fn detect_environment(&mut self, node: &NodeConnection) -> Result<NodeEnvironment> {
        let index = self.begin(node, DETECT_ENVIRONMENT);

        let prober = EnvironmentProber::new(self.settings.command_timeout());
        let outcome = match self.connector.connect(node).await {
            Ok(mut session) => {
                let result = prober.probe(session.as_mut()).await;
                session.disconnect();
                result
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(environment) => {
                self.succeed(index, Some(environment.to_string()));
                Ok(environment)
            }
            Err(e) => {
                self.fail(index, e.to_string());
                Err(e)
            }
        }
    }

    async fn run(
        &mut self,
        node: &NodeConnection,
        name: &str,
        script: &str,
        elevate: bool,
        sensitive: bool,
    ) -> Result<String> {
        let index = self.begin(node, name);

        let output = match self.execute(node, script, elevate).await {
            Ok(output) => output,
            Err(e) => {
                let e = match e {
                    ProvisionError::CommandTimeout { timeout_secs, .. } => ProvisionError::command(
                        node.to_string(),
                        name,
                        format!("timed out after {}s", timeout_secs),
                    ),
                    other => other,
                };
                self.fail(index, e.to_string());
                return Err(e);
            }
        };

        if !output.success() {
            let message = output.failure_message();
            self.fail(index, message.clone());
            return Err(ProvisionError::command(node.to_string(), name, message));
        }

        if sensitive {
            self.succeed(index, None);
        } else {
            debug!(node = %node, step = name, "stdout:\n{}", output.stdout.trim_end());
            self.succeed(index, Some(output.stdout.clone()));
        }
        Ok(output.stdout)
    }

    async fn execute(
        &self,
        node: &NodeConnection,
        script: &str,
        elevate: bool,
    ) -> Result<CommandOutput> {
        let mut session = self.connector.connect(node).await?;
        let result = session
            .execute_script(script, elevate, self.settings.step_timeout())
            .await;
        session.disconnect();
        result
    }

    fn begin(&mut self, node: &NodeConnection, name: &str) -> usize {
        let mut step = InstallationStep::new(name, node.to_string());
        self.reporter.step_changed(&step);
        step.mark_running();
        self.reporter.step_changed(&step);
        self.steps.push(step);
        self.steps.len() - 1
    }

    fn succeed(&mut self, index: usize, output: Option<String>) {
        let step = &mut self.steps[index];
        step.mark_success(output);
        self.reporter.step_changed(step);
    }

    fn fail(&mut self, index: usize, error: String) {
        let step = &mut self.steps[index];
        step.mark_failed(error);
        self.reporter.step_changed(step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectionFailure;
    use crate::network::mock::MockConnector;
    use crate::reporter::recording::RecordingReporter;
    use crate::steps::StepStatus;

    fn node() -> NodeConnection {
        NodeConnection::new("10.0.0.1", 22, "root", "pw")
    }

    #[tokio::test]
    async fn test_successful_step_is_recorded_and_reported() {
        let connector = MockConnector::new();
        connector.respond("echo hi", CommandOutput::new("hi\n", "", 0));
        let reporter = RecordingReporter::default();
        let mut runner = StepRunner::new(&connector, &reporter, ExecutionSettings::default());

        let out = runner.run_step(&node(), "Say hi", "echo hi", false).await.unwrap();
        assert_eq!(out, "hi\n");

        let step = &runner.steps()[0];
        assert_eq!(step.status, StepStatus::Success);
        assert_eq!(step.output.as_deref(), Some("hi\n"));

        let statuses: Vec<_> = reporter.events().into_iter().map(|e| e.2).collect();
        assert_eq!(
            statuses,
            vec![StepStatus::Pending, StepStatus::Running, StepStatus::Success]
        );
        assert_eq!(connector.connections(), 1);
        assert_eq!(connector.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_failed_step_uses_stderr_or_exit_code() {
        let connector = MockConnector::new();
        connector.respond("apt-get", CommandOutput::new("", "E: no lock\n", 100));
        connector.respond("false", CommandOutput::new("", "", 3));
        let reporter = RecordingReporter::default();
        let mut runner = StepRunner::new(&connector, &reporter, ExecutionSettings::default());

        let err = runner
            .run_step(&node(), "Install packages", "apt-get install x", true)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "[root@10.0.0.1:22] Install packages failed: E: no lock"
        );

        let err = runner.run_step(&node(), "Fail", "false", false).await.unwrap_err();
        assert!(err.to_string().ends_with("exit code 3"));

        assert!(runner.steps().iter().all(|s| s.status == StepStatus::Failed));
        assert_eq!(connector.disconnects(), 2);
        assert!(connector.calls()[0].1.starts_with("sudo -n bash -c"));
    }

    #[tokio::test]
    async fn test_sensitive_step_keeps_no_output() {
        let connector = MockConnector::new();
        connector.respond("reset-password", CommandOutput::new("New value: s3cret\n", "", 0));
        let reporter = RecordingReporter::default();
        let mut runner = StepRunner::new(&connector, &reporter, ExecutionSettings::default());

        let out = runner
            .run_sensitive_step(&node(), "Reset elastic password", "reset-password", false)
            .await
            .unwrap();
        assert!(out.contains("s3cret"));
        assert!(runner.steps()[0].output.is_none());
    }

    #[tokio::test]
    async fn test_timeout_fails_step_without_echoing_script() {
        let connector = MockConnector::new();
        connector.time_out("logstash-keystore");
        let reporter = RecordingReporter::default();
        let mut runner = StepRunner::new(&connector, &reporter, ExecutionSettings::default());
        let script = crate::catalog::elastic::logstash_keystore("SuperSecretPw");

        let err = runner
            .run_sensitive_step(&node(), "Create Logstash keystore", &script, false)
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::CommandError { .. }));
        assert_eq!(
            err.to_string(),
            "[root@10.0.0.1:22] Create Logstash keystore failed: timed out after 600s"
        );
        let step = &runner.steps()[0];
        assert_eq!(step.status, StepStatus::Failed);
        assert!(!step.error.as_deref().unwrap_or_default().contains("Sup"));
        assert_eq!(connector.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_connection_failure_marks_step_failed() {
        let connector = MockConnector::new();
        connector.fail_connect("10.0.0.1", ConnectionFailure::AuthenticationFailed);
        let reporter = RecordingReporter::default();
        let mut runner = StepRunner::new(&connector, &reporter, ExecutionSettings::default());

        let err = runner.run_step(&node(), "Disable swap", "swapoff -a", false).await.unwrap_err();
        assert!(matches!(err, ProvisionError::ConnectionError { .. }));
        assert_eq!(runner.steps()[0].status, StepStatus::Failed);
        assert_eq!(connector.call_count(), 0);
    }

    #[tokio::test]
    async fn test_detect_environment_records_step() {
        let connector = MockConnector::root_debian();
        let reporter = RecordingReporter::default();
        let mut runner = StepRunner::new(&connector, &reporter, ExecutionSettings::default());

        let env = runner.detect_environment(&node()).await.unwrap();
        assert_eq!(env.os_family, crate::catalog::OsFamily::Debian12);
        assert!(!env.privilege.elevate());

        let step = &runner.steps()[0];
        assert_eq!(step.name, DETECT_ENVIRONMENT);
        assert_eq!(step.status, StepStatus::Success);
        assert_eq!(connector.connections(), 1);
    }
}
