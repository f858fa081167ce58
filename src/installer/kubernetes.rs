// file: src/installer/kubernetes.rs
// version: 1.1.0
// guid: 4b1e8d73-c2a9-4f05-b6d8-91e3a7c0f52d

//! Kubernetes cluster installer
//!
//! Phases run strictly in order and every node loop is sequential. The
//! first failing step ends the run; nothing already applied on the hosts
//! is rolled back.

use super::probe::NodeEnvironment;
use super::result::ExecutionResult;
use super::secrets::{parse_join_artifacts, JoinArtifacts};
use crate::catalog::kubernetes as k8s;
use crate::config::{ClusterConfig, ExecutionSettings, NodeConnection};
use crate::error::ProvisionError;
use crate::logging::logger::with_async_operation_span;
use crate::network::Connector;
use crate::reporter::ProgressReporter;
use crate::steps::StepRunner;
use crate::Result;
use std::collections::HashMap;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

/// Probed environment of every node, keyed by node identity
#[derive(Debug, Default)]
struct Environments(HashMap<String, NodeEnvironment>);

impl Environments {
    fn get(&self, node: &NodeConnection) -> Result<&NodeEnvironment> {
        self.0
            .get(&node.to_string())
            .ok_or_else(|| ProvisionError::config(format!("node {} was not probed", node)))
    }

    fn elevate(&self, node: &NodeConnection) -> Result<bool> {
        Ok(self.get(node)?.privilege.elevate())
    }
}

/// Installs a single-master or highly available cluster
pub struct ClusterInstaller<'a> {
    config: &'a ClusterConfig,
    connector: &'a dyn Connector,
    reporter: &'a dyn ProgressReporter,
    settings: ExecutionSettings,
}

impl<'a> ClusterInstaller<'a> {
    pub fn new(
        config: &'a ClusterConfig,
        connector: &'a dyn Connector,
        reporter: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            config,
            connector,
            reporter,
            settings: ExecutionSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ExecutionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Run every phase and convert the first error into a failure result.
    ///
    /// All log events of the run carry a fresh `run_id`.
    pub async fn install(&self) -> ExecutionResult {
        let span = info_span!("install", run_id = %Uuid::new_v4());
        self.run().instrument(span).await
    }

    async fn run(&self) -> ExecutionResult {
        let mut runner = StepRunner::new(self.connector, self.reporter, self.settings);

        info!(
            "Installing Kubernetes on {} master(s) and {} worker(s), endpoint {}",
            self.config.master_nodes.len(),
            self.config.worker_nodes.len(),
            self.config.control_plane_endpoint()
        );

        match self.run_phases(&mut runner).await {
            Ok(artifacts) => {
                info!("Kubernetes cluster installed");
                ExecutionResult::succeeded(
                    "Kubernetes cluster installed successfully",
                    combined_join_text(&artifacts),
                    runner.into_steps(),
                )
            }
            Err(e) => {
                error!("Installation failed: {}", e);
                ExecutionResult::failed(e.to_string(), runner.into_steps())
            }
        }
    }

    async fn run_phases(&self, runner: &mut StepRunner<'_>) -> Result<JoinArtifacts> {
        let errors = self.config.validate();
        if !errors.is_empty() {
            return Err(ProvisionError::ValidationError(errors));
        }
        let primary = self
            .config
            .primary_master()
            .ok_or_else(|| ProvisionError::config("at least one master node is required"))?;

        let environments =
            with_async_operation_span("detect environment", || self.detect(runner)).await?;
        with_async_operation_span("prerequisites", || {
            self.prerequisites(runner, &environments)
        })
        .await?;
        with_async_operation_span("packages", || self.packages(runner, &environments)).await?;
        with_async_operation_span("bootstrap", || {
            self.bootstrap(runner, primary, &environments)
        })
        .await?;
        let artifacts = with_async_operation_span("join artifacts", || {
            self.join_artifacts(runner, primary, &environments)
        })
        .await?;
        with_async_operation_span("join masters", || {
            self.join_masters(runner, &artifacts, &environments)
        })
        .await?;
        with_async_operation_span("join workers", || {
            self.join_workers(runner, &artifacts, &environments)
        })
        .await?;
        with_async_operation_span("load balancer", || {
            self.metallb(runner, primary, &environments)
        })
        .await?;
        with_async_operation_span("cluster status", || {
            self.cluster_status(runner, primary, &environments)
        })
        .await?;

        Ok(artifacts)
    }

    async fn detect(&self, runner: &mut StepRunner<'_>) -> Result<Environments> {
        let mut environments = Environments::default();
        for node in self.config.all_nodes() {
            let environment = runner.detect_environment(node).await?;
            environments.0.insert(node.to_string(), environment);
        }
        Ok(environments)
    }

    async fn prerequisites(
        &self,
        runner: &mut StepRunner<'_>,
        environments: &Environments,
    ) -> Result<()> {
        for node in self.config.all_nodes() {
            let elevate = environments.elevate(node)?;
            runner
                .run_step(node, "Disable swap", &k8s::disable_swap(), elevate)
                .await?;
            runner
                .run_step(node, "Load kernel modules", &k8s::load_kernel_modules(), elevate)
                .await?;
            runner
                .run_step(node, "Configure sysctl", &k8s::configure_sysctl(), elevate)
                .await?;
        }
        Ok(())
    }

    async fn packages(&self, runner: &mut StepRunner<'_>, environments: &Environments) -> Result<()> {
        for node in self.config.all_nodes() {
            let environment = environments.get(node)?;
            let elevate = environment.privilege.elevate();
            runner
                .run_step(
                    node,
                    "Install containerd",
                    &k8s::install_containerd(environment.os_family),
                    elevate,
                )
                .await?;
            runner
                .run_step(
                    node,
                    "Install Kubernetes packages",
                    &k8s::install_kubernetes_packages(
                        environment.os_family,
                        &self.config.kubernetes_version,
                    ),
                    elevate,
                )
                .await?;
        }
        Ok(())
    }

    async fn bootstrap(
        &self,
        runner: &mut StepRunner<'_>,
        primary: &NodeConnection,
        environments: &Environments,
    ) -> Result<()> {
        let elevate = environments.elevate(primary)?;
        runner
            .run_step(
                primary,
                "Initialize control plane",
                &k8s::kubeadm_init(
                    &self.config.pod_network_cidr,
                    &self.config.control_plane_endpoint(),
                ),
                elevate,
            )
            .await?;
        runner
            .run_step(
                primary,
                "Install Calico CNI",
                &k8s::install_calico(&self.config.pod_network_cidr, &self.config.calico_version),
                elevate,
            )
            .await?;
        Ok(())
    }

    async fn join_artifacts(
        &self,
        runner: &mut StepRunner<'_>,
        primary: &NodeConnection,
        environments: &Environments,
    ) -> Result<JoinArtifacts> {
        let stdout = runner
            .run_sensitive_step(
                primary,
                "Generate join command",
                &k8s::generate_join_artifacts(),
                environments.elevate(primary)?,
            )
            .await?;
        parse_join_artifacts(&stdout)
    }

    async fn join_masters(
        &self,
        runner: &mut StepRunner<'_>,
        artifacts: &JoinArtifacts,
        environments: &Environments,
    ) -> Result<()> {
        let script = k8s::master_join(&artifacts.join_command, &artifacts.certificate_key);
        for node in self.config.additional_masters() {
            runner
                .run_sensitive_step(node, "Join control plane", &script, environments.elevate(node)?)
                .await?;
        }
        Ok(())
    }

    async fn join_workers(
        &self,
        runner: &mut StepRunner<'_>,
        artifacts: &JoinArtifacts,
        environments: &Environments,
    ) -> Result<()> {
        let script = k8s::worker_join(&artifacts.join_command);
        for node in &self.config.worker_nodes {
            runner
                .run_sensitive_step(node, "Join worker", &script, environments.elevate(node)?)
                .await?;
        }
        Ok(())
    }

    async fn metallb(
        &self,
        runner: &mut StepRunner<'_>,
        primary: &NodeConnection,
        environments: &Environments,
    ) -> Result<()> {
        let Some(range) = self.config.metallb_ip_range.as_deref() else {
            info!("No MetalLB IP range configured, skipping load balancer");
            return Ok(());
        };
        runner
            .run_step(
                primary,
                "Install MetalLB",
                &k8s::install_metallb(range, &self.config.metallb_version),
                environments.elevate(primary)?,
            )
            .await?;
        Ok(())
    }

    async fn cluster_status(
        &self,
        runner: &mut StepRunner<'_>,
        primary: &NodeConnection,
        environments: &Environments,
    ) -> Result<()> {
        let status = runner
            .run_step(
                primary,
                "Check cluster status",
                &k8s::check_cluster_status(),
                environments.elevate(primary)?,
            )
            .await?;
        info!("Cluster status:\n{}", status.trim_end());
        Ok(())
    }
}

/// Both join commands, labelled for the operator
pub fn combined_join_text(artifacts: &JoinArtifacts) -> String {
    format!(
        "Master Join:\n{}\n\nWorker Join:\n{}",
        k8s::master_join_command(&artifacts.join_command, &artifacts.certificate_key),
        artifacts.join_command
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::mock::MockConnector;
    use crate::network::CommandOutput;
    use crate::reporter::recording::RecordingReporter;
    use crate::steps::{StepStatus, DETECT_ENVIRONMENT};

    const JOIN: &str =
        "kubeadm join 10.0.0.1:6443 --token abc.def --discovery-token-ca-cert-hash sha256:ff";

    fn node(host: &str) -> NodeConnection {
        NodeConnection::new(host, 22, "root", "pw")
    }

    fn cluster(masters: &[&str], workers: &[&str]) -> ClusterConfig {
        ClusterConfig::new(
            masters.iter().map(|h| node(h)).collect(),
            workers.iter().map(|h| node(h)).collect(),
        )
    }

    fn connector() -> MockConnector {
        let mock = MockConnector::root_debian();
        mock.respond(
            "token create",
            CommandOutput::new(format!("CERT_KEY=c3rt\nJOIN_CMD={}\n", JOIN), "", 0),
        );
        mock
    }

    #[tokio::test]
    async fn test_single_master_install_succeeds() {
        let config = cluster(&["10.0.0.1"], &["10.0.0.2", "10.0.0.3"]);
        let connector = connector();
        let reporter = RecordingReporter::default();

        let result = ClusterInstaller::new(&config, &connector, &reporter).install().await;

        assert!(result.success, "{:?}", result.error);
        let join = result.join_command.unwrap();
        assert!(join.starts_with("Master Join:\n"));
        assert!(join.contains("--control-plane --certificate-key c3rt"));
        assert!(join.ends_with(&format!("Worker Join:\n{}", JOIN)));

        assert_eq!(connector.count_matching("--pod-network-cidr=192.168.0.0/16"), 1);
        assert!(connector
            .commands_for("10.0.0.1")
            .iter()
            .any(|c| c.contains("--control-plane-endpoint \"10.0.0.1:6443\"")));
        assert_eq!(connector.count_matching("--control-plane --certificate-key"), 0);
        assert_eq!(connector.count_matching("Worker joined the cluster"), 2);
        assert_eq!(connector.count_matching("metallb"), 0);
        assert_eq!(connector.connections(), connector.disconnects());

        let last = result.steps.last().unwrap();
        assert_eq!(last.name, "Check cluster status");
        assert!(result.steps.iter().all(|s| s.status == StepStatus::Success));
        assert_eq!(
            result.steps.iter().filter(|s| s.name == DETECT_ENVIRONMENT).count(),
            3
        );
    }

    #[tokio::test]
    async fn test_ha_install_joins_additional_masters_with_certificate_key() {
        let mut config = cluster(&["10.0.0.1", "10.0.0.2", "10.0.0.3"], &["10.0.0.4"]);
        config.load_balancer_ip = Some("10.0.0.100".to_string());
        config.metallb_ip_range = Some("10.0.0.200-10.0.0.250".to_string());
        let connector = connector();
        let reporter = RecordingReporter::default();

        let result = ClusterInstaller::new(&config, &connector, &reporter).install().await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(connector.count_matching("--control-plane-endpoint \"10.0.0.100:6443\""), 1);
        for host in ["10.0.0.2", "10.0.0.3"] {
            assert!(connector
                .commands_for(host)
                .iter()
                .any(|c| c.contains(&format!("{} --control-plane --certificate-key c3rt", JOIN))));
        }
        assert!(connector
            .commands_for("10.0.0.1")
            .iter()
            .any(|c| c.contains("- 10.0.0.200-10.0.0.250")));
    }

    #[tokio::test]
    async fn test_failure_stops_remaining_phases() {
        let config = cluster(&["10.0.0.1"], &["10.0.0.2", "10.0.0.3"]);
        let connector = connector();
        connector.respond_on(
            "10.0.0.2",
            "Worker joined",
            CommandOutput::new("", "[preflight] port 10250 in use", 1),
        );
        let reporter = RecordingReporter::default();

        let result = ClusterInstaller::new(&config, &connector, &reporter).install().await;

        assert!(!result.success);
        assert_eq!(result.message, "Installation failed");
        let error = result.error.unwrap();
        assert!(error.contains("root@10.0.0.2:22"));
        assert!(error.contains("Join worker"));
        assert!(error.contains("port 10250 in use"));

        // the failing command is the last one executed
        let calls = connector.calls();
        let (host, command) = calls.last().unwrap();
        assert_eq!(host, "10.0.0.2");
        assert!(command.contains("Worker joined"));
        assert!(connector.commands_for("10.0.0.3").iter().all(|c| !c.contains("Worker joined")));
        assert_eq!(connector.count_matching("kubectl get nodes"), 0);

        let failed: Vec<_> = result
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert!(result.steps.iter().any(|s| s.status == StepStatus::Success));
    }

    #[tokio::test]
    async fn test_command_timeout_aborts_the_run() {
        let config = cluster(&["10.0.0.1"], &["10.0.0.2"]);
        let connector = connector();
        connector.time_out_on("10.0.0.1", "kubeadm init");
        let reporter = RecordingReporter::default();

        let result = ClusterInstaller::new(&config, &connector, &reporter).install().await;

        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.contains("root@10.0.0.1:22"));
        assert!(error.contains("Initialize control plane"));
        assert!(error.contains("timed out"));

        let calls = connector.calls();
        assert!(calls.last().unwrap().1.contains("kubeadm init"));
        assert_eq!(connector.count_matching("calico"), 0);
        assert_eq!(connector.count_matching("token create"), 0);
        assert_eq!(connector.count_matching("Worker joined"), 0);
        assert_eq!(connector.connections(), connector.disconnects());

        let last = result.steps.last().unwrap();
        assert_eq!(last.name, "Initialize control plane");
        assert_eq!(last.status, StepStatus::Failed);
    }

    #[tokio::test]
    async fn test_missing_join_marker_is_a_parse_failure() {
        let config = cluster(&["10.0.0.1"], &["10.0.0.2"]);
        let connector = connector();
        connector.respond("token create", CommandOutput::new(format!("JOIN_CMD={}\n", JOIN), "", 0));
        let reporter = RecordingReporter::default();

        let result = ClusterInstaller::new(&config, &connector, &reporter).install().await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("certificate key"));
        assert_eq!(connector.count_matching("Worker joined"), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_never_connects() {
        let config = cluster(&[], &["10.0.0.2"]);
        let connector = connector();
        let reporter = RecordingReporter::default();

        let result = ClusterInstaller::new(&config, &connector, &reporter).install().await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("at least one master node is required"));
        assert_eq!(connector.connections(), 0);
    }

    #[tokio::test]
    async fn test_non_root_nodes_run_scripts_through_sudo() {
        let config = ClusterConfig::new(
            vec![NodeConnection::new("10.0.0.1", 22, "deploy", "pw")],
            vec![],
        );
        let connector = connector();
        connector.respond("id -u", CommandOutput::new("1000\n", "", 0));
        let reporter = RecordingReporter::default();

        let result = ClusterInstaller::new(&config, &connector, &reporter).install().await;

        assert!(result.success, "{:?}", result.error);
        let scripts: Vec<_> = connector
            .commands_for("10.0.0.1")
            .into_iter()
            .filter(|c| c.contains("bash -c"))
            .collect();
        assert!(!scripts.is_empty());
        assert!(scripts.iter().all(|c| c.starts_with("sudo -n bash -c")));
    }
}
