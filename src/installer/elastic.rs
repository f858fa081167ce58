// file: src/installer/elastic.rs
// version: 1.0.0
// guid: e07c5a92-1d3b-4a68-9f27-6b8e4c2d1a05

//! Elastic Stack installer for a single host

use super::probe::NodeEnvironment;
use super::result::InstallResult;
use super::secrets::{parse_password, parse_service_token};
use crate::catalog::elastic::{self as elk, ElasticsearchSettings, KibanaSettings};
use crate::config::{ExecutionSettings, InstallOptions};
use crate::error::ProvisionError;
use crate::logging::logger::with_async_operation_span;
use crate::network::Connector;
use crate::reporter::ProgressReporter;
use crate::steps::StepRunner;
use crate::Result;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

/// Name of the Kibana service token created on 8.x clusters
pub const KIBANA_TOKEN_NAME: &str = "elk-installer";

const FIREWALL_SKIPPED_NOTE: &str = "Firewall rules not applied for this OS";

/// State gathered during one run and read by later phases
#[derive(Default)]
struct ElasticContext {
    elastic_password: Option<String>,
    kibana_service_token: Option<String>,
    notes: Vec<String>,
}

impl ElasticContext {
    fn password(&self) -> Result<&str> {
        self.elastic_password
            .as_deref()
            .ok_or_else(|| ProvisionError::config("elastic password has not been reset yet"))
    }
}

/// Installs Elasticsearch, Kibana and Logstash on one host
pub struct ElasticInstaller<'a> {
    options: &'a InstallOptions,
    connector: &'a dyn Connector,
    reporter: &'a dyn ProgressReporter,
    settings: ExecutionSettings,
}

impl<'a> ElasticInstaller<'a> {
    pub fn new(
        options: &'a InstallOptions,
        connector: &'a dyn Connector,
        reporter: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            options,
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
    pub async fn install(&self) -> InstallResult {
        let span = info_span!("install", run_id = %Uuid::new_v4());
        self.run().instrument(span).await
    }

    async fn run(&self) -> InstallResult {
        let errors = self.options.validate();
        if !errors.is_empty() {
            let mut result =
                InstallResult::failed(ProvisionError::ValidationError(errors).to_string(), vec![]);
            result.message = "Invalid options".to_string();
            return result;
        }

        info!(
            "Installing Elastic Stack {}.x on {}",
            self.options.elastic_major, self.options.connection
        );

        let mut runner = StepRunner::new(self.connector, self.reporter, self.settings);
        let mut context = ElasticContext::default();

        match self.run_phases(&mut runner, &mut context).await {
            Ok(environment) => {
                let mut message = "Elastic Stack installation completed".to_string();
                if !context.notes.is_empty() {
                    message = format!("{}. Notes: {}", message, context.notes.join("; "));
                }
                info!("{}", message);
                InstallResult {
                    success: true,
                    message,
                    error: None,
                    elastic_password: context.elastic_password,
                    elasticsearch_url: Some(self.options.elasticsearch_url()),
                    kibana_url: Some(self.options.kibana_url()),
                    os_family: Some(environment.os_family),
                    steps: runner.into_steps(),
                }
            }
            Err(e) => {
                error!("Elastic Stack installation failed: {}", e);
                InstallResult::failed(e.to_string(), runner.into_steps())
            }
        }
    }

    async fn run_phases(
        &self,
        runner: &mut StepRunner<'_>,
        context: &mut ElasticContext,
    ) -> Result<NodeEnvironment> {
        let node = &self.options.connection;
        let environment = runner.detect_environment(node).await?;

        with_async_operation_span("packages", || self.packages(runner, &environment)).await?;
        with_async_operation_span("elasticsearch", || {
            self.elasticsearch(runner, &environment)
        })
        .await?;
        with_async_operation_span("credentials", || {
            self.credentials(runner, &environment, context)
        })
        .await?;
        with_async_operation_span("kibana and logstash", || {
            self.kibana_and_logstash(runner, &environment, context)
        })
        .await?;
        with_async_operation_span("firewall", || {
            self.firewall(runner, &environment, context)
        })
        .await?;
        if self.options.skip_tests {
            info!("Skipping smoke tests");
        } else {
            with_async_operation_span("smoke tests", || {
                self.smoke_tests(runner, &environment, context)
            })
            .await?;
        }

        Ok(environment)
    }

    async fn packages(&self, runner: &mut StepRunner<'_>, env: &NodeEnvironment) -> Result<()> {
        let node = &self.options.connection;
        let elevate = env.privilege.elevate();
        let family = env.os_family;

        runner
            .run_step(node, "Update OS", &elk::update_os(family), elevate)
            .await?;
        runner
            .run_step(node, "Install prerequisites", &elk::prerequisites(family), elevate)
            .await?;
        runner
            .run_step(
                node,
                "Configure Elastic repository",
                &elk::repository(family, &self.options.elastic_major),
                elevate,
            )
            .await?;
        runner
            .run_step(
                node,
                "Install Elastic Stack packages",
                &elk::install_packages(family),
                elevate,
            )
            .await?;
        Ok(())
    }

    async fn elasticsearch(&self, runner: &mut StepRunner<'_>, env: &NodeEnvironment) -> Result<()> {
        let node = &self.options.connection;
        let elevate = env.privilege.elevate();
        let config = elk::elasticsearch_config(&ElasticsearchSettings {
            cluster_name: &self.options.cluster_name,
            bind_host: &self.options.bind_host,
            http_port: self.options.http_port,
            elastic_major: &self.options.elastic_major,
            node_mode: self.options.node_mode,
            seed_hosts: &self.options.seed_hosts,
            initial_masters: &self.options.initial_masters,
        })?;

        runner
            .run_step(node, "Write Elasticsearch config", &config, elevate)
            .await?;
        runner
            .run_step(
                node,
                "Write Elasticsearch heap settings",
                &elk::jvm_options(&self.options.heap_size),
                elevate,
            )
            .await?;
        runner
            .run_step(
                node,
                "Enable and start Elasticsearch",
                &elk::service_enable("elasticsearch"),
                elevate,
            )
            .await?;
        runner
            .run_step(
                node,
                "Wait for Elasticsearch",
                &elk::wait_for_service("elasticsearch", self.options.wait_seconds),
                elevate,
            )
            .await?;
        Ok(())
    }

    /// Reset the superuser password and, from 8.x on, mint a Kibana service token
    async fn credentials(
        &self,
        runner: &mut StepRunner<'_>,
        env: &NodeEnvironment,
        context: &mut ElasticContext,
    ) -> Result<()> {
        let node = &self.options.connection;
        let elevate = env.privilege.elevate();

        let stdout = runner
            .run_sensitive_step(
                node,
                "Reset elastic password",
                &elk::reset_elastic_password(),
                elevate,
            )
            .await?;
        context.elastic_password = Some(parse_password(&stdout)?);

        if elk::uses_service_token(&self.options.elastic_major) {
            let stdout = runner
                .run_sensitive_step(
                    node,
                    "Create Kibana service token",
                    &elk::create_kibana_service_token(KIBANA_TOKEN_NAME),
                    elevate,
                )
                .await?;
            context.kibana_service_token = Some(parse_service_token(&stdout)?);
        }
        Ok(())
    }

    async fn kibana_and_logstash(
        &self,
        runner: &mut StepRunner<'_>,
        env: &NodeEnvironment,
        context: &ElasticContext,
    ) -> Result<()> {
        let node = &self.options.connection;
        let elevate = env.privilege.elevate();
        let kibana = elk::kibana_config(&KibanaSettings {
            host: &self.options.kibana_host,
            port: self.options.kibana_port,
            elasticsearch_port: self.options.http_port,
            elastic_major: &self.options.elastic_major,
            elastic_password: context.elastic_password.as_deref(),
            service_token: context.kibana_service_token.as_deref(),
        })?;

        runner
            .run_step(node, "Configure Kibana CA", &elk::kibana_ca(), elevate)
            .await?;
        runner
            .run_sensitive_step(node, "Write Kibana config", &kibana, elevate)
            .await?;
        runner
            .run_step(node, "Configure Logstash CA", &elk::logstash_ca(), elevate)
            .await?;
        runner
            .run_step(
                node,
                "Write Logstash pipeline",
                &elk::logstash_pipeline(self.options.http_port, self.options.logstash_port),
                elevate,
            )
            .await?;
        runner
            .run_sensitive_step(
                node,
                "Create Logstash keystore",
                &elk::logstash_keystore(context.password()?),
                elevate,
            )
            .await?;
        runner
            .run_step(node, "Enable and start Kibana", &elk::service_enable("kibana"), elevate)
            .await?;
        runner
            .run_step(
                node,
                "Enable and start Logstash",
                &elk::service_enable("logstash"),
                elevate,
            )
            .await?;
        Ok(())
    }

    async fn firewall(
        &self,
        runner: &mut StepRunner<'_>,
        env: &NodeEnvironment,
        context: &mut ElasticContext,
    ) -> Result<()> {
        if !self.options.open_firewall {
            return Ok(());
        }
        match elk::firewall(
            env.os_family,
            self.options.http_port,
            self.options.kibana_port,
            self.options.logstash_port,
        ) {
            Some(script) => {
                runner
                    .run_step(
                        &self.options.connection,
                        "Open firewall ports",
                        &script,
                        env.privilege.elevate(),
                    )
                    .await?;
            }
            None => {
                info!("No firewall tooling for {}, leaving ports unchanged", env.os_family);
                context.notes.push(FIREWALL_SKIPPED_NOTE.to_string());
            }
        }
        Ok(())
    }

    async fn smoke_tests(
        &self,
        runner: &mut StepRunner<'_>,
        env: &NodeEnvironment,
        context: &ElasticContext,
    ) -> Result<()> {
        let node = &self.options.connection;
        let elevate = env.privilege.elevate();

        runner
            .run_step(
                node,
                "Test Elasticsearch",
                &elk::elasticsearch_test(context.password()?, self.options.http_port),
                elevate,
            )
            .await?;
        runner
            .run_step(
                node,
                "Test Kibana",
                &elk::kibana_test(self.options.kibana_port),
                elevate,
            )
            .await?;
        runner
            .run_step(node, "Test Logstash", &elk::logstash_test(), elevate)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::OsFamily;
    use crate::config::{NodeConnection, NodeMode};
    use crate::network::mock::{MockConnector, PHOTON_5_OS_RELEASE};
    use crate::network::CommandOutput;
    use crate::reporter::recording::RecordingReporter;
    use crate::steps::StepStatus;

    fn options() -> InstallOptions {
        InstallOptions::new(NodeConnection::new("10.0.0.9", 22, "root", "pw"))
    }

    fn connector() -> MockConnector {
        let mock = MockConnector::root_debian();
        mock.respond(
            "elasticsearch-reset-password",
            CommandOutput::new("Password for the [elastic] user successfully reset.\nNew value: Gen3rated\n", "", 0),
        );
        mock.respond(
            "elasticsearch-service-tokens create",
            CommandOutput::new("SERVICE_TOKEN elastic/kibana/elk-installer = AAEAAWVs\n", "", 0),
        );
        mock
    }

    fn step_names(result: &InstallResult) -> Vec<&str> {
        result.steps.iter().map(|s| s.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_install_8x_uses_service_token() {
        let options = options();
        let connector = connector();
        let reporter = RecordingReporter::default();

        let result = ElasticInstaller::new(&options, &connector, &reporter).install().await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.message, "Elastic Stack installation completed");
        assert_eq!(result.elastic_password.as_deref(), Some("Gen3rated"));
        assert_eq!(result.elasticsearch_url.as_deref(), Some("https://10.0.0.9:9200"));
        assert_eq!(result.kibana_url.as_deref(), Some("http://10.0.0.9:5601"));
        assert_eq!(result.os_family, Some(OsFamily::Debian12));

        assert_eq!(connector.count_matching("serviceAccountToken: \"AAEAAWVs\""), 1);
        let names = step_names(&result);
        assert!(names.contains(&"Create Kibana service token"));
        assert!(!names.contains(&"Open firewall ports"));
        assert_eq!(names.last(), Some(&"Test Logstash"));

        let reset = result
            .steps
            .iter()
            .find(|s| s.name == "Reset elastic password")
            .unwrap();
        assert!(reset.output.is_none());
    }

    #[tokio::test]
    async fn test_install_7x_uses_password_for_kibana() {
        let mut options = options();
        options.elastic_major = "7".to_string();
        options.skip_tests = true;
        let connector = connector();
        let reporter = RecordingReporter::default();

        let result = ElasticInstaller::new(&options, &connector, &reporter).install().await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(connector.count_matching("elasticsearch-service-tokens"), 0);
        assert_eq!(connector.count_matching("elasticsearch.password: \"Gen3rated\""), 1);
        assert!(!step_names(&result).iter().any(|n| n.starts_with("Test ")));
    }

    #[tokio::test]
    async fn test_firewall_without_tooling_is_a_note() {
        let mut options = options();
        options.open_firewall = true;
        options.skip_tests = true;
        let connector = connector();
        connector.respond("/etc/os-release", CommandOutput::new(PHOTON_5_OS_RELEASE, "", 0));
        let reporter = RecordingReporter::default();

        let result = ElasticInstaller::new(&options, &connector, &reporter).install().await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            result.message,
            "Elastic Stack installation completed. Notes: Firewall rules not applied for this OS"
        );
        assert!(!step_names(&result).contains(&"Open firewall ports"));
        assert_eq!(result.os_family, Some(OsFamily::Photon5));
    }

    #[tokio::test]
    async fn test_firewall_opened_on_debian() {
        let mut options = options();
        options.open_firewall = true;
        options.skip_tests = true;
        let connector = connector();
        let reporter = RecordingReporter::default();

        let result = ElasticInstaller::new(&options, &connector, &reporter).install().await;

        assert!(result.success);
        assert!(step_names(&result).contains(&"Open firewall ports"));
        assert_eq!(connector.count_matching("ufw allow 9200/tcp"), 1);
    }

    #[tokio::test]
    async fn test_unparsable_password_stops_the_run() {
        let options = options();
        let connector = connector();
        connector.respond(
            "elasticsearch-reset-password",
            CommandOutput::new("unexpected output\n", "", 0),
        );
        let reporter = RecordingReporter::default();

        let result = ElasticInstaller::new(&options, &connector, &reporter).install().await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("elastic password not found"));
        assert_eq!(connector.count_matching("kibana.yml"), 0);
        assert!(result.elastic_password.is_none());
    }

    #[tokio::test]
    async fn test_wait_failure_names_node_and_step() {
        let options = options();
        let connector = connector();
        connector.respond(
            "systemctl is-active --quiet elasticsearch",
            CommandOutput::new("", "", 1),
        );
        let reporter = RecordingReporter::default();

        let result = ElasticInstaller::new(&options, &connector, &reporter).install().await;

        assert!(!result.success);
        let error = result.error.unwrap();
        assert_eq!(error, "[root@10.0.0.9:22] Wait for Elasticsearch failed: exit code 1");
        let last = result.steps.last().unwrap();
        assert_eq!(last.status, StepStatus::Failed);
        assert_eq!(connector.count_matching("elasticsearch-reset-password"), 0);
    }

    #[tokio::test]
    async fn test_invalid_options_never_connect() {
        let mut options = options();
        options.node_mode = NodeMode::Multi;
        let connector = connector();
        let reporter = RecordingReporter::default();

        let result = ElasticInstaller::new(&options, &connector, &reporter).install().await;

        assert!(!result.success);
        assert_eq!(result.message, "Invalid options");
        assert!(result.error.unwrap().contains("seed_hosts is required"));
        assert_eq!(connector.connections(), 0);
    }
}
