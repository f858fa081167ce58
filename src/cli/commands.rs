// file: src/cli/commands.rs
// version: 2.1.0
// guid: g7h8i9j0-k1l2-3456-7890-123456ghijkl

//! Command implementations for the CLI
//!
//! Handlers return `Ok(true)` on success and `Ok(false)` for failures
//! they have already reported to the operator. A declined confirmation
//! counts as a failure so scripted callers see a non-zero exit.

use super::args::ElasticArgs;
use super::installers::{self, INSTALLERS};
use super::output;
use super::prompts::Prompter;
use crate::{
    config::{ClusterConfig, ConfigLoader, ExecutionSettings, InstallOptions, NodeConnection},
    error::ProvisionError,
    installer::{ClusterInstaller, ElasticInstaller},
    network::{test_connection, SshConnector},
    reporter::{CompositeReporter, ConsoleReporter, ProgressReporter, TracingReporter},
    Result,
};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

fn reporter(json_output: bool, verbose: bool) -> Box<dyn ProgressReporter> {
    if json_output {
        Box::new(TracingReporter)
    } else if verbose {
        Box::new(CompositeReporter::new(vec![
            Box::new(ConsoleReporter::new()),
            Box::new(TracingReporter),
        ]))
    } else {
        Box::new(ConsoleReporter::new())
    }
}

/// Report a load or validation error; each field-level message on its own line
fn report_config_error(title: &str, error: &ProvisionError, json_output: bool) -> Result<()> {
    let text = match error.validation_errors() {
        Some(errors) if !json_output => errors.join("\n  "),
        _ => error.to_string(),
    };
    output::print_error(title, &text, json_output)
}

/// Install a Kubernetes cluster
pub async fn install_command(
    config_path: Option<PathBuf>,
    yes: bool,
    json_output: bool,
    verbose: bool,
) -> Result<bool> {
    let config = match config_path {
        Some(path) => match ConfigLoader::new().load_cluster_config(&path) {
            Ok(config) => config,
            Err(e) => {
                report_config_error("Configuration load failed", &e, json_output)?;
                return Ok(false);
            }
        },
        None => match Prompter::stdio().collect_cluster() {
            Ok(config) => config,
            Err(e @ ProvisionError::ValidationError(_)) => {
                report_config_error("Configuration validation failed", &e, json_output)?;
                return Ok(false);
            }
            Err(e) => return Err(e),
        },
    };

    if !yes && !json_output && !confirm_cluster(&config)? {
        println!("Installation cancelled");
        return Ok(false);
    }

    let connector = SshConnector::default();
    let reporter = reporter(json_output, verbose);
    let result = ClusterInstaller::new(&config, &connector, reporter.as_ref())
        .with_settings(ExecutionSettings::default())
        .install()
        .await;

    output::print_execution_result(&result, json_output)?;
    Ok(result.success)
}

fn confirm_cluster(config: &ClusterConfig) -> Result<bool> {
    output::print_summary("Cluster configuration", config)?;
    eprintln!("Control plane endpoint: {}", config.control_plane_endpoint());
    if config.is_high_availability() {
        eprintln!(
            "Mode: high availability ({} masters)",
            config.master_nodes.len()
        );
    }
    Prompter::stdio().confirm("Proceed with installation?")
}

/// Install the Elastic Stack on one host
pub async fn elastic_command(args: ElasticArgs, verbose: bool) -> Result<bool> {
    let json_output = args.json_output;
    let options = match elastic_options(&args) {
        Ok(options) => options,
        Err(e) => {
            report_config_error("Invalid options", &e, json_output)?;
            return Ok(false);
        }
    };

    if !args.yes && !json_output {
        output::print_summary("Elastic Stack configuration", &options)?;
        if !Prompter::stdio().confirm("Proceed with installation?")? {
            println!("Installation cancelled");
            return Ok(false);
        }
    }

    let connector = SshConnector::default();
    let reporter = reporter(json_output, verbose);
    let result = ElasticInstaller::new(&options, &connector, reporter.as_ref())
        .install()
        .await;

    output::print_install_result(&result, json_output)?;
    Ok(result.success)
}

/// Options from `--config`, else from flags with prompts for missing connection details
fn elastic_options(args: &ElasticArgs) -> Result<InstallOptions> {
    if let Some(path) = &args.config {
        return ConfigLoader::new().load_install_options(path);
    }

    let mut prompter = Prompter::stdio();
    let host = match &args.host {
        Some(host) => host.clone(),
        None => prompter.ask_required("HostAddr")?,
    };
    let password = match &args.password {
        Some(password) => password.clone(),
        None => prompter.ask_password("HostPass")?,
    };

    let mut options = InstallOptions::new(NodeConnection::new(
        host.trim(),
        args.port,
        args.user.trim(),
        password,
    ));
    options.elastic_major = args.elastic_major.trim().to_string();
    options.cluster_name = args.cluster_name.trim().to_string();
    options.node_mode = args.node_mode.into();
    options.bind_host = args.bind_host.trim().to_string();
    options.http_port = args.http_port;
    options.kibana_host = args.kibana_host.trim().to_string();
    options.kibana_port = args.kibana_port;
    options.logstash_port = args.logstash_port;
    options.heap_size = args.heap_size.trim().to_string();
    options.open_firewall = args.open_firewall;
    options.seed_hosts = args.seed_hosts.clone();
    options.initial_masters = args.initial_masters.clone();
    options.skip_tests = args.skip_tests;
    options.wait_seconds = args.wait_seconds;

    let errors = options.validate();
    if errors.is_empty() {
        Ok(options)
    } else {
        Err(ProvisionError::ValidationError(errors))
    }
}

/// Load and validate a configuration file, optionally probing SSH access
pub async fn validate_command(path: &Path, elastic: bool, check_connection: bool) -> Result<bool> {
    let loader = ConfigLoader::new();
    let nodes: Vec<NodeConnection> = if elastic {
        match loader.load_install_options(path) {
            Ok(options) => {
                output::print_summary("Elastic Stack configuration", &options)?;
                vec![options.connection]
            }
            Err(e) => {
                report_config_error("Configuration is invalid", &e, false)?;
                return Ok(false);
            }
        }
    } else {
        match loader.load_cluster_config(path) {
            Ok(config) => {
                output::print_summary("Cluster configuration", &config)?;
                eprintln!("Control plane endpoint: {}", config.control_plane_endpoint());
                config.all_nodes().cloned().collect()
            }
            Err(e) => {
                report_config_error("Configuration is invalid", &e, false)?;
                return Ok(false);
            }
        }
    };

    println!("{} Configuration is valid", "✓".green().bold());
    if !check_connection {
        return Ok(true);
    }

    let connector = SshConnector::default();
    let timeout = ExecutionSettings::default().command_timeout();
    let mut reachable = true;
    for node in &nodes {
        match test_connection(&connector, node, timeout).await {
            Ok(()) => println!("{} {}", "✓".green(), node),
            Err(e) => {
                warn!("Connection check failed for {}: {}", node, e);
                println!("{} {}: {}", "✗".red(), node, e);
                reachable = false;
            }
        }
    }
    Ok(reachable)
}

/// List available installers
pub fn list_command(json_output: bool) -> Result<bool> {
    if json_output {
        output::print_json(&serde_json::json!({ "installers": INSTALLERS }))?;
        return Ok(true);
    }

    println!("\nAvailable installers:\n");
    for installer in INSTALLERS {
        println!(
            "  {} (v{}) - `{}`",
            installer.name.bold(),
            installer.version,
            installer.command
        );
        println!("     {}\n", installer.description);
    }
    Ok(true)
}

/// Show the parameters of one installer
pub fn info_command(name: &str) -> Result<bool> {
    let Some(installer) = installers::find(name) else {
        output::print_error(
            "Unknown installer",
            &format!("no installer named '{}'; run `list` to see them", name),
            false,
        )?;
        return Ok(false);
    };

    info!("Showing installer {}", installer.name);
    println!("\n{} v{}", installer.name.bold(), installer.version);
    println!("\n  {}", installer.description);
    println!("\n  Command: {}", installer.command);
    println!("\n  Parameters:");
    for p in installer.parameters {
        let required = if p.required { "required" } else { "optional" };
        let default = p
            .default
            .map(|d| format!(", default: {}", d))
            .unwrap_or_default();
        println!("    - {} ({}, {}{})", p.name, p.kind, required, default);
        println!("      {}", p.description);
    }
    Ok(true)
}
