// file: src/cli/args.rs
// version: 2.0.0
// guid: f6g7h8i9-j0k1-2345-6789-012345fghijk

//! Command line argument definitions

use crate::config::NodeMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cluster-provisioner")]
#[command(about = "Install Kubernetes clusters and the Elastic Stack on remote hosts over SSH")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install a Kubernetes cluster
    Install {
        #[arg(short, long, help = "Cluster configuration file (YAML); prompts when omitted")]
        config: Option<PathBuf>,

        #[arg(short = 'y', long, help = "Skip the confirmation prompt")]
        yes: bool,

        #[arg(long, help = "Print the result as JSON")]
        json_output: bool,
    },

    /// Install Elasticsearch, Kibana and Logstash on one host
    Elastic(ElasticArgs),

    /// Load and validate a configuration file without installing
    Validate {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(long, help = "Validate Elastic Stack options instead of a cluster")]
        elastic: bool,

        #[arg(long, help = "Also open an SSH session to every node")]
        check_connection: bool,
    },

    /// List available installers
    List {
        #[arg(long)]
        json_output: bool,
    },

    /// Show details and parameters of one installer
    Info { name: String },
}

#[derive(clap::Args, Debug)]
pub struct ElasticArgs {
    #[arg(short, long, help = "Options file (YAML); connection flags are ignored when set")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Target host address")]
    pub host: Option<String>,

    #[arg(long, default_value_t = 22)]
    pub port: u32,

    #[arg(long, default_value = "root")]
    pub user: String,

    #[arg(long, env = "CLUSTER_PROVISIONER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[arg(long, default_value = "8", help = "Elastic major version")]
    pub elastic_major: String,

    #[arg(long, default_value = "elk-cluster")]
    pub cluster_name: String,

    #[arg(long, value_enum, default_value = "single")]
    pub node_mode: NodeModeArg,

    #[arg(long, default_value = "0.0.0.0")]
    pub bind_host: String,

    #[arg(long, default_value_t = 9200)]
    pub http_port: u16,

    #[arg(long, default_value = "0.0.0.0")]
    pub kibana_host: String,

    #[arg(long, default_value_t = 5601)]
    pub kibana_port: u16,

    #[arg(long, default_value_t = 5044)]
    pub logstash_port: u16,

    #[arg(long, default_value = "2g")]
    pub heap_size: String,

    #[arg(long)]
    pub open_firewall: bool,

    #[arg(long = "seed-host", help = "Seed host for multi-node discovery (repeatable)")]
    pub seed_hosts: Vec<String>,

    #[arg(long = "initial-master", help = "Initial master node name (repeatable)")]
    pub initial_masters: Vec<String>,

    #[arg(long)]
    pub skip_tests: bool,

    #[arg(long, default_value_t = 180, help = "Seconds to wait for Elasticsearch to start")]
    pub wait_seconds: u64,

    #[arg(short = 'y', long)]
    pub yes: bool,

    #[arg(long)]
    pub json_output: bool,
}

/// Node mode argument for CLI
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum NodeModeArg {
    Single,
    Multi,
}

impl From<NodeModeArg> for NodeMode {
    fn from(mode: NodeModeArg) -> Self {
        match mode {
            NodeModeArg::Single => NodeMode::Single,
            NodeModeArg::Multi => NodeMode::Multi,
        }
    }
}

impl Commands {
    /// Whether results for this command are printed as JSON
    pub fn json_output(&self) -> bool {
        match self {
            Commands::Install { json_output, .. } | Commands::List { json_output } => *json_output,
            Commands::Elastic(args) => args.json_output,
            Commands::Validate { .. } | Commands::Info { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_install_flags() {
        let cli = Cli::parse_from(["cluster-provisioner", "-v", "install", "-c", "c.yaml", "-y", "--json-output"]);
        assert!(cli.verbose);
        assert!(cli.command.json_output());
        match cli.command {
            Commands::Install { config, yes, .. } => {
                assert_eq!(config, Some(PathBuf::from("c.yaml")));
                assert!(yes);
            }
            _ => panic!("expected install"),
        }
    }

    #[test]
    fn test_parse_elastic_repeatable_flags() {
        let cli = Cli::parse_from([
            "cluster-provisioner",
            "elastic",
            "--host",
            "10.0.0.9",
            "--node-mode",
            "multi",
            "--seed-host",
            "a",
            "--seed-host",
            "b",
            "--initial-master",
            "es-1",
        ]);
        match cli.command {
            Commands::Elastic(args) => {
                assert_eq!(args.seed_hosts, vec!["a", "b"]);
                assert_eq!(args.initial_masters, vec!["es-1"]);
                assert_eq!(NodeMode::from(args.node_mode), NodeMode::Multi);
                assert_eq!(args.port, 22);
                assert_eq!(args.http_port, 9200);
            }
            _ => panic!("expected elastic"),
        }
    }
}
