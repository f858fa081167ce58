// file: src/config/elastic.rs
// version: 1.0.0
// guid: 85c45718-a45f-4b68-b710-b6be2a6d1e81

//! Elastic Stack install options

use super::NodeConnection;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Elasticsearch discovery mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeMode {
    #[default]
    Single,
    Multi,
}

impl NodeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeMode::Single => "single",
            NodeMode::Multi => "multi",
        }
    }
}

impl fmt::Display for NodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for a single-host Elastic Stack install
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallOptions {
    pub connection: NodeConnection,
    #[serde(default = "defaults::elastic_major")]
    pub elastic_major: String,
    #[serde(default = "defaults::cluster_name")]
    pub cluster_name: String,
    #[serde(default)]
    pub node_mode: NodeMode,
    #[serde(default = "defaults::any_host")]
    pub bind_host: String,
    #[serde(default = "defaults::http_port")]
    pub http_port: u16,
    #[serde(default = "defaults::any_host")]
    pub kibana_host: String,
    #[serde(default = "defaults::kibana_port")]
    pub kibana_port: u16,
    #[serde(default = "defaults::logstash_port")]
    pub logstash_port: u16,
    #[serde(default = "defaults::heap_size")]
    pub heap_size: String,
    #[serde(default)]
    pub open_firewall: bool,
    #[serde(default)]
    pub seed_hosts: Vec<String>,
    #[serde(default)]
    pub initial_masters: Vec<String>,
    #[serde(default)]
    pub skip_tests: bool,
    #[serde(default = "defaults::wait_seconds")]
    pub wait_seconds: u64,
}

mod defaults {
    pub fn elastic_major() -> String {
        "8".to_string()
    }
    pub fn cluster_name() -> String {
        "elk-cluster".to_string()
    }
    pub fn any_host() -> String {
        "0.0.0.0".to_string()
    }
    pub fn http_port() -> u16 {
        9200
    }
    pub fn kibana_port() -> u16 {
        5601
    }
    pub fn logstash_port() -> u16 {
        5044
    }
    pub fn heap_size() -> String {
        "2g".to_string()
    }
    pub fn wait_seconds() -> u64 {
        180
    }
}

impl InstallOptions {
    /// Options with every setting at its default
    pub fn new(connection: NodeConnection) -> Self {
        Self {
            connection,
            elastic_major: defaults::elastic_major(),
            cluster_name: defaults::cluster_name(),
            node_mode: NodeMode::Single,
            bind_host: defaults::any_host(),
            http_port: defaults::http_port(),
            kibana_host: defaults::any_host(),
            kibana_port: defaults::kibana_port(),
            logstash_port: defaults::logstash_port(),
            heap_size: defaults::heap_size(),
            open_firewall: false,
            seed_hosts: Vec::new(),
            initial_masters: Vec::new(),
            skip_tests: false,
            wait_seconds: defaults::wait_seconds(),
        }
    }

    /// Validate options, returning one message per problem
    pub fn validate(&self) -> Vec<String> {
        let mut errors = self.connection.validate();

        if self.node_mode == NodeMode::Multi {
            if self.seed_hosts.is_empty() {
                errors.push("seed_hosts is required for multi-node".to_string());
            }
            if self.initial_masters.is_empty() {
                errors.push("initial_masters is required for multi-node".to_string());
            }
        }
        if self.elastic_major.trim().is_empty() {
            errors.push("elastic_major is required".to_string());
        }
        if self.heap_size.trim().is_empty() {
            errors.push("heap_size is required".to_string());
        }
        if self.cluster_name.trim().is_empty() {
            errors.push("cluster_name is required".to_string());
        }

        errors
    }

    pub fn elasticsearch_url(&self) -> String {
        format!("https://{}:{}", self.connection.host, self.http_port)
    }

    pub fn kibana_url(&self) -> String {
        format!("http://{}:{}", self.connection.host, self.kibana_port)
    }
}
