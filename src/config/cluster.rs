// file: src/config/cluster.rs
// version: 1.0.1
// guid: 6a313fa6-b5e6-4d34-bb32-aef8e2b40603

//! Kubernetes cluster topology configuration

use super::NodeConnection;
use serde::{Deserialize, Serialize};
use std::net::Ipv6Addr;

/// API server port appended to endpoints that do not carry one
pub const API_SERVER_PORT: u16 = 6443;

pub const DEFAULT_POD_NETWORK_CIDR: &str = "192.168.0.0/16";
pub const DEFAULT_KUBERNETES_VERSION: &str = "v1.29";
pub const DEFAULT_CALICO_VERSION: &str = "v3.27.0";
pub const DEFAULT_METALLB_VERSION: &str = "v0.14.3";

/// Cluster configuration shared by single-master and HA installs.
///
/// A single-master install is simply a cluster with one entry in
/// `master_nodes`; the first master bootstraps the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawClusterConfig")]
pub struct ClusterConfig {
    pub master_nodes: Vec<NodeConnection>,
    pub worker_nodes: Vec<NodeConnection>,
    pub load_balancer_ip: Option<String>,
    pub pod_network_cidr: String,
    pub metallb_ip_range: Option<String>,
    pub kubernetes_version: String,
    pub calico_version: String,
    pub metallb_version: String,
}

impl ClusterConfig {
    /// Build a config with default component versions
    pub fn new(master_nodes: Vec<NodeConnection>, worker_nodes: Vec<NodeConnection>) -> Self {
        Self {
            master_nodes,
            worker_nodes,
            load_balancer_ip: None,
            pod_network_cidr: DEFAULT_POD_NETWORK_CIDR.to_string(),
            metallb_ip_range: None,
            kubernetes_version: DEFAULT_KUBERNETES_VERSION.to_string(),
            calico_version: DEFAULT_CALICO_VERSION.to_string(),
            metallb_version: DEFAULT_METALLB_VERSION.to_string(),
        }
    }

    /// Validate every node, returning field-level messages.
    ///
    /// Network settings are passed through to kubeadm as given.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.master_nodes.is_empty() {
            errors.push("at least one master node is required".to_string());
        }
        for (i, master) in self.master_nodes.iter().enumerate() {
            errors.extend(
                master
                    .validate()
                    .into_iter()
                    .map(|e| format!("Master {}: {}", i + 1, e)),
            );
        }
        for (i, worker) in self.worker_nodes.iter().enumerate() {
            errors.extend(
                worker
                    .validate()
                    .into_iter()
                    .map(|e| format!("Worker {}: {}", i + 1, e)),
            );
        }

        errors
    }

    /// Every node, masters first, in configured order
    pub fn all_nodes(&self) -> impl Iterator<Item = &NodeConnection> {
        self.master_nodes.iter().chain(self.worker_nodes.iter())
    }

    /// Master that runs `kubeadm init`
    pub fn primary_master(&self) -> Option<&NodeConnection> {
        self.master_nodes.first()
    }

    /// Masters that join the existing control plane
    pub fn additional_masters(&self) -> &[NodeConnection] {
        self.master_nodes.get(1..).unwrap_or(&[])
    }

    pub fn is_high_availability(&self) -> bool {
        self.master_nodes.len() > 1
    }

    /// Endpoint the API server is reached through.
    ///
    /// The load balancer address wins when set; a missing port defaults to 6443.
    pub fn control_plane_endpoint(&self) -> String {
        match self.load_balancer_ip.as_deref().map(str::trim) {
            Some(lb) if !lb.is_empty() => with_default_port(lb),
            _ => {
                let host = self
                    .primary_master()
                    .map(|m| m.host.trim())
                    .unwrap_or_default();
                with_default_port(host)
            }
        }
    }
}

fn with_default_port(host: &str) -> String {
    if host.parse::<Ipv6Addr>().is_ok() {
        return format!("[{}]:{}", host, API_SERVER_PORT);
    }
    if host.contains(':') {
        return host.to_string();
    }
    format!("{}:{}", host, API_SERVER_PORT)
}

/// On-disk shape; accepts both the HA keys and the single-master keys
#[derive(Debug, Deserialize)]
struct RawClusterConfig {
    #[serde(default)]
    master_nodes: Vec<NodeConnection>,
    control_plane: Option<NodeConnection>,
    #[serde(default, alias = "workers")]
    worker_nodes: Vec<NodeConnection>,
    load_balancer_ip: Option<String>,
    pod_network_cidr: Option<String>,
    metallb_ip_range: Option<String>,
    kubernetes_version: Option<String>,
    calico_version: Option<String>,
    metallb_version: Option<String>,
}

impl TryFrom<RawClusterConfig> for ClusterConfig {
    type Error = String;

    fn try_from(raw: RawClusterConfig) -> std::result::Result<Self, Self::Error> {
        let master_nodes = match (raw.master_nodes.is_empty(), raw.control_plane) {
            (false, Some(_)) => {
                return Err("specify either master_nodes or control_plane, not both".to_string())
            }
            (true, Some(cp)) => vec![cp],
            // an empty list is reported by validate()
            (_, None) => raw.master_nodes,
        };

        let blank_to_none = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        Ok(Self {
            master_nodes,
            worker_nodes: raw.worker_nodes,
            load_balancer_ip: blank_to_none(raw.load_balancer_ip),
            pod_network_cidr: raw
                .pod_network_cidr
                .unwrap_or_else(|| DEFAULT_POD_NETWORK_CIDR.to_string()),
            metallb_ip_range: blank_to_none(raw.metallb_ip_range),
            kubernetes_version: raw
                .kubernetes_version
                .unwrap_or_else(|| DEFAULT_KUBERNETES_VERSION.to_string()),
            calico_version: raw
                .calico_version
                .unwrap_or_else(|| DEFAULT_CALICO_VERSION.to_string()),
            metallb_version: raw
                .metallb_version
                .unwrap_or_else(|| DEFAULT_METALLB_VERSION.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(host: &str) -> NodeConnection {
        NodeConnection::new(host, 22, "root", "secret")
    }

    #[test]
    fn test_endpoint_defaults_to_primary_master() {
        let mut config = ClusterConfig::new(
            vec![node("10.0.0.1")],
            vec![node("10.0.0.2"), node("10.0.0.3")],
        );
        config.pod_network_cidr = "192.168.0.0/16".to_string();
        assert_eq!(config.control_plane_endpoint(), "10.0.0.1:6443");
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_endpoint_uses_load_balancer() {
        let mut config = ClusterConfig::new(vec![node("10.0.0.1"), node("10.0.0.2")], vec![]);
        config.load_balancer_ip = Some("10.0.0.100".to_string());
        assert_eq!(config.control_plane_endpoint(), "10.0.0.100:6443");

        config.load_balancer_ip = Some("lb.example.com:8443".to_string());
        assert_eq!(config.control_plane_endpoint(), "lb.example.com:8443");

        config.load_balancer_ip = Some("fd00::10".to_string());
        assert_eq!(config.control_plane_endpoint(), "[fd00::10]:6443");
    }

    #[test]
    fn test_validate_requires_a_master() {
        let config = ClusterConfig::new(vec![], vec![node("10.0.0.2")]);
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("master"));
    }

    #[test]
    fn test_validate_prefixes_node_position() {
        let config = ClusterConfig::new(
            vec![node("10.0.0.1"), NodeConnection::new("", 22, "root", "x")],
            vec![NodeConnection::new("10.0.0.5", 70000, "root", "")],
        );
        let errors = config.validate();
        assert!(errors.contains(&"Master 2: host is required".to_string()));
        assert!(errors.iter().any(|e| e.starts_with("Worker 1: port")));
        assert!(errors.contains(&"Worker 1: password is required".to_string()));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_validate_is_empty_iff_every_node_validates() {
        let good = vec![node("a"), node("b")];
        let bad = vec![node("a"), NodeConnection::new("b", 22, "", "x")];
        assert!(ClusterConfig::new(good.clone(), good.clone()).validate().is_empty());
        assert!(!ClusterConfig::new(good.clone(), bad.clone()).validate().is_empty());
        assert!(!ClusterConfig::new(bad, good).validate().is_empty());
    }

    #[test]
    fn test_validate_checks_nodes_only() {
        let mut config = ClusterConfig::new(vec![node("10.0.0.1")], vec![]);
        config.pod_network_cidr = "10.244.0.0".to_string();
        config.load_balancer_ip = Some("  ".to_string());
        assert!(config.validate().is_empty());
        assert_eq!(config.control_plane_endpoint(), "10.0.0.1:6443");
    }

    #[test]
    fn test_single_master_shape_deserializes() {
        let yaml = r#"
control_plane:
  host: 10.0.0.1
  user: root
  password: secret
workers:
  - host: 10.0.0.2
    port: 2222
    user: root
    password: secret
pod_network_cidr: 10.244.0.0/16
"#;
        let config: ClusterConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.master_nodes.len(), 1);
        assert_eq!(config.worker_nodes[0].port, 2222);
        assert_eq!(config.pod_network_cidr, "10.244.0.0/16");
        assert_eq!(config.kubernetes_version, DEFAULT_KUBERNETES_VERSION);
        assert!(!config.is_high_availability());
    }

    #[test]
    fn test_both_master_shapes_is_rejected() {
        let yaml = r#"
control_plane: {host: a, user: b, password: c}
master_nodes:
  - {host: a, user: b, password: c}
"#;
        assert!(serde_yaml::from_str::<ClusterConfig>(yaml).is_err());
    }

    #[test]
    fn test_additional_masters() {
        let config = ClusterConfig::new(vec![node("a"), node("b"), node("c")], vec![]);
        let hosts: Vec<_> = config.additional_masters().iter().map(|n| n.host.as_str()).collect();
        assert_eq!(hosts, vec!["b", "c"]);
        assert_eq!(config.all_nodes().count(), 3);

        let single = ClusterConfig::new(vec![node("a")], vec![]);
        assert!(single.additional_masters().is_empty());
    }
}
