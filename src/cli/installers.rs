// file: src/cli/installers.rs
// version: 1.0.0
// guid: c4d81e6b-2a95-4f07-b3c8-6e1f9a0d2b74

//! Static descriptions of the available installers for `list` and `info`

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ParameterInfo {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<&'static str>,
    pub description: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallerInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub command: &'static str,
    pub description: &'static str,
    pub parameters: &'static [ParameterInfo],
}

const fn param(
    name: &'static str,
    kind: &'static str,
    required: bool,
    default: Option<&'static str>,
    description: &'static str,
) -> ParameterInfo {
    ParameterInfo {
        name,
        kind,
        required,
        default,
        description,
    }
}

const KUBERNETES_PARAMETERS: &[ParameterInfo] = &[
    param("master_nodes", "node list", true, None, "Control-plane nodes; the first one bootstraps the cluster"),
    param("worker_nodes", "node list", false, None, "Worker nodes"),
    param("load_balancer_ip", "string", false, None, "Address forwarding 6443 to the masters (HA)"),
    param("pod_network_cidr", "cidr", false, Some("192.168.0.0/16"), "Pod network handed to kubeadm and Calico"),
    param("metallb_ip_range", "string", false, None, "Address pool for MetalLB; skipped when empty"),
    param("kubernetes_version", "string", false, Some("v1.29"), "Kubernetes package stream"),
    param("calico_version", "string", false, Some("v3.27.0"), "Calico release"),
    param("metallb_version", "string", false, Some("v0.14.3"), "MetalLB release"),
];

const ELASTIC_PARAMETERS: &[ParameterInfo] = &[
    param("connection", "node", true, None, "Target host, port, user and password"),
    param("elastic_major", "string", false, Some("8"), "Elastic major version"),
    param("cluster_name", "string", false, Some("elk-cluster"), "Elasticsearch cluster name"),
    param("node_mode", "single|multi", false, Some("single"), "Discovery mode"),
    param("bind_host", "string", false, Some("0.0.0.0"), "Elasticsearch network.host"),
    param("http_port", "integer", false, Some("9200"), "Elasticsearch HTTP port"),
    param("kibana_host", "string", false, Some("0.0.0.0"), "Kibana server.host"),
    param("kibana_port", "integer", false, Some("5601"), "Kibana port"),
    param("logstash_port", "integer", false, Some("5044"), "Logstash beats input port"),
    param("heap_size", "string", false, Some("2g"), "Elasticsearch JVM heap"),
    param("open_firewall", "bool", false, Some("false"), "Open the stack ports in the host firewall"),
    param("seed_hosts", "string list", false, None, "Discovery seed hosts (multi-node)"),
    param("initial_masters", "string list", false, None, "Initial master nodes (multi-node)"),
    param("skip_tests", "bool", false, Some("false"), "Skip the smoke tests"),
    param("wait_seconds", "integer", false, Some("180"), "Time allowed for Elasticsearch to start"),
];

pub const INSTALLERS: &[InstallerInfo] = &[
    InstallerInfo {
        name: "k8s-installer",
        version: env!("CARGO_PKG_VERSION"),
        command: "install",
        description: "Install a single-master or HA Kubernetes cluster with containerd, Calico and optional MetalLB",
        parameters: KUBERNETES_PARAMETERS,
    },
    InstallerInfo {
        name: "elk-installer",
        version: env!("CARGO_PKG_VERSION"),
        command: "elastic",
        description: "Install Elasticsearch, Kibana and Logstash on one host",
        parameters: ELASTIC_PARAMETERS,
    },
];

pub fn find(name: &str) -> Option<&'static InstallerInfo> {
    INSTALLERS.iter().find(|i| i.name == name || i.command == name)
}
