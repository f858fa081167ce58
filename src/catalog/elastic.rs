// file: src/catalog/elastic.rs
// version: 1.0.0
// guid: 7a3a1321-f621-44b2-9d0a-10d1e7bfc502

//! Elastic Stack (Elasticsearch, Kibana, Logstash) install scripts

use super::{heredoc, parse_version_major, script, secret_variable, OsFamily};
use crate::config::NodeMode;
use crate::error::ProvisionError;
use crate::Result;

/// First major version with security auto-configuration and service tokens
pub const SERVICE_TOKEN_MIN_MAJOR: u32 = 8;

const ES_HOME: &str = "/usr/share/elasticsearch";
const ES_GPG_KEY: &str = "https://artifacts.elastic.co/GPG-KEY-elasticsearch";

/// Settings rendered into `elasticsearch.yml`
#[derive(Debug, Clone, Copy)]
pub struct ElasticsearchSettings<'a> {
    pub cluster_name: &'a str,
    pub bind_host: &'a str,
    pub http_port: u16,
    pub elastic_major: &'a str,
    pub node_mode: NodeMode,
    pub seed_hosts: &'a [String],
    pub initial_masters: &'a [String],
}

/// Credentials Kibana uses to reach Elasticsearch
#[derive(Debug, Clone, Copy)]
pub struct KibanaSettings<'a> {
    pub host: &'a str,
    pub port: u16,
    pub elasticsearch_port: u16,
    pub elastic_major: &'a str,
    pub elastic_password: Option<&'a str>,
    pub service_token: Option<&'a str>,
}

pub fn uses_service_token(elastic_major: &str) -> bool {
    parse_version_major(elastic_major) >= SERVICE_TOKEN_MIN_MAJOR
}

pub fn update_os(family: OsFamily) -> String {
    script(match family {
        OsFamily::Rhel9 => "dnf -y update",
        OsFamily::Sles15 => "zypper --non-interactive refresh\nzypper --non-interactive update -y",
        OsFamily::Debian12 => {
            "export DEBIAN_FRONTEND=noninteractive\napt-get update\napt-get -y upgrade"
        }
        OsFamily::Photon5 => "tdnf -y update",
    })
}

pub fn prerequisites(family: OsFamily) -> String {
    script(match family {
        OsFamily::Rhel9 => "dnf -y install curl gnupg2",
        OsFamily::Sles15 => "zypper --non-interactive install -y curl",
        OsFamily::Debian12 => {
            "export DEBIAN_FRONTEND=noninteractive\n\
             apt-get install -y ca-certificates curl gnupg\n\
             install -m 0755 -d /etc/apt/keyrings"
        }
        OsFamily::Photon5 => "tdnf -y install curl ca-certificates",
    })
}

/// Register the Elastic package repository for `<major>.x`
pub fn repository(family: OsFamily, elastic_major: &str) -> String {
    let repo_version = format!("{}.x", elastic_major.trim());
    let yum_repo = heredoc(
        &format!("/etc/yum.repos.d/elastic-{}.repo", repo_version),
        &format!(
            "[elastic-{v}]\n\
             name=Elastic repository for {v} packages\n\
             baseurl=https://artifacts.elastic.co/packages/{v}/yum\n\
             gpgcheck=1\n\
             gpgkey={key}\n\
             enabled=1\n\
             autorefresh=1\n\
             type=rpm-md\n",
            v = repo_version,
            key = ES_GPG_KEY
        ),
    );

    let body = match family {
        OsFamily::Rhel9 | OsFamily::Photon5 => format!("rpm --import {}\n{}", ES_GPG_KEY, yum_repo),
        OsFamily::Sles15 => format!(
            "rpm --import {key}\n\
             zypper --non-interactive addrepo -f https://artifacts.elastic.co/packages/{v}/yum elastic-{v} || true\n\
             zypper --non-interactive refresh",
            key = ES_GPG_KEY,
            v = repo_version
        ),
        OsFamily::Debian12 => format!(
            "curl -fsSL {key} | \\\n  gpg --batch --yes --dearmor -o /etc/apt/keyrings/elastic.gpg\n\
             chmod 0644 /etc/apt/keyrings/elastic.gpg\n\
             {list}\n\
             apt-get update",
            key = ES_GPG_KEY,
            list = heredoc(
                &format!("/etc/apt/sources.list.d/elastic-{}.list", repo_version),
                &format!(
                    "deb [signed-by=/etc/apt/keyrings/elastic.gpg] https://artifacts.elastic.co/packages/{}/apt stable main\n",
                    repo_version
                ),
            )
        ),
    };
    script(&body)
}

pub fn install_packages(family: OsFamily) -> String {
    script(match family {
        OsFamily::Rhel9 => "dnf -y install elasticsearch logstash kibana",
        OsFamily::Sles15 => "zypper --non-interactive install -y elasticsearch logstash kibana",
        OsFamily::Debian12 => {
            "export DEBIAN_FRONTEND=noninteractive\napt-get install -y elasticsearch logstash kibana"
        }
        OsFamily::Photon5 => "tdnf -y install elasticsearch logstash kibana",
    })
}

/// Firewall rules for the stack ports.
///
/// `None` means the family has no supported firewall tooling and the
/// step is skipped.
pub fn firewall(
    family: OsFamily,
    http_port: u16,
    kibana_port: u16,
    logstash_port: u16,
) -> Option<String> {
    match family {
        OsFamily::Rhel9 | OsFamily::Sles15 => Some(script(&format!(
            r#"
if systemctl is-active --quiet firewalld; then
  firewall-cmd --add-port={}/tcp --permanent
  firewall-cmd --add-port={}/tcp --permanent
  firewall-cmd --add-port={}/tcp --permanent
  firewall-cmd --reload
fi
"#,
            http_port, kibana_port, logstash_port
        ))),
        OsFamily::Debian12 => Some(script(&format!(
            r#"
if command -v ufw >/dev/null 2>&1; then
  ufw allow {}/tcp
  ufw allow {}/tcp
  ufw allow {}/tcp
fi
"#,
            http_port, kibana_port, logstash_port
        ))),
        OsFamily::Photon5 => None,
    }
}

pub fn elasticsearch_config(settings: &ElasticsearchSettings<'_>) -> Result<String> {
    let mut lines = vec![
        format!("cluster.name: {}", settings.cluster_name),
        "node.name: ${HOSTNAME}".to_string(),
        "path.data: /var/lib/elasticsearch".to_string(),
        "path.logs: /var/log/elasticsearch".to_string(),
        format!("network.host: {}", settings.bind_host),
        format!("http.port: {}", settings.http_port),
    ];

    match settings.node_mode {
        NodeMode::Single => lines.push("discovery.type: single-node".to_string()),
        NodeMode::Multi => {
            if !settings.seed_hosts.is_empty() {
                lines.push(format!(
                    "discovery.seed_hosts: {}",
                    serde_json::to_string(settings.seed_hosts)?
                ));
            }
            if !settings.initial_masters.is_empty() {
                lines.push(format!(
                    "cluster.initial_master_nodes: {}",
                    serde_json::to_string(settings.initial_masters)?
                ));
            }
        }
    }

    if uses_service_token(settings.elastic_major) {
        lines.extend(
            [
                "xpack.security.enabled: true",
                "xpack.security.enrollment.enabled: true",
                "xpack.security.http.ssl:",
                "  enabled: true",
                "  keystore.path: certs/http.p12",
                "xpack.security.transport.ssl:",
                "  enabled: true",
                "  verification_mode: certificate",
                "  keystore.path: certs/transport.p12",
                "  truststore.path: certs/transport.p12",
            ]
            .map(String::from),
        );
    }

    Ok(script(&heredoc(
        "/etc/elasticsearch/elasticsearch.yml",
        &lines.join("\n"),
    )))
}

pub fn jvm_options(heap_size: &str) -> String {
    script(&heredoc(
        "/etc/elasticsearch/jvm.options.d/heap.options",
        &format!("-Xms{0}\n-Xmx{0}\n", heap_size),
    ))
}

/// Render `kibana.yml`.
///
/// Elastic 8+ authenticates with a service token, older releases with the
/// `elastic` user's password; the secret required for the version must be
/// present.
pub fn kibana_config(settings: &KibanaSettings<'_>) -> Result<String> {
    let hosts = serde_json::to_string(&[format!(
        "https://localhost:{}",
        settings.elasticsearch_port
    )])?;

    let credentials = if uses_service_token(settings.elastic_major) {
        let token = settings
            .service_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProvisionError::config("service token is required for Elastic 8+"))?;
        format!(
            "elasticsearch.serviceAccountToken: {}",
            serde_json::to_string(token)?
        )
    } else {
        let password = settings
            .elastic_password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                ProvisionError::config("elastic password is required for Elastic < 8")
            })?;
        format!(
            "elasticsearch.username: \"elastic\"\nelasticsearch.password: {}",
            serde_json::to_string(password)?
        )
    };

    let content = format!(
        "server.host: {}\n\
         server.port: {}\n\
         elasticsearch.hosts: {}\n\
         {}\n\
         elasticsearch.ssl.certificateAuthorities: [\"/etc/kibana/certs/http_ca.crt\"]\n",
        serde_json::to_string(settings.host)?,
        settings.port,
        hosts,
        credentials
    );
    Ok(script(&heredoc("/etc/kibana/kibana.yml", &content)))
}

pub fn logstash_pipeline(elasticsearch_port: u16, logstash_port: u16) -> String {
    let content = format!(
        r#"input {{
  beats {{
    port => {}
  }}
}}

output {{
  elasticsearch {{
    hosts => ["https://localhost:{}"]
    user => "elastic"
    password => "${{ES_PWD}}"
    cacert => "/etc/logstash/certs/http_ca.crt"
  }}
}}
"#,
        logstash_port, elasticsearch_port
    );
    script(&heredoc("/etc/logstash/conf.d/elastic.conf", &content))
}

pub fn kibana_ca() -> String {
    script(
        "mkdir -p /etc/kibana/certs\n\
         cp /etc/elasticsearch/certs/http_ca.crt /etc/kibana/certs/\n\
         chown -R kibana:kibana /etc/kibana/certs",
    )
}

pub fn logstash_ca() -> String {
    script(
        "mkdir -p /etc/logstash/certs\n\
         cp /etc/elasticsearch/certs/http_ca.crt /etc/logstash/certs/\n\
         chown -R logstash:logstash /etc/logstash/certs",
    )
}

/// Store the elastic password in the Logstash keystore as `ES_PWD`
pub fn logstash_keystore(elastic_password: &str) -> String {
    script(&format!(
        r#"
{}
if [ ! -f /etc/logstash/logstash.keystore ]; then
  printf 'y\n' | /usr/share/logstash/bin/logstash-keystore create --path.settings /etc/logstash
fi
/usr/share/logstash/bin/logstash-keystore remove ES_PWD --path.settings /etc/logstash || true
printf '%s' "${{ES_PWD_VALUE}}" | \
  /usr/share/logstash/bin/logstash-keystore add ES_PWD --path.settings /etc/logstash --stdin
chown logstash:logstash /etc/logstash/logstash.keystore
"#,
        secret_variable("ES_PWD_VALUE", elastic_password)
    ))
}

pub fn service_enable(service: &str) -> String {
    script(&format!(
        "systemctl daemon-reload\nsystemctl enable {0}\nsystemctl restart {0}",
        service
    ))
}

/// Poll `systemctl is-active` every 5 seconds for at most `wait_seconds`
pub fn wait_for_service(service: &str, wait_seconds: u64) -> String {
    let iterations = (wait_seconds / 5).max(1);
    script(&format!(
        r#"
i=0
while [ $i -lt {iterations} ]; do
  if systemctl is-active --quiet {service}; then
    exit 0
  fi
  sleep 5
  i=$((i + 1))
done
systemctl status {service} --no-pager
exit 1
"#,
        iterations = iterations,
        service = service
    ))
}

/// Reset the `elastic` superuser password; prints `New value: <password>`
pub fn reset_elastic_password() -> String {
    script(&format!(
        "{}/bin/elasticsearch-reset-password -u elastic --batch",
        ES_HOME
    ))
}

/// Recreate the named Kibana service token; prints `SERVICE_TOKEN ... = <token>`
pub fn create_kibana_service_token(token_name: &str) -> String {
    script(&format!(
        r#"
export ES_PATH_CONF=/etc/elasticsearch
{home}/bin/elasticsearch-service-tokens delete elastic/kibana {name} || true
{home}/bin/elasticsearch-service-tokens create elastic/kibana {name}
chown root:elasticsearch /etc/elasticsearch/service_tokens
chmod 660 /etc/elasticsearch/service_tokens
"#,
        home = ES_HOME,
        name = token_name
    ))
}

pub fn elasticsearch_test(elastic_password: &str, http_port: u16) -> String {
    script(&format!(
        r#"
{}
curl -fsS --cacert /etc/elasticsearch/certs/http_ca.crt \
  -u "elastic:${{ES_PWD_VALUE}}" https://127.0.0.1:{}
"#,
        secret_variable("ES_PWD_VALUE", elastic_password),
        http_port
    ))
}

pub fn kibana_test(kibana_port: u16) -> String {
    script(&format!(
        r#"
i=0
while [ $i -lt 30 ]; do
  if curl -fsI http://127.0.0.1:{port} >/dev/null; then
    exit 0
  fi
  sleep 5
  i=$((i + 1))
done
curl -I http://127.0.0.1:{port}
exit 1
"#,
        port = kibana_port
    ))
}

pub fn logstash_test() -> String {
    script("/usr/share/logstash/bin/logstash --path.settings /etc/logstash -t")
}
