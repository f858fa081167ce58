// file: src/network/mock.rs
// version: 1.1.0
// guid: 63fc3052-74ca-4842-ac36-086cd96d4423

//! Scripted connector for exercising installers without real hosts

use super::executor::{CommandOutput, Connector, RemoteExecutor};
use crate::config::NodeConnection;
use crate::error::{ConnectionFailure, ProvisionError};
use crate::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DEBIAN_12_OS_RELEASE: &str = "PRETTY_NAME=\"Debian GNU/Linux 12 (bookworm)\"\nNAME=\"Debian GNU/Linux\"\nVERSION_ID=\"12\"\nID=debian\n";
pub const ROCKY_9_OS_RELEASE: &str = "NAME=\"Rocky Linux\"\nVERSION=\"9.3 (Blue Onyx)\"\nID=\"rocky\"\nID_LIKE=\"rhel centos fedora\"\nVERSION_ID=\"9.3\"\n";
pub const PHOTON_5_OS_RELEASE: &str = "NAME=\"VMware Photon OS\"\nVERSION=\"5.0\"\nID=photon\nVERSION_ID=5.0\n";

#[derive(Debug, Clone)]
struct Rule {
    host: Option<String>,
    needle: String,
    output: CommandOutput,
}

#[derive(Debug, Default)]
struct MockState {
    rules: Vec<Rule>,
    calls: Vec<(String, String)>,
    connect_failures: Vec<(String, ConnectionFailure)>,
    timeouts: Vec<(Option<String>, String)>,
    connections: usize,
    disconnects: usize,
}

/// Connector returning canned outputs and recording every command
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    /// Unmatched commands succeed with empty output
    pub fn new() -> Self {
        Self::default()
    }

    /// Every host reports root on Debian 12
    pub fn root_debian() -> Self {
        let mock = Self::new();
        mock.respond("id -u", CommandOutput::new("0\n", "", 0));
        mock.respond("/etc/os-release", CommandOutput::new(DEBIAN_12_OS_RELEASE, "", 0));
        mock
    }

    /// Respond to any command containing `needle`; later rules win
    pub fn respond(&self, needle: &str, output: CommandOutput) {
        self.push_rule(None, needle, output);
    }

    /// Respond on one host only
    pub fn respond_on(&self, host: &str, needle: &str, output: CommandOutput) {
        self.push_rule(Some(host.to_string()), needle, output);
    }

    pub fn fail_connect(&self, host: &str, kind: ConnectionFailure) {
        self.lock().connect_failures.push((host.to_string(), kind));
    }

    /// Commands containing `needle` time out instead of returning
    pub fn time_out(&self, needle: &str) {
        self.lock().timeouts.push((None, needle.to_string()));
    }

    pub fn time_out_on(&self, host: &str, needle: &str) {
        self.lock()
            .timeouts
            .push((Some(host.to_string()), needle.to_string()));
    }

    fn push_rule(&self, host: Option<String>, needle: &str, output: CommandOutput) {
        self.lock().rules.push(Rule {
            host,
            needle: needle.to_string(),
            output,
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }

    /// Every executed command as (host, command)
    pub fn calls(&self) -> Vec<(String, String)> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn commands_for(&self, host: &str) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|(h, _)| h == host)
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// Number of executed commands containing `needle`
    pub fn count_matching(&self, needle: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|(_, c)| c.contains(needle))
            .count()
    }

    pub fn connections(&self) -> usize {
        self.lock().connections
    }

    pub fn disconnects(&self) -> usize {
        self.lock().disconnects
    }
}

#[async_trait::async_trait]
impl Connector for MockConnector {
    async fn connect(&self, node: &NodeConnection) -> Result<Box<dyn RemoteExecutor>> {
        let mut state = self.lock();
        if let Some((_, kind)) = state
            .connect_failures
            .iter()
            .find(|(host, _)| host == &node.host)
        {
            return Err(ProvisionError::connection(
                node.to_string(),
                *kind,
                "mock connection failure",
            ));
        }
        state.connections += 1;
        Ok(Box::new(MockSession {
            host: node.host.clone(),
            label: node.to_string(),
            state: Arc::clone(&self.state),
            open: true,
        }))
    }
}

struct MockSession {
    host: String,
    label: String,
    state: Arc<Mutex<MockState>>,
    open: bool,
}

#[async_trait::async_trait]
impl RemoteExecutor for MockSession {
    async fn execute(&mut self, command: &str, timeout: Duration) -> Result<CommandOutput> {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.calls.push((self.host.clone(), command.to_string()));
        let host_matches = |host: &Option<String>| host.as_deref().map_or(true, |h| h == self.host);
        if state
            .timeouts
            .iter()
            .any(|(host, needle)| host_matches(host) && command.contains(needle.as_str()))
        {
            return Err(ProvisionError::CommandTimeout {
                node: self.label.clone(),
                timeout_secs: timeout.as_secs(),
            });
        }
        let output = state
            .rules
            .iter()
            .rev()
            .find(|rule| {
                host_matches(&rule.host) && command.contains(&rule.needle)
            })
            .map(|rule| rule.output.clone())
            .unwrap_or_default();
        Ok(output)
    }

    fn disconnect(&mut self) {
        if self.open {
            self.open = false;
            self.state.lock().expect("mock state poisoned").disconnects += 1;
        }
    }
}
