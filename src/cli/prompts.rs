// file: src/cli/prompts.rs
// version: 1.0.1
// guid: 1c9e5b47-8d20-4f3a-a6b1-e29c4d7f0a83

//! Interactive collection of connection details

use crate::config::cluster::DEFAULT_POD_NETWORK_CIDR;
use crate::config::node::DEFAULT_SSH_PORT;
use crate::config::{ClusterConfig, NodeConnection};
use crate::error::ProvisionError;
use crate::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::io::{self, BufRead, IsTerminal, Write};

const DEFAULT_MASTER_COUNT: usize = 3;
const DEFAULT_WORKER_COUNT: usize = 2;

/// Line-based prompts over any reader/writer pair.
///
/// Passwords are read with echo disabled when stdin is a terminal.
pub struct Prompter<R, W> {
    input: R,
    output: W,
    hide_passwords: bool,
}

impl Prompter<io::StdinLock<'static>, io::Stderr> {
    pub fn stdio() -> Self {
        Self {
            input: io::stdin().lock(),
            output: io::stderr(),
            hide_passwords: io::stdin().is_terminal(),
        }
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            hide_passwords: false,
        }
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(ProvisionError::Interrupted);
        }
        Ok(line.trim().to_string())
    }

    /// Ask for a value; an empty answer selects `default`
    pub fn ask(&mut self, label: &str, default: Option<&str>) -> Result<String> {
        match default {
            Some(d) if !d.is_empty() => write!(self.output, "{} [{}]: ", label, d)?,
            _ => write!(self.output, "{}: ", label)?,
        }
        self.output.flush()?;

        let answer = self.read_line()?;
        if answer.is_empty() {
            Ok(default.unwrap_or_default().to_string())
        } else {
            Ok(answer)
        }
    }

    /// Ask until a non-empty answer is given
    pub fn ask_required(&mut self, label: &str) -> Result<String> {
        loop {
            let answer = self.ask(label, None)?;
            if !answer.is_empty() {
                return Ok(answer);
            }
            writeln!(self.output, "  a value is required")?;
        }
    }

    /// Ask for a number, repeating on unparsable input
    pub fn ask_number<T>(&mut self, label: &str, default: T) -> Result<T>
    where
        T: std::str::FromStr + ToString,
    {
        let default_text = default.to_string();
        loop {
            let answer = self.ask(label, Some(&default_text))?;
            match answer.parse() {
                Ok(value) => return Ok(value),
                Err(_) => writeln!(self.output, "  '{}' is not a valid number", answer)?,
            }
        }
    }

    pub fn ask_password(&mut self, label: &str) -> Result<String> {
        write!(self.output, "{}: ", label)?;
        self.output.flush()?;
        if !self.hide_passwords {
            return self.read_line();
        }

        terminal::enable_raw_mode()?;
        let password = read_hidden();
        terminal::disable_raw_mode()?;
        writeln!(self.output)?;
        password
    }

    /// Yes/no question defaulting to no
    pub fn confirm(&mut self, question: &str) -> Result<bool> {
        let answer = self.ask(&format!("{} [y/N]", question), None)?;
        Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
    }

    pub fn collect_node(&mut self, title: &str) -> Result<NodeConnection> {
        writeln!(self.output, "\n--- {} ---", title)?;
        let host = self.ask_required("  HostAddr")?;
        let port = self.ask_number("  HostPort", DEFAULT_SSH_PORT)?;
        let user = self.ask_required("  HostUser")?;
        let password = self.ask_password("  HostPass")?;
        Ok(NodeConnection::new(host, port, user, password))
    }

    /// Collect a full cluster topology and validate it
    pub fn collect_cluster(&mut self) -> Result<ClusterConfig> {
        writeln!(self.output, "\n=== Master nodes ===")?;
        let master_count = self.ask_number("Number of master nodes", DEFAULT_MASTER_COUNT)?;
        let mut masters = Vec::new();
        for i in 1..=master_count {
            masters.push(self.collect_node(&format!("Master {}", i))?);
        }

        writeln!(self.output, "\n=== Worker nodes ===")?;
        let worker_count = self.ask_number("Number of worker nodes", DEFAULT_WORKER_COUNT)?;
        let mut workers = Vec::new();
        for i in 1..=worker_count {
            workers.push(self.collect_node(&format!("Worker {}", i))?);
        }

        let mut config = ClusterConfig::new(masters, workers);

        writeln!(self.output, "\n=== Network ===")?;
        config.load_balancer_ip = optional(self.ask(
            "Load balancer IP (optional, forwards 6443 to the masters)",
            None,
        )?);
        config.pod_network_cidr = self.ask("Pod network CIDR", Some(DEFAULT_POD_NETWORK_CIDR))?;
        config.metallb_ip_range = optional(self.ask(
            "MetalLB IP range (optional, e.g. 192.168.1.200-192.168.1.250)",
            None,
        )?);

        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ProvisionError::ValidationError(errors))
        }
    }
}

fn optional(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn read_hidden() -> Result<String> {
    let mut password = String::new();
    loop {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Release {
                continue;
            }
            match key.code {
                KeyCode::Enter => return Ok(password),
                KeyCode::Backspace => {
                    password.pop();
                }
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Err(ProvisionError::Interrupted)
                }
                KeyCode::Char(c) => password.push(c),
                _ => {}
            }
        }
    }
}
