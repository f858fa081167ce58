// file: src/config/node.rs
// version: 1.0.0
// guid: 69e55cfe-5b5b-4072-bc10-a0681c654d6a

//! SSH connection details for a single target host

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default SSH port used when a node entry omits `port`
pub const DEFAULT_SSH_PORT: u32 = 22;

fn default_port() -> u32 {
    DEFAULT_SSH_PORT
}

/// Connection information for one target host
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConnection {
    /// Hostname or IP address
    pub host: String,
    /// SSH port
    #[serde(default = "default_port")]
    pub port: u32,
    /// Login user
    pub user: String,
    /// Login password
    pub password: String,
}

impl NodeConnection {
    pub fn new(
        host: impl Into<String>,
        port: u32,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            password: password.into(),
        }
    }

    /// Validate the connection fields, returning one message per problem
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.host.trim().is_empty() {
            errors.push("host is required".to_string());
        }
        if self.user.trim().is_empty() {
            errors.push("user is required".to_string());
        }
        if self.password.is_empty() {
            errors.push("password is required".to_string());
        }
        if !(1..=65535).contains(&self.port) {
            errors.push(format!(
                "port must be between 1 and 65535, got {}",
                self.port
            ));
        }
        errors
    }

    /// Socket address string used for the TCP connection
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for NodeConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)
    }
}

// Keep the password out of debug output.
impl fmt::Debug for NodeConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeConnection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"********")
            .finish()
    }
}
