// file: src/error.rs
// version: 2.2.0
// guid: 57b83a63-07b6-4534-aa6c-51e8797254e0

use std::fmt;
use thiserror::Error;

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Why an SSH connection could not be established
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionFailure {
    /// The server rejected the supplied credentials
    AuthenticationFailed,
    /// No route, connection refused or name resolution failure
    HostUnreachable,
    /// TCP connect or handshake did not finish within the timeout
    TimedOut,
    /// Any other SSH protocol level failure
    Protocol,
}

impl fmt::Display for ConnectionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConnectionFailure::AuthenticationFailed => "authentication failed",
            ConnectionFailure::HostUnreachable => "host unreachable",
            ConnectionFailure::TimedOut => "connection timed out",
            ConnectionFailure::Protocol => "SSH protocol error",
        };
        f.write_str(text)
    }
}

/// Error types for cluster provisioning
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Connection error [{node}]: {kind}: {detail}")]
    ConnectionError {
        node: String,
        kind: ConnectionFailure,
        detail: String,
    },

    #[error("[{node}] {step} failed: {message}")]
    CommandError {
        node: String,
        step: String,
        message: String,
    },

    /// Carries no command text, scripts may embed secrets
    #[error("Command timed out on {node} after {timeout_secs}s")]
    CommandTimeout { node: String, timeout_secs: u64 },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation failed: {}", .0.join("; "))]
    ValidationError(Vec<String>),

    #[error("Unsupported environment: {0}")]
    UnsupportedEnvironment(String),

    #[error("Insufficient privileges: {0}")]
    PrivilegeError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Interrupted by user")]
    Interrupted,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ProvisionError {
    /// Create a new connection error
    pub fn connection(
        node: impl Into<String>,
        kind: ConnectionFailure,
        detail: impl Into<String>,
    ) -> Self {
        Self::ConnectionError {
            node: node.into(),
            kind,
            detail: detail.into(),
        }
    }

    /// Create a new command error for a failed step
    pub fn command(
        node: impl Into<String>,
        step: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::CommandError {
            node: node.into(),
            step: step.into(),
            message: message.into(),
        }
    }

    /// Create a new parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a new unsupported environment error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedEnvironment(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Field-level messages when this is a validation failure
    pub fn validation_errors(&self) -> Option<&[String]> {
        match self {
            Self::ValidationError(errors) => Some(errors),
            _ => None,
        }
    }
}
