// file: src/config/loader.rs
// version: 1.1.0
// guid: d4e5f6g7-h8i9-0123-4567-890123defghi

//! Configuration file loading and environment variable substitution

use super::{ClusterConfig, InstallOptions};
use crate::error::ProvisionError;
use crate::Result;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Configuration loader with environment variable substitution
pub struct ConfigLoader {
    env_vars: HashMap<String, String>,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self {
            env_vars: std::env::vars().collect(),
        }
    }

    /// Load and validate a cluster configuration from a YAML file
    pub fn load_cluster_config<P: AsRef<Path>>(&self, path: P) -> Result<ClusterConfig> {
        let content = self.read(path.as_ref(), "cluster config")?;
        self.parse_cluster_config(&content)
    }

    /// Parse and validate a cluster configuration document
    pub fn parse_cluster_config(&self, content: &str) -> Result<ClusterConfig> {
        let expanded = self.expand_env_vars(content)?;
        let config: ClusterConfig = serde_yaml::from_str(&expanded)?;

        let errors = config.validate();
        if !errors.is_empty() {
            return Err(ProvisionError::ValidationError(errors));
        }

        debug!(
            "Loaded cluster config: {} masters, {} workers",
            config.master_nodes.len(),
            config.worker_nodes.len()
        );
        Ok(config)
    }

    /// Load and validate Elastic Stack options from a YAML file
    pub fn load_install_options<P: AsRef<Path>>(&self, path: P) -> Result<InstallOptions> {
        let content = self.read(path.as_ref(), "install options")?;
        let expanded = self.expand_env_vars(&content)?;
        let options: InstallOptions = serde_yaml::from_str(&expanded)?;

        let errors = options.validate();
        if !errors.is_empty() {
            return Err(ProvisionError::ValidationError(errors));
        }

        Ok(options)
    }

    fn read(&self, path: &Path, what: &str) -> Result<String> {
        if !path.is_file() {
            return Err(ProvisionError::config(format!(
                "{} file not found: {}",
                what,
                path.display()
            )));
        }
        fs::read_to_string(path).map_err(|e| {
            ProvisionError::config(format!(
                "Failed to read {} file {}: {}",
                what,
                path.display(),
                e
            ))
        })
    }

    /// Expand environment variables in configuration content
    fn expand_env_vars(&self, content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|e| ProvisionError::config(format!("Invalid regex pattern: {}", e)))?;

        let mut missing_vars = Vec::new();
        let result = re.replace_all(content, |caps: &regex::Captures<'_>| {
            let var_name = &caps[1];
            match self.env_vars.get(var_name) {
                Some(value) => value.clone(),
                None => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    caps[0].to_string()
                }
            }
        });

        if !missing_vars.is_empty() {
            return Err(ProvisionError::config(format!(
                "Missing environment variables: {}",
                missing_vars.join(", ")
            )));
        }

        Ok(result.into_owned())
    }

    /// Set environment variable for substitution
    pub fn set_env_var(&mut self, key: String, value: String) {
        self.env_vars.insert(key, value);
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
