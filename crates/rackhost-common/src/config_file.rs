//! Configuration file structures for rackhost.
//!
//! This module defines structures for TOML configuration files:
//! - [`ConfigFile`]: Top-level configuration file structure
//! - [`ContextConfig`]: Host context settings (init parameters)

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::RuntimeConfig;

/// Top-level configuration file structure.
///
/// # Example
///
/// ```toml
/// [runtime.engine]
/// pooling_allocator = false
///
/// [runtime.execution]
/// max_fuel = 10_000_000
///
/// [runtime.factory]
/// descriptor_parameter = "rackup"
///
/// [context]
/// name = "hello"
///
/// [context.init_params]
/// rackup = "./apps/hello.wat"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Runtime configuration (engine, execution and factory settings).
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Host context configuration.
    #[serde(default)]
    pub context: ContextConfig,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigFileError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        toml::from_str(content).map_err(|e| ConfigFileError::Parse {
            message: e.to_string(),
        })
    }
}

/// Host context configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContextConfig {
    /// Name of the deployment, attached to every context log line.
    #[serde(default = "defaults::context_name")]
    pub name: String,

    /// Init parameters exposed through the host context.
    #[serde(default)]
    pub init_params: HashMap<String, String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            name: defaults::context_name(),
            init_params: HashMap::new(),
        }
    }
}

/// Configuration file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("Failed to parse config file: {message}")]
    Parse { message: String },
}

mod defaults {
    pub fn context_name() -> String {
        "default".to_string()
    }
}
