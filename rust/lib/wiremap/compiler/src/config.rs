//! Compiler configuration.
//!
//! Read from an optional `wiremap.toml`; every key has a default.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Names used for the generated transport items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Module holding the wire message types.
    #[serde(rename = "wire-package")]
    pub wire_package: String,

    /// Name of the generated server struct.
    #[serde(rename = "server-struct")]
    pub server_struct: String,

    /// Name of the generated client struct.
    #[serde(rename = "client-struct")]
    pub client_struct: String,

    /// Constructor of the server struct.
    #[serde(rename = "server-init")]
    pub server_init: String,

    /// Constructor of the client struct.
    #[serde(rename = "client-init")]
    pub client_init: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            wire_package: "pb".to_string(),
            server_struct: "Server".to_string(),
            client_struct: "Client".to_string(),
            server_init: "new".to_string(),
            client_init: "new_client".to_string(),
        }
    }
}

impl CompilerConfig {
    /// Load config from disk, or return the defaults if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}
