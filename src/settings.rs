//! Operator settings
//!
//! Settings live in `<config dir>/james/settings.json`. A missing file means
//! built-in defaults.

use crate::error::{JamesError, Result};
use crate::servicespec::spec::{Defaults, DEFAULT_NETWORK_NAME};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Operator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Overlay network services are attached to unless host-networked
    pub docker_network_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            docker_network_name: DEFAULT_NETWORK_NAME.to_string(),
        }
    }
}

impl Settings {
    /// Default settings path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("james").join(SETTINGS_FILE))
    }

    /// Load settings from the default path
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load settings from a file. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        settings.validate()?;

        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Override the network name
    pub fn with_network(mut self, network: Option<String>) -> Result<Self> {
        if let Some(network) = network {
            self.docker_network_name = network;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.docker_network_name.trim().is_empty() {
            return Err(JamesError::InvalidConfig(
                "docker_network_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Compiler defaults derived from these settings
    pub fn defaults(&self) -> Defaults {
        Defaults {
            docker_network_name: self.docker_network_name.clone(),
        }
    }
}
