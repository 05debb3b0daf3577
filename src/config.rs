// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON in `$XDG_CONFIG_HOME/qr-reader/config.json`. Every field is
//! optional in the file; missing fields take their defaults.

use crate::backends::camera::LensFacing;
use crate::constants::{APP_ID, decoder};
use crate::errors::{AppError, AppResult};
use crate::permission::PermissionBackend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which lens to capture from
    pub lens_facing: LensFacing,
    /// Camera name to prefer over lens selection (substring match)
    pub device: Option<String>,
    /// Longest edge fed to the QR decoder; 0 keeps full resolution
    pub max_decode_dimension: u32,
    /// How camera access is requested
    pub permission: PermissionBackend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lens_facing: LensFacing::Front,
            device: None,
            max_decode_dimension: decoder::DEFAULT_MAX_DIMENSION,
            permission: PermissionBackend::Portal,
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_ID).join("config.json"))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> AppResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config directory, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config: Config = serde_json::from_str(&contents).map_err(|e| {
            AppError::Config(format!("{}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Write the configuration, creating parent directories
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
