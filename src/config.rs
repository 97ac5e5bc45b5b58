//! Harness settings, read from a TOML file.
//!
//! Lookup order: `$ITT_CONFIG`, then `<config dir>/itt/config.toml`.
//! A missing or empty file yields the defaults. `ITT_RUNTIME` overrides
//! the runtime named in the file.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub const CONFIG_ENV: &str = "ITT_CONFIG";
pub const RUNTIME_ENV: &str = "ITT_RUNTIME";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRuntimeName {
    #[default]
    Docker,
    Podman,
}

impl FromStr for ContainerRuntimeName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "podman" => Ok(Self::Podman),
            other => bail!("Unknown container runtime '{}'", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub runtime: ContainerRuntimeName,

    /// Ready delay applied by `with_containers` to each container.
    pub ready_delay_ms: u64,

    /// Whether `with_containers` publishes exposed ports on random host ports.
    pub random_ports: bool,

    /// Grace period handed to the runtime's `stop` before it kills.
    pub stop_timeout_secs: u64,

    /// Remove containers after stopping them on close.
    pub remove_on_close: bool,

    /// Prefix of every container name created by the harness.
    pub name_prefix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            runtime: ContainerRuntimeName::Docker,
            ready_delay_ms: 200,
            random_ports: true,
            stop_timeout_secs: 100,
            remove_on_close: true,
            name_prefix: "itt-".to_string(),
        }
    }
}

impl Settings {
    pub fn ready_delay(&self) -> Duration {
        Duration::from_millis(self.ready_delay_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    /// Load settings from the default location, then apply env overrides.
    pub fn load() -> Result<Self> {
        let mut settings = match config_path() {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };

        if let Ok(runtime) = std::env::var(RUNTIME_ENV) {
            if !runtime.trim().is_empty() {
                settings.runtime = runtime.parse()?;
            }
        }

        Ok(settings)
    }

    /// Load settings from `path`. Returns defaults if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings = toml::from_str(&content)?;
        if settings.name_prefix.is_empty() {
            bail!("name_prefix must not be empty in {}", path.display());
        }
        Ok(settings)
    }
}

/// Get the path to the settings file, if one can be determined.
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::config_dir().map(|d| d.join("itt").join("config.toml"))
}
