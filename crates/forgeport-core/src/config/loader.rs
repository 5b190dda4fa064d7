//! Hierarchical configuration loader with precedence
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Embedded defaults (built into binary)
//! 2. User config (~/.forgeport/pipeline.yaml) or an explicit path
//! 3. Environment variables (FORGEPORT_* prefix)
//! 4. CLI flags (handled by caller)

use super::pipeline::PipelineConfig;
use crate::error::{Error, Result};
use crate::types::PlatformTarget;
use camino::{Utf8Path, Utf8PathBuf};
use rust_embed::RustEmbed;
use serde_yaml_ng::Value;
use std::env;
use std::fs;
use tracing::debug;

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../embedded/config/"]
#[prefix = ""]
struct EmbeddedConfigs;

const DEFAULTS_FILE: &str = "pipeline-defaults.yaml";
const USER_CONFIG_FILE: &str = "pipeline.yaml";

/// Configuration hierarchy loader
pub struct ConfigLoader {
    /// Base directory for configuration files
    config_dir: Utf8PathBuf,
}

impl ConfigLoader {
    /// Create a loader rooted at ~/.forgeport
    pub fn new() -> Result<Self> {
        let config_dir = Self::default_config_dir()?;
        Ok(Self { config_dir })
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self { config_dir }
    }

    fn default_config_dir() -> Result<Utf8PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::invalid_config("Could not determine home directory"))?;
        let home = Utf8PathBuf::from_path_buf(home)
            .map_err(|_| Error::invalid_config("Home directory is not valid UTF-8"))?;
        Ok(home.join(".forgeport"))
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Load the pipeline configuration.
    ///
    /// `explicit` replaces the user config file when given and must exist.
    pub fn load(&self, explicit: Option<&Utf8Path>) -> Result<PipelineConfig> {
        let mut merged = Self::load_embedded_value(DEFAULTS_FILE)?;

        let file_path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::config_not_found(path.as_str()));
                }
                Some(path.to_path_buf())
            }
            None => {
                let path = self.config_dir.join(USER_CONFIG_FILE);
                path.exists().then_some(path)
            }
        };

        if let Some(path) = file_path {
            debug!("Loading pipeline config overlay from {}", path);
            let overlay = Self::load_yaml_value(&path)?;
            merge_values(&mut merged, overlay);
        }

        let config: PipelineConfig = serde_yaml_ng::from_value(merged)
            .map_err(|e| Error::invalid_config(format!("Failed to parse pipeline config: {}", e)))?;

        Self::apply_env_overrides(config)
    }

    fn load_embedded_value(filename: &str) -> Result<Value> {
        let embedded_file = EmbeddedConfigs::get(filename).ok_or_else(|| {
            Error::config_not_found(format!("Embedded config not found: {}", filename))
        })?;

        let content = std::str::from_utf8(&embedded_file.data).map_err(|_| {
            Error::invalid_config(format!("Invalid UTF-8 in embedded config: {}", filename))
        })?;

        serde_yaml_ng::from_str(content).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to parse embedded config {}: {}",
                filename, e
            ))
        })
    }

    fn load_yaml_value(path: &Utf8Path) -> Result<Value> {
        let content = fs::read_to_string(path)?;
        let value: Value = serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))?;
        match value {
            Value::Mapping(_) | Value::Null => Ok(value),
            _ => Err(Error::invalid_config(format!(
                "{} must contain a YAML mapping",
                path
            ))),
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: PipelineConfig) -> Result<PipelineConfig> {
        if let Ok(val) = env::var("FORGEPORT_CERT_PATH") {
            config.cert_path = non_empty(val).map(Utf8PathBuf::from);
        }

        if let Ok(val) = env::var("FORGEPORT_DOWNLOAD_ROOT") {
            if val.trim().is_empty() {
                return Err(Error::invalid_config(
                    "FORGEPORT_DOWNLOAD_ROOT must not be empty",
                ));
            }
            config.download_root = Utf8PathBuf::from(val);
        }

        if let Ok(val) = env::var("FORGEPORT_OVERWRITE_VERSION") {
            config.overwrite_version = non_empty(val);
        }

        if let Ok(val) = env::var("FORGEPORT_SUPPORTED_PLATFORMS") {
            config.supported_platforms = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<PlatformTarget>())
                .collect::<Result<Vec<_>>>()
                .map_err(|e| {
                    Error::invalid_config(format!(
                        "FORGEPORT_SUPPORTED_PLATFORMS must be a comma list of os_arch: {}",
                        e
                    ))
                })?;
        }

        if let Ok(val) = env::var("FORGEPORT_STORAGE_TIMEOUT_SECS") {
            config.storage_timeout_secs = val.parse().map_err(|_| {
                Error::invalid_config("FORGEPORT_STORAGE_TIMEOUT_SECS must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("FORGEPORT_REGISTRY_PATH") {
            config.registry_path = non_empty(val).map(Utf8PathBuf::from);
        }

        if !(1..=9).contains(&config.compression_level) {
            return Err(Error::invalid_config(format!(
                "compression-level must be 1-9, got {}",
                config.compression_level
            )));
        }

        Ok(config)
    }
}

fn non_empty(val: String) -> Option<String> {
    if val.trim().is_empty() {
        None
    } else {
        Some(val)
    }
}

/// Deep-merge `overlay` into `base`; mappings merge key by key, everything else replaces
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (_, Value::Null) => {}
        (base, overlay) => *base = overlay,
    }
}
