//! CLI command implementations

pub mod build;
pub mod config;
pub mod describe;
pub mod import;
pub mod signature;
pub mod templates;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use forgeport_core::{ConfigLoader, LocalRegistry, LocalStorage, PipelineConfig};

use crate::cli::{GlobalArgs, PublishOverrides};

const REGISTRY_FILE: &str = "registry.json";

/// Resolve the pipeline configuration; CLI flags win over every other layer
pub(crate) fn load_config(globals: &GlobalArgs) -> Result<PipelineConfig> {
    let loader = ConfigLoader::new().context("Failed to locate the forgeport config directory")?;
    let mut config = loader
        .load(globals.config.as_deref())
        .context("Failed to load pipeline configuration")?;

    if let Some(root) = &globals.download_root {
        config.download_root = root.clone();
    }
    if let Some(path) = &globals.registry_path {
        config.registry_path = Some(path.clone());
    }
    Ok(config)
}

pub(crate) fn apply_overrides(config: &mut PipelineConfig, overrides: &PublishOverrides) {
    if let Some(cert_path) = &overrides.cert_path {
        config.cert_path = Some(cert_path.clone());
    }
    if let Some(version) = &overrides.overwrite_version {
        config.overwrite_version = Some(version.clone());
    }
}

/// Registry file, defaulting to `registry.json` under the download root
pub(crate) fn registry_path(config: &PipelineConfig) -> Utf8PathBuf {
    config
        .registry_path
        .clone()
        .unwrap_or_else(|| config.download_root.join(REGISTRY_FILE))
}

pub(crate) fn open_registry(config: &PipelineConfig) -> Result<LocalRegistry> {
    let path = registry_path(config);
    LocalRegistry::open(&path).with_context(|| format!("Failed to open registry {}", path))
}

pub(crate) fn open_storage(config: &PipelineConfig) -> LocalStorage {
    LocalStorage::new(config.download_root.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_path_defaults_under_download_root() {
        let config = PipelineConfig {
            download_root: Utf8PathBuf::from("/srv/download"),
            ..Default::default()
        };
        assert_eq!(registry_path(&config), "/srv/download/registry.json");

        let config = PipelineConfig {
            registry_path: Some(Utf8PathBuf::from("/srv/registry.json")),
            ..config
        };
        assert_eq!(registry_path(&config), "/srv/registry.json");
    }

    #[test]
    fn test_publish_overrides_replace_config() {
        let mut config = PipelineConfig::default();
        apply_overrides(
            &mut config,
            &PublishOverrides {
                cert_path: Some(Utf8PathBuf::from("/etc/gse/certs")),
                overwrite_version: Some("stable".to_string()),
            },
        );
        assert_eq!(config.cert_path.as_deref().map(|p| p.as_str()), Some("/etc/gse/certs"));
        assert_eq!(config.overwrite_version.as_deref(), Some("stable"));

        apply_overrides(&mut config, &PublishOverrides::default());
        assert_eq!(config.overwrite_version.as_deref(), Some("stable"));
    }
}
