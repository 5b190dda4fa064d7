//! Pipeline configuration types
//!
//! One explicit struct replaces scattered global lookups: certificate
//! source, download root, version overrides, platform allow-list and the
//! on-host path conventions all travel together into the pipeline.

use crate::types::{ArtifactKind, CpuArch, Platform, PlatformTarget};
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Complete pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PipelineConfig {
    /// Directory holding TLS material injected into agent/proxy packages
    #[serde(default)]
    pub cert_path: Option<Utf8PathBuf>,

    /// Root of the local storage backend
    #[serde(default = "default_download_root")]
    pub download_root: Utf8PathBuf,

    /// Additional version alias under which agent/proxy packages are published
    #[serde(default)]
    pub overwrite_version: Option<String>,

    /// Allowed `os_arch` pairs; empty means every pair
    #[serde(default)]
    pub supported_platforms: Vec<PlatformTarget>,

    /// Certificate files copied into each package's `cert/` directory
    #[serde(default = "default_cert_filenames")]
    pub cert_filenames: Vec<String>,

    /// Project name of the agent package proxies are seeded from
    #[serde(default = "default_agent_project")]
    pub agent_project: String,

    /// Server binaries overlaid onto the proxy's `bin/`
    #[serde(default = "default_proxy_server_binaries")]
    pub proxy_server_binaries: Vec<String>,

    #[serde(default)]
    pub control_script: ControlScriptConfig,

    #[serde(default)]
    pub install_paths: InstallPathsConfig,

    /// Timeout applied to each storage call
    #[serde(default = "default_storage_timeout")]
    pub storage_timeout_secs: u64,

    /// How many archive-within-archive levels are expanded
    #[serde(default = "default_nested_archive_depth")]
    pub nested_archive_depth: usize,

    /// Gzip level for published tarballs (1-9)
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,

    /// JSON file backing the local registry; in-memory when unset
    #[serde(default)]
    pub registry_path: Option<Utf8PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cert_path: None,
            download_root: default_download_root(),
            overwrite_version: None,
            supported_platforms: Vec::new(),
            cert_filenames: default_cert_filenames(),
            agent_project: default_agent_project(),
            proxy_server_binaries: default_proxy_server_binaries(),
            control_script: ControlScriptConfig::default(),
            install_paths: InstallPathsConfig::default(),
            storage_timeout_secs: default_storage_timeout(),
            nested_archive_depth: default_nested_archive_depth(),
            compression_level: default_compression_level(),
            registry_path: None,
        }
    }
}

impl PipelineConfig {
    /// Whether units for this pair should be built
    pub fn supports(&self, platform: Platform, arch: CpuArch) -> bool {
        self.supported_platforms.is_empty()
            || self
                .supported_platforms
                .contains(&PlatformTarget::new(platform, arch))
    }

    pub fn install_paths_for(&self, platform: Platform) -> &InstallPaths {
        if platform.is_windows() {
            &self.install_paths.windows
        } else {
            &self.install_paths.unix
        }
    }

    /// File name of the launcher script for a platform
    pub fn control_script_for(&self, platform: Platform) -> &str {
        if platform.is_windows() {
            &self.control_script.windows
        } else {
            &self.control_script.unix
        }
    }

    /// Storage key of the launcher script for a package kind and platform
    pub fn control_script_key(&self, kind: ArtifactKind, platform: Platform) -> String {
        format!(
            "{}/{}/{}/{}",
            self.control_script.storage_dir.trim_end_matches('/'),
            kind.layout_token(),
            platform,
            self.control_script_for(platform)
        )
    }

    /// Boot persistence the unix launcher script is rendered with for `project`
    pub fn auto_type_for(&self, project: &str) -> LinuxAutoType {
        self.control_script
            .auto_type_overrides
            .get(project)
            .copied()
            .unwrap_or(self.control_script.auto_type)
    }
}

/// How the unix launcher script registers itself to start on boot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinuxAutoType {
    #[default]
    Rclocal,
    Crontab,
}

impl LinuxAutoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinuxAutoType::Rclocal => "rclocal",
            LinuxAutoType::Crontab => "crontab",
        }
    }
}

impl fmt::Display for LinuxAutoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Launcher script naming
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ControlScriptConfig {
    #[serde(default = "default_unix_script")]
    pub unix: String,

    #[serde(default = "default_windows_script")]
    pub windows: String,

    /// Storage prefix; scripts live at `{storage-dir}/{agent|proxy}/{os}/{file}`
    #[serde(default = "default_script_dir")]
    pub storage_dir: String,

    /// Value substituted for `{{ AUTO_TYPE }}` in the unix script
    #[serde(default)]
    pub auto_type: LinuxAutoType,

    /// Per-project auto type, keyed by package name
    #[serde(default)]
    pub auto_type_overrides: BTreeMap<String, LinuxAutoType>,
}

impl Default for ControlScriptConfig {
    fn default() -> Self {
        Self {
            unix: default_unix_script(),
            windows: default_windows_script(),
            storage_dir: default_script_dir(),
            auto_type: LinuxAutoType::default(),
            auto_type_overrides: BTreeMap::new(),
        }
    }
}

/// Per-platform-family install conventions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InstallPathsConfig {
    #[serde(default = "InstallPaths::unix_defaults")]
    pub unix: InstallPaths,

    #[serde(default = "InstallPaths::windows_defaults")]
    pub windows: InstallPaths,
}

impl Default for InstallPathsConfig {
    fn default() -> Self {
        Self {
            unix: InstallPaths::unix_defaults(),
            windows: InstallPaths::windows_defaults(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InstallPaths {
    pub home: String,
    pub log_dir: String,
    pub run_dir: String,
    pub data_dir: String,
}

impl InstallPaths {
    pub fn unix_defaults() -> Self {
        Self {
            home: "/usr/local/gse".to_string(),
            log_dir: "/var/log/gse".to_string(),
            run_dir: "/var/run/gse".to_string(),
            data_dir: "/var/lib/gse".to_string(),
        }
    }

    pub fn windows_defaults() -> Self {
        Self {
            home: "C:\\gse".to_string(),
            log_dir: "C:\\gse\\logs".to_string(),
            run_dir: "C:\\gse\\logs".to_string(),
            data_dir: "C:\\gse\\data".to_string(),
        }
    }
}

fn default_download_root() -> Utf8PathBuf {
    Utf8PathBuf::from("/var/lib/forgeport/download")
}

fn default_cert_filenames() -> Vec<String> {
    [
        "gseca.crt",
        "gse_server.crt",
        "gse_server.key",
        "gse_agent.crt",
        "gse_agent.key",
        "gse_api_client.crt",
        "gse_api_client.key",
        "cert_encrypt.key",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_agent_project() -> String {
    "gse_agent".to_string()
}

fn default_proxy_server_binaries() -> Vec<String> {
    vec!["gse_data".to_string(), "gse_file".to_string()]
}

fn default_unix_script() -> String {
    "gsectl".to_string()
}

fn default_windows_script() -> String {
    "gsectl.bat".to_string()
}

fn default_script_dir() -> String {
    "control-scripts".to_string()
}

fn default_storage_timeout() -> u64 {
    60
}

fn default_nested_archive_depth() -> usize {
    3
}

fn default_compression_level() -> u32 {
    6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_platform_list_supports_everything() {
        let config = PipelineConfig::default();
        assert!(config.supports(Platform::Aix, CpuArch::PowerPc));
    }

    #[test]
    fn test_platform_allow_list() {
        let config = PipelineConfig {
            supported_platforms: vec![PlatformTarget::new(Platform::Linux, CpuArch::X86_64)],
            ..Default::default()
        };
        assert!(config.supports(Platform::Linux, CpuArch::X86_64));
        assert!(!config.supports(Platform::Linux, CpuArch::Aarch64));
    }

    #[test]
    fn test_control_script_key_per_kind_and_platform() {
        let config = PipelineConfig::default();
        assert_eq!(
            config.control_script_key(ArtifactKind::Agent, Platform::Linux),
            "control-scripts/agent/linux/gsectl"
        );
        assert_eq!(
            config.control_script_key(ArtifactKind::Proxy, Platform::Linux),
            "control-scripts/proxy/linux/gsectl"
        );
        assert_eq!(
            config.control_script_key(ArtifactKind::Agent, Platform::Windows),
            "control-scripts/agent/windows/gsectl.bat"
        );
    }

    #[test]
    fn test_auto_type_override_per_project() {
        let config: PipelineConfig = serde_yaml_ng::from_str(
            "control-script:\n  auto-type-overrides:\n    gse_proxy: crontab\n",
        )
        .unwrap();
        assert_eq!(config.auto_type_for("gse_proxy"), LinuxAutoType::Crontab);
        assert_eq!(config.auto_type_for("gse_agent"), LinuxAutoType::Rclocal);
        assert_eq!(config.control_script.unix, "gsectl");
    }
}
