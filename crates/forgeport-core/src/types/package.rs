//! Persisted package records

use super::platform::{ArtifactKind, Category, CpuArch, Platform};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Natural identity of a published package
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageKey {
    pub project: String,
    pub version: String,
    pub platform: Platform,
    pub arch: CpuArch,
    pub pkg_name: String,
}

impl PackageKey {
    pub fn new(
        project: impl Into<String>,
        version: impl Into<String>,
        platform: Platform,
        arch: CpuArch,
    ) -> Self {
        let project = project.into();
        let version = version.into();
        let pkg_name = package_file_name(&project, &version);
        Self {
            project,
            version,
            platform,
            arch,
            pkg_name,
        }
    }

    /// Deterministic storage key, `{os}/{arch}/{name}-{version}.tgz`
    pub fn storage_key(&self) -> String {
        format!("{}/{}/{}", self.platform, self.arch, self.pkg_name)
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{} ({}/{})",
            self.project, self.version, self.platform, self.arch
        )
    }
}

/// `{project}-{version}.tgz`
pub fn package_file_name(project: &str, version: &str) -> String {
    format!("{}-{}.tgz", project, version)
}

/// Published package row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub key: PackageKey,
    pub kind: ArtifactKind,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub is_external: bool,
    pub size: u64,
    /// sha256 of the published tarball
    pub checksum: String,
    pub storage_path: String,
    pub is_release_version: bool,
    pub is_ready: bool,
    /// Release notes from the bundle's `CHANGELOG.md`
    #[serde(default)]
    pub version_log: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl PackageRecord {
    pub fn is_released_and_ready(&self) -> bool {
        self.is_release_version && self.is_ready
    }
}

/// Control commands declared in a descriptor's `control` mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlCommands {
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub stop: String,
    #[serde(default)]
    pub restart: String,
    #[serde(default)]
    pub reload: String,
    #[serde(default)]
    pub kill: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub health_check: String,
    #[serde(default)]
    pub debug: String,
}

impl ControlCommands {
    /// Build from a raw command map; unknown keys are ignored
    pub fn from_map(map: &BTreeMap<String, String>) -> Self {
        let get = |key: &str| map.get(key).cloned().unwrap_or_default();
        Self {
            start: get("start"),
            stop: get("stop"),
            restart: get("restart"),
            reload: get("reload"),
            kill: get("kill"),
            version: get("version"),
            health_check: get("health_check"),
            debug: get("debug"),
        }
    }
}

/// On-host process management info for one published package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessControlRecord {
    pub key: PackageKey,
    pub install_path: String,
    pub log_path: String,
    pub data_path: String,
    pub pid_path: String,
    pub control: ControlCommands,
    #[serde(default)]
    pub process_name: Option<String>,
    #[serde(default)]
    pub port_range: Option<String>,
    #[serde(default = "default_true")]
    pub need_delegate: bool,
}

/// Project-level metadata shared by every version of a plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptorRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    #[serde(default = "default_launch_node")]
    pub launch_node: String,
    #[serde(default)]
    pub auto_launch: bool,
    #[serde(default = "default_true")]
    pub need_delegate: bool,
    #[serde(default)]
    pub process_name: Option<String>,
}

/// Kind of bundled agent/proxy support file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportFileKind {
    Env,
    Template,
}

/// Environment or template file shipped under `support-files/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportFileRecord {
    pub agent_name: String,
    pub version: String,
    pub platform: Platform,
    pub arch: CpuArch,
    pub kind: SupportFileKind,
    pub file_name: String,
    #[serde(default)]
    pub content: String,
    /// Parsed `KEY=VALUE` pairs for env files
    #[serde(default)]
    pub env_values: BTreeMap<String, String>,
}

impl SupportFileRecord {
    pub fn same_identity(&self, other: &Self) -> bool {
        self.agent_name == other.agent_name
            && self.version == other.version
            && self.platform == other.platform
            && self.arch == other.arch
            && self.kind == other.kind
            && self.file_name == other.file_name
    }
}

fn default_true() -> bool {
    true
}

fn default_launch_node() -> String {
    "all".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_layout() {
        let key = PackageKey::new("basereport", "10.1.0", Platform::Windows, CpuArch::X86);
        assert_eq!(key.pkg_name, "basereport-10.1.0.tgz");
        assert_eq!(key.storage_key(), "windows/x86/basereport-10.1.0.tgz");
    }

    #[test]
    fn test_control_commands_ignore_unknown_keys() {
        let mut map = BTreeMap::new();
        map.insert("start".to_string(), "./start.sh".to_string());
        map.insert("health_check".to_string(), "./check.sh".to_string());
        map.insert("bogus".to_string(), "rm -rf".to_string());
        let control = ControlCommands::from_map(&map);
        assert_eq!(control.start, "./start.sh");
        assert_eq!(control.health_check, "./check.sh");
        assert!(control.stop.is_empty());
    }
}
