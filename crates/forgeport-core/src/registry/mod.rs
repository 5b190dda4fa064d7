//! Registry collaborator
//!
//! The pipeline reads through filtered queries and writes through a single
//! atomic `commit` of a `WriteBatch`. Every row type is upserted by its
//! natural identity, so re-running an import never duplicates rows.

mod local;

pub use local::LocalRegistry;

use crate::error::Result;
use crate::types::{
    ArtifactKind, ConfigTemplateRecord, CpuArch, PackageKey, PackageRecord, Platform,
    PluginDescriptorRecord, ProcessControlRecord, ResourceSignatureState, SupportFileRecord,
};
use async_trait::async_trait;

/// In-place change to one signature row
pub type SignatureUpdate = Box<dyn FnOnce(&mut ResourceSignatureState) + Send>;

/// Persistent store of published packages and their metadata
#[async_trait]
pub trait Registry: Send + Sync {
    async fn packages(&self, filter: &PackageFilter) -> Result<Vec<PackageRecord>>;

    async fn process_control(&self, key: &PackageKey) -> Result<Option<ProcessControlRecord>>;

    async fn descriptor(&self, name: &str) -> Result<Option<PluginDescriptorRecord>>;

    async fn config_templates(&self, filter: &TemplateFilter)
        -> Result<Vec<ConfigTemplateRecord>>;

    async fn support_files(&self, filter: &SupportFileFilter) -> Result<Vec<SupportFileRecord>>;

    async fn signature_state(&self, name: &str) -> Result<Option<ResourceSignatureState>>;

    /// Apply `update` to the row for `name` (a fresh row if absent) and store it.
    ///
    /// The read and the write happen under one lock, so concurrent updates
    /// of the same row are serialized.
    async fn update_signature_state(
        &self,
        name: &str,
        update: SignatureUpdate,
    ) -> Result<ResourceSignatureState>;

    /// Apply every upsert in the batch, or none of them
    async fn commit(&self, batch: WriteBatch) -> Result<()>;
}

/// Package query; unset fields match anything
#[derive(Debug, Clone, Default)]
pub struct PackageFilter {
    pub project: Option<String>,
    pub version: Option<String>,
    pub platform: Option<Platform>,
    pub arch: Option<CpuArch>,
    pub kind: Option<ArtifactKind>,
    pub ready_only: bool,
}

impl PackageFilter {
    /// All versions of a project for one platform/arch
    pub fn for_target(project: impl Into<String>, platform: Platform, arch: CpuArch) -> Self {
        Self {
            project: Some(project.into()),
            platform: Some(platform),
            arch: Some(arch),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn ready(mut self) -> Self {
        self.ready_only = true;
        self
    }

    pub fn matches(&self, record: &PackageRecord) -> bool {
        let key = &record.key;
        self.project.as_ref().is_none_or(|p| p == &key.project)
            && self.version.as_ref().is_none_or(|v| v == &key.version)
            && self.platform.is_none_or(|p| p == key.platform)
            && self.arch.is_none_or(|a| a == key.arch)
            && self.kind.is_none_or(|k| k == record.kind)
            && (!self.ready_only || record.is_ready)
    }
}

/// Config template query; unset fields match anything
#[derive(Debug, Clone, Default)]
pub struct TemplateFilter {
    pub plugin_name: Option<String>,
    /// Accept any of these plugin versions (including `*`)
    pub plugin_versions: Option<Vec<String>>,
    pub name: Option<String>,
    pub platform: Option<Platform>,
    pub arch: Option<CpuArch>,
}

impl TemplateFilter {
    pub fn for_plugin(plugin_name: impl Into<String>) -> Self {
        Self {
            plugin_name: Some(plugin_name.into()),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_target(mut self, platform: Platform, arch: CpuArch) -> Self {
        self.platform = Some(platform);
        self.arch = Some(arch);
        self
    }

    pub fn with_plugin_versions(mut self, versions: Vec<String>) -> Self {
        self.plugin_versions = Some(versions);
        self
    }

    pub fn matches(&self, record: &ConfigTemplateRecord) -> bool {
        self.plugin_name
            .as_ref()
            .is_none_or(|p| p == &record.plugin_name)
            && self
                .plugin_versions
                .as_ref()
                .is_none_or(|vs| vs.iter().any(|v| v == &record.plugin_version))
            && self.name.as_ref().is_none_or(|n| n == &record.name)
            && self.platform.is_none_or(|p| p == record.platform)
            && self.arch.is_none_or(|a| a == record.arch)
    }
}

/// Support file query
#[derive(Debug, Clone, Default)]
pub struct SupportFileFilter {
    pub agent_name: Option<String>,
    pub version: Option<String>,
    pub platform: Option<Platform>,
    pub arch: Option<CpuArch>,
}

impl SupportFileFilter {
    pub fn matches(&self, record: &SupportFileRecord) -> bool {
        self.agent_name
            .as_ref()
            .is_none_or(|n| n == &record.agent_name)
            && self.version.as_ref().is_none_or(|v| v == &record.version)
            && self.platform.is_none_or(|p| p == record.platform)
            && self.arch.is_none_or(|a| a == record.arch)
    }
}

/// Rows to upsert in one transaction
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub packages: Vec<PackageRecord>,
    pub process_controls: Vec<ProcessControlRecord>,
    pub descriptors: Vec<PluginDescriptorRecord>,
    pub templates: Vec<ConfigTemplateRecord>,
    pub support_files: Vec<SupportFileRecord>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
            && self.process_controls.is_empty()
            && self.descriptors.is_empty()
            && self.templates.is_empty()
            && self.support_files.is_empty()
    }

    /// Total number of rows
    pub fn len(&self) -> usize {
        self.packages.len()
            + self.process_controls.len()
            + self.descriptors.len()
            + self.templates.len()
            + self.support_files.len()
    }
}
