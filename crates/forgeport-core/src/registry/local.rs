use super::{
    PackageFilter, Registry, SignatureUpdate, SupportFileFilter, TemplateFilter, WriteBatch,
};
use crate::error::{Error, Result};
use crate::types::{
    ConfigTemplateRecord, PackageKey, PackageRecord, PluginDescriptorRecord,
    ProcessControlRecord, ResourceSignatureState, SupportFileRecord,
};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use tokio::sync::Mutex;
use tracing::debug;

/// Table contents, in insertion order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegistryState {
    #[serde(default)]
    packages: Vec<PackageRecord>,
    #[serde(default)]
    process_controls: Vec<ProcessControlRecord>,
    #[serde(default)]
    descriptors: Vec<PluginDescriptorRecord>,
    #[serde(default)]
    templates: Vec<ConfigTemplateRecord>,
    #[serde(default)]
    support_files: Vec<SupportFileRecord>,
    #[serde(default)]
    signatures: Vec<ResourceSignatureState>,
}

impl RegistryState {
    fn apply(&mut self, batch: WriteBatch) {
        for record in batch.packages {
            upsert(&mut self.packages, record, |a, b| a.key == b.key);
        }
        for record in batch.process_controls {
            upsert(&mut self.process_controls, record, |a, b| a.key == b.key);
        }
        for record in batch.descriptors {
            upsert(&mut self.descriptors, record, |a, b| a.name == b.name);
        }
        for record in batch.templates {
            upsert(&mut self.templates, record, |a, b| a.same_identity(b));
        }
        for record in batch.support_files {
            upsert(&mut self.support_files, record, |a, b| a.same_identity(b));
        }
    }
}

fn upsert<T>(rows: &mut Vec<T>, record: T, same: impl Fn(&T, &T) -> bool) {
    match rows.iter_mut().find(|existing| same(existing, &record)) {
        Some(existing) => *existing = record,
        None => rows.push(record),
    }
}

/// In-process registry with optional JSON persistence
pub struct LocalRegistry {
    state: Mutex<RegistryState>,
    path: Option<Utf8PathBuf>,
}

impl LocalRegistry {
    /// Registry that lives only for the current process
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            path: None,
        }
    }

    /// Load (or start) a registry persisted at `path`
    pub fn open(path: impl Into<Utf8PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                RegistryState::default()
            } else {
                serde_json::from_str(&content).map_err(|e| {
                    Error::registry(format!("Failed to read registry {}: {}", path, e))
                })?
            }
        } else {
            RegistryState::default()
        };

        Ok(Self {
            state: Mutex::new(state),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Utf8Path> {
        self.path.as_deref()
    }

    /// Write state to disk under an exclusive lock, via temp file + rename
    fn persist(path: &Utf8Path, state: &RegistryState) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock_path = path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        lock_file
            .lock_exclusive()
            .map_err(|e| Error::registry(format!("Failed to lock registry: {}", e)))?;

        let temp_path = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(state)?;
        {
            let mut temp_file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&temp_path)?;
            temp_file.write_all(json.as_bytes())?;
            temp_file.sync_all()?;
        }

        fs::rename(&temp_path, path)
            .map_err(|e| Error::registry(format!("Failed to replace registry file: {}", e)))?;

        // lock released when `lock_file` drops
        Ok(())
    }
}

#[async_trait]
impl Registry for LocalRegistry {
    async fn packages(&self, filter: &PackageFilter) -> Result<Vec<PackageRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .packages
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn process_control(&self, key: &PackageKey) -> Result<Option<ProcessControlRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .process_controls
            .iter()
            .find(|r| &r.key == key)
            .cloned())
    }

    async fn descriptor(&self, name: &str) -> Result<Option<PluginDescriptorRecord>> {
        let state = self.state.lock().await;
        Ok(state.descriptors.iter().find(|r| r.name == name).cloned())
    }

    async fn config_templates(
        &self,
        filter: &TemplateFilter,
    ) -> Result<Vec<ConfigTemplateRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .templates
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn support_files(&self, filter: &SupportFileFilter) -> Result<Vec<SupportFileRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .support_files
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn signature_state(&self, name: &str) -> Result<Option<ResourceSignatureState>> {
        let state = self.state.lock().await;
        Ok(state.signatures.iter().find(|r| r.name == name).cloned())
    }

    async fn update_signature_state(
        &self,
        name: &str,
        update: SignatureUpdate,
    ) -> Result<ResourceSignatureState> {
        let mut state = self.state.lock().await;
        let mut row = state
            .signatures
            .iter()
            .find(|r| r.name == name)
            .cloned()
            .unwrap_or_else(|| ResourceSignatureState::new(name));
        update(&mut row);

        let mut next = state.clone();
        upsert(&mut next.signatures, row.clone(), |a, b| a.name == b.name);
        if let Some(path) = &self.path {
            Self::persist(path, &next)?;
        }

        *state = next;
        debug!("Updated signature of {}", name);
        Ok(row)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let rows = batch.len();
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        next.apply(batch);

        if let Some(path) = &self.path {
            Self::persist(path, &next)?;
        }

        *state = next;
        debug!("Committed {} registry rows", rows);
        Ok(())
    }
}
