//! Storage and registry doubles
//!
//! `MockStorage` keeps objects in memory and can be told to fail or to
//! rename saved objects. `FlakyRegistry` wraps a real `LocalRegistry` and can
//! refuse commits. `MockScriptedStorage` is a mockall double for call-level
//! expectations.

#![allow(dead_code)]

use async_trait::async_trait;
use forgeport_core::registry::{
    PackageFilter, SignatureUpdate, SupportFileFilter, TemplateFilter,
};
use forgeport_core::types::{
    ConfigTemplateRecord, PackageKey, PackageRecord, PluginDescriptorRecord,
    ProcessControlRecord, ResourceSignatureState, SupportFileRecord,
};
use forgeport_core::{Error, LocalRegistry, Registry, Result, Storage, WriteBatch};
use mockall::mock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory object storage
#[derive(Clone, Default)]
pub struct MockStorage {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    saves: Arc<Mutex<Vec<String>>>,
    fail_saves: Arc<AtomicBool>,
    rename_saves: Arc<AtomicBool>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with agent and proxy launcher scripts for every platform
    pub fn with_control_scripts() -> Self {
        let storage = Self::new();
        for kind in ["agent", "proxy"] {
            storage.insert(
                &format!("control-scripts/{}/linux/gsectl", kind),
                b"#!/bin/sh\nAUTO_TYPE={{ AUTO_TYPE }}\n",
            );
            storage.insert(
                &format!("control-scripts/{}/aix/gsectl", kind),
                b"#!/bin/sh\nAUTO_TYPE={{ AUTO_TYPE }}\n",
            );
            storage.insert(
                &format!("control-scripts/{}/windows/gsectl.bat", kind),
                b"@echo off\r\n",
            );
        }
        storage
    }

    pub fn insert(&self, key: &str, content: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), content.to_vec());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Keys passed to `save`, in call order
    pub fn saved_keys(&self) -> Vec<String> {
        self.saves.lock().unwrap().clone()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Store objects under a different key than requested
    pub fn rename_saves(&self, rename: bool) {
        self.rename_saves.store(rename, Ordering::SeqCst);
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn open(&self, key: &str) -> Result<Vec<u8>> {
        self.get(key).ok_or_else(|| Error::file_not_exist(key))
    }

    async fn save(&self, key: &str, content: &[u8]) -> Result<String> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::storage(format!("injected failure saving {}", key)));
        }
        self.saves.lock().unwrap().push(key.to_string());
        let stored = if self.rename_saves.load(Ordering::SeqCst) {
            format!("{}.renamed", key)
        } else {
            key.to_string()
        };
        self.insert(&stored, content);
        Ok(stored)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn url(&self, key: &str) -> String {
        format!("mock://{}", key)
    }

    async fn listdir(&self, key: &str) -> Result<(Vec<String>, Vec<String>)> {
        let prefix = format!("{}/", key.trim_end_matches('/'));
        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for stored in self.keys() {
            let Some(rest) = stored.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((dir, _)) if !dirs.contains(&dir.to_string()) => dirs.push(dir.to_string()),
                Some(_) => {}
                None => files.push(rest.to_string()),
            }
        }
        Ok((dirs, files))
    }
}

/// Registry whose commits can be made to fail
#[derive(Clone)]
pub struct FlakyRegistry {
    inner: Arc<LocalRegistry>,
    fail_commits: Arc<AtomicBool>,
}

impl FlakyRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(LocalRegistry::in_memory()),
            fail_commits: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Registry for FlakyRegistry {
    async fn packages(&self, filter: &PackageFilter) -> Result<Vec<PackageRecord>> {
        self.inner.packages(filter).await
    }

    async fn process_control(&self, key: &PackageKey) -> Result<Option<ProcessControlRecord>> {
        self.inner.process_control(key).await
    }

    async fn descriptor(&self, name: &str) -> Result<Option<PluginDescriptorRecord>> {
        self.inner.descriptor(name).await
    }

    async fn config_templates(
        &self,
        filter: &TemplateFilter,
    ) -> Result<Vec<ConfigTemplateRecord>> {
        self.inner.config_templates(filter).await
    }

    async fn support_files(&self, filter: &SupportFileFilter) -> Result<Vec<SupportFileRecord>> {
        self.inner.support_files(filter).await
    }

    async fn signature_state(&self, name: &str) -> Result<Option<ResourceSignatureState>> {
        self.inner.signature_state(name).await
    }

    async fn update_signature_state(
        &self,
        name: &str,
        update: SignatureUpdate,
    ) -> Result<ResourceSignatureState> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(Error::registry("injected commit failure"));
        }
        self.inner.update_signature_state(name, update).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(Error::registry("injected commit failure"));
        }
        self.inner.commit(batch).await
    }
}

mock! {
    pub ScriptedStorage {}

    #[async_trait]
    impl Storage for ScriptedStorage {
        async fn open(&self, key: &str) -> Result<Vec<u8>>;
        async fn save(&self, key: &str, content: &[u8]) -> Result<String>;
        async fn exists(&self, key: &str) -> Result<bool>;
        async fn delete(&self, key: &str) -> Result<()>;
        fn url(&self, key: &str) -> String;
        async fn listdir(&self, key: &str) -> Result<(Vec<String>, Vec<String>)>;
    }
}
