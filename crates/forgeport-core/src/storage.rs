//! Blob storage collaborator
//!
//! The pipeline only relies on the `Storage` contract. `LocalStorage` is the
//! filesystem implementation used by the CLI and tests.

use crate::error::{Error, Result};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use std::future::Future;
use std::path::Component;
use std::time::Duration;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

/// Object storage consumed by the pipeline
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read an object fully
    async fn open(&self, key: &str) -> Result<Vec<u8>>;

    /// Write an object, returning the key it was actually stored under
    async fn save(&self, key: &str, content: &[u8]) -> Result<String>;

    async fn exists(&self, key: &str) -> Result<bool>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Download URL for a stored object
    fn url(&self, key: &str) -> String;

    /// List `(directories, files)` directly under a prefix
    async fn listdir(&self, key: &str) -> Result<(Vec<String>, Vec<String>)>;
}

/// Run a storage future under a deadline
pub async fn with_timeout<T, F>(secs: u64, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(Duration::from_secs(secs), fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::storage(format!(
            "{} timed out after {}s",
            operation, secs
        ))),
    }
}

/// Reject keys that would leave the storage root
pub fn validate_key(key: &str) -> Result<&str> {
    let trimmed = key.trim_start_matches("./");
    if trimmed.is_empty() {
        return Err(Error::storage("Storage key must not be empty"));
    }
    let path = std::path::Path::new(trimmed);
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(Error::storage(format!(
                    "Storage key escapes the storage root: {}",
                    key
                )))
            }
        }
    }
    Ok(trimmed)
}

/// Filesystem storage rooted at the download directory
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: Utf8PathBuf,
    overwrite: bool,
    base_url: Option<String>,
}

impl LocalStorage {
    /// Storage that overwrites objects saved under an existing key
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            overwrite: true,
            base_url: None,
        }
    }

    /// When disabled, colliding saves get a randomized name instead
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Public URL prefix used by `url`
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<Utf8PathBuf> {
        Ok(self.root.join(validate_key(key)?))
    }

    fn randomized_key(key: &str) -> String {
        let suffix = &Uuid::new_v4().simple().to_string()[..8];
        let path = Utf8Path::new(key);
        let file_name = path.file_name().unwrap_or(key);
        // keep multi-part extensions like .tar.gz intact
        let (stem, ext) = match file_name.find('.') {
            Some(idx) => file_name.split_at(idx),
            None => (file_name, ""),
        };
        let renamed = format!("{}_{}{}", stem, suffix, ext);
        match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.join(renamed).to_string(),
            _ => renamed,
        }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn open(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::file_not_exist(key))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, key: &str, content: &[u8]) -> Result<String> {
        let mut stored_key = validate_key(key)?.to_string();
        if !self.overwrite && self.resolve(&stored_key)?.exists() {
            stored_key = Self::randomized_key(&stored_key);
        }

        let path = self.resolve(&stored_key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // write-then-rename so readers never observe a truncated object
        let temp_path = path.with_extension(format!("{}.part", Uuid::new_v4().simple()));
        fs::write(&temp_path, content).await?;
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        debug!("Saved {} bytes to {}", content.len(), path);
        Ok(stored_key)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(fs::try_exists(self.resolve(key)?).await?)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn url(&self, key: &str) -> String {
        let key = key.trim_start_matches('/');
        match &self.base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => format!("file://{}/{}", self.root, key),
        }
    }

    async fn listdir(&self, key: &str) -> Result<(Vec<String>, Vec<String>)> {
        let dir = if key.is_empty() || key == "." {
            self.root.clone()
        } else {
            self.resolve(key)?
        };

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((dirs, files)),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type().await?.is_dir() {
                dirs.push(name);
            } else {
                files.push(name);
            }
        }
        dirs.sort();
        files.sort();
        Ok((dirs, files))
    }
}
