//! Publish transaction
//!
//! Storage has no transactions of its own, so every object write is
//! recorded and undone in reverse order if a later step fails.

use chrono::Utc;
use forgeport_archive::PackSummary;
use forgeport_core::storage::with_timeout;
use forgeport_core::types::{ArtifactKind, Category, PackageKey, PackageRecord};
use forgeport_core::{Error, PipelineConfig, Registry, Result, Storage, WriteBatch};
use std::fs;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub enum StorageChange {
    ObjectCreated { key: String },
    ObjectReplaced { key: String, backup: Vec<u8> },
}

/// Storage writes of one publish, undoable until committed
pub struct PublishTransaction<'a> {
    storage: &'a dyn Storage,
    timeout_secs: u64,
    changes: Vec<StorageChange>,
    committed: bool,
}

impl<'a> PublishTransaction<'a> {
    pub fn begin(storage: &'a dyn Storage, timeout_secs: u64) -> Self {
        Self {
            storage,
            timeout_secs,
            changes: Vec::new(),
            committed: false,
        }
    }

    /// Save an object, remembering how to undo it
    pub async fn save(&mut self, key: &str, content: &[u8]) -> Result<String> {
        let existed =
            with_timeout(self.timeout_secs, "storage lookup", self.storage.exists(key)).await?;
        let backup = if existed {
            Some(with_timeout(self.timeout_secs, "storage backup", self.storage.open(key)).await?)
        } else {
            None
        };

        let stored =
            with_timeout(self.timeout_secs, "storage save", self.storage.save(key, content))
                .await?;

        match backup {
            Some(backup) if stored == key => self.record_object_replaced(stored.clone(), backup),
            _ => self.record_object_created(stored.clone()),
        }
        Ok(stored)
    }

    pub fn record_object_created(&mut self, key: String) {
        self.changes.push(StorageChange::ObjectCreated { key });
    }

    pub fn record_object_replaced(&mut self, key: String, backup: Vec<u8>) {
        self.changes.push(StorageChange::ObjectReplaced { key, backup });
    }

    pub fn commit(mut self) {
        debug!("Committing publish of {} objects", self.changes.len());
        self.committed = true;
    }

    pub async fn rollback(mut self) {
        warn!("Rolling back {} storage writes", self.changes.len());

        for change in self.changes.iter().rev() {
            if let Err(e) = self.rollback_change(change).await {
                warn!("Failed to rollback change {:?}: {}", change_key(change), e);
            }
        }
        self.committed = true;
    }

    async fn rollback_change(&self, change: &StorageChange) -> Result<()> {
        match change {
            StorageChange::ObjectCreated { key } => {
                with_timeout(self.timeout_secs, "rollback delete", self.storage.delete(key))
                    .await
            }
            StorageChange::ObjectReplaced { key, backup } => {
                with_timeout(
                    self.timeout_secs,
                    "rollback restore",
                    self.storage.save(key, backup),
                )
                .await
                .map(|_| ())
            }
        }
    }

    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }
}

fn change_key(change: &StorageChange) -> &str {
    match change {
        StorageChange::ObjectCreated { key } | StorageChange::ObjectReplaced { key, .. } => key,
    }
}

/// A packed unit ready to be published
#[derive(Debug, Clone)]
pub struct PackedArtifact {
    pub key: PackageKey,
    pub kind: ArtifactKind,
    pub category: Option<Category>,
    pub is_external: bool,
    pub is_release: bool,
    pub version_log: Option<String>,
    pub summary: PackSummary,
}

/// Upload the tarball and commit its registry rows as one unit of work.
///
/// `batch` carries the unit's metadata rows; the package row is added here.
/// Any failure undoes the storage writes made so far.
pub async fn publish(
    storage: &dyn Storage,
    registry: &dyn Registry,
    config: &PipelineConfig,
    artifact: &PackedArtifact,
    mut batch: WriteBatch,
) -> Result<PackageRecord> {
    let content = fs::read(&artifact.summary.archive_path)?;
    let mut tx = PublishTransaction::begin(storage, config.storage_timeout_secs);

    match publish_inner(&mut tx, registry, config, artifact, &content, &mut batch).await {
        Ok(record) => {
            tx.commit();
            info!("Published {} to {}", artifact.key, record.storage_path);
            Ok(record)
        }
        Err(e) => {
            tx.rollback().await;
            Err(e)
        }
    }
}

async fn publish_inner(
    tx: &mut PublishTransaction<'_>,
    registry: &dyn Registry,
    config: &PipelineConfig,
    artifact: &PackedArtifact,
    content: &[u8],
    batch: &mut WriteBatch,
) -> Result<PackageRecord> {
    let expected = artifact.key.storage_key();
    let stored = tx.save(&expected, content).await?;
    if stored != expected {
        return Err(Error::save_mismatch(expected, stored));
    }

    if let Some(alias) = config
        .overwrite_version
        .as_deref()
        .filter(|v| *v != artifact.key.version)
    {
        let alias_key = PackageKey::new(
            &artifact.key.project,
            alias,
            artifact.key.platform,
            artifact.key.arch,
        )
        .storage_key();
        let stored_alias = tx.save(&alias_key, content).await?;
        if stored_alias != alias_key {
            return Err(Error::save_mismatch(alias_key, stored_alias));
        }
        debug!("Also published {} as {}", artifact.key, alias_key);
    }

    let record = PackageRecord {
        key: artifact.key.clone(),
        kind: artifact.kind,
        category: artifact.category,
        is_external: artifact.is_external,
        size: artifact.summary.size_bytes,
        checksum: artifact.summary.checksum.clone(),
        storage_path: expected,
        is_release_version: artifact.is_release,
        is_ready: true,
        version_log: artifact.version_log.clone(),
        updated_at: Utc::now(),
    };
    batch.packages.push(record.clone());

    registry.commit(std::mem::take(batch)).await?;
    Ok(record)
}
