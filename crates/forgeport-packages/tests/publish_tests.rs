//! Publishing is all-or-nothing across storage and registry

mod common;

use common::*;
use forgeport_archive::pack_dir;
use forgeport_core::registry::PackageFilter;
use forgeport_core::types::{ArtifactKind, Category, CpuArch, PackageKey, Platform};
use forgeport_core::{Error, PipelineConfig, Registry, WriteBatch};
use forgeport_packages::{publish, PackedArtifact};
use std::fs;

fn packed(fixtures: &FixtureManager, version: &str) -> PackedArtifact {
    let unit = fixtures.stage(&format!("proc-{}", version)).unwrap();
    fs::write(unit.join("project.yaml"), "name: proc\n").unwrap();
    let key = PackageKey::new("proc", version, Platform::Linux, CpuArch::X86_64);
    let summary = pack_dir(
        &unit,
        "plugins/",
        &fixtures.temp_path().join(&key.pkg_name),
        6,
    )
    .unwrap();
    PackedArtifact {
        key,
        kind: ArtifactKind::Plugin,
        category: Some(Category::Official),
        is_external: false,
        is_release: true,
        version_log: None,
        summary,
    }
}

#[tokio::test]
async fn test_publish_uploads_and_registers() {
    let fixtures = FixtureManager::new().unwrap();
    let storage = MockStorage::new();
    let registry = FlakyRegistry::new();
    let artifact = packed(&fixtures, "1.0.0");

    let record = publish(
        &storage,
        &registry,
        &PipelineConfig::default(),
        &artifact,
        WriteBatch::new(),
    )
    .await
    .unwrap();

    assert_eq!(record.storage_path, "linux/x86_64/proc-1.0.0.tgz");
    assert_eq!(record.checksum, artifact.summary.checksum);
    assert!(record.is_ready);
    assert!(record.is_release_version);
    assert!(storage.get("linux/x86_64/proc-1.0.0.tgz").is_some());
    let rows = registry
        .packages(&PackageFilter::for_target("proc", Platform::Linux, CpuArch::X86_64))
        .await
        .unwrap();
    assert_eq!(rows, vec![record]);
}

#[tokio::test]
async fn test_registry_failure_removes_uploaded_objects() {
    let fixtures = FixtureManager::new().unwrap();
    let storage = MockStorage::new();
    let registry = FlakyRegistry::new();
    registry.fail_commits(true);
    let config = PipelineConfig {
        overwrite_version: Some("latest".to_string()),
        ..Default::default()
    };

    let result = publish(
        &storage,
        &registry,
        &config,
        &packed(&fixtures, "1.0.0"),
        WriteBatch::new(),
    )
    .await;

    assert!(matches!(result, Err(Error::Registry { .. })));
    assert_eq!(
        storage.saved_keys(),
        vec![
            "linux/x86_64/proc-1.0.0.tgz".to_string(),
            "linux/x86_64/proc-latest.tgz".to_string(),
        ]
    );
    assert!(storage.keys().is_empty());
}

#[tokio::test]
async fn test_registry_failure_restores_replaced_object() {
    let fixtures = FixtureManager::new().unwrap();
    let storage = MockStorage::new();
    storage.insert("linux/x86_64/proc-1.0.0.tgz", b"previous build");
    let registry = FlakyRegistry::new();
    registry.fail_commits(true);

    let result = publish(
        &storage,
        &registry,
        &PipelineConfig::default(),
        &packed(&fixtures, "1.0.0"),
        WriteBatch::new(),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(
        storage.get("linux/x86_64/proc-1.0.0.tgz").as_deref(),
        Some(&b"previous build"[..])
    );
}

#[tokio::test]
async fn test_overwrite_version_alias_uploads_object_only() {
    let fixtures = FixtureManager::new().unwrap();
    let storage = MockStorage::new();
    let registry = FlakyRegistry::new();
    let config = PipelineConfig {
        overwrite_version: Some("latest".to_string()),
        ..Default::default()
    };
    let artifact = packed(&fixtures, "1.0.0");

    publish(&storage, &registry, &config, &artifact, WriteBatch::new())
        .await
        .unwrap();

    assert_eq!(
        storage.get("linux/x86_64/proc-latest.tgz"),
        storage.get("linux/x86_64/proc-1.0.0.tgz")
    );
    let rows = registry
        .packages(&PackageFilter::for_target("proc", Platform::Linux, CpuArch::X86_64))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].key.version, "1.0.0");
}

#[tokio::test]
async fn test_renamed_save_is_a_mismatch() {
    let fixtures = FixtureManager::new().unwrap();
    let storage = MockStorage::new();
    storage.rename_saves(true);
    let registry = FlakyRegistry::new();

    let result = publish(
        &storage,
        &registry,
        &PipelineConfig::default(),
        &packed(&fixtures, "1.0.0"),
        WriteBatch::new(),
    )
    .await;

    match result {
        Err(Error::PackageSaveMismatch { expected, actual }) => {
            assert_eq!(expected, "linux/x86_64/proc-1.0.0.tgz");
            assert_eq!(actual, "linux/x86_64/proc-1.0.0.tgz.renamed");
        }
        other => panic!("expected save mismatch, got {:?}", other),
    }
    assert!(storage.keys().is_empty());
}

#[tokio::test]
async fn test_mismatched_object_is_deleted_on_rollback() {
    let fixtures = FixtureManager::new().unwrap();
    let mut storage = MockScriptedStorage::new();
    storage.expect_exists().times(1).returning(|_| Ok(false));
    storage
        .expect_save()
        .withf(|key, _| key == "linux/x86_64/proc-1.0.0.tgz")
        .times(1)
        .returning(|_, _| Ok("mirror/proc-1.0.0.tgz".to_string()));
    storage
        .expect_delete()
        .withf(|key| key == "mirror/proc-1.0.0.tgz")
        .times(1)
        .returning(|_| Ok(()));
    let registry = FlakyRegistry::new();

    let result = publish(
        &storage,
        &registry,
        &PipelineConfig::default(),
        &packed(&fixtures, "1.0.0"),
        WriteBatch::new(),
    )
    .await;

    assert!(matches!(result, Err(Error::PackageSaveMismatch { .. })));
    let rows = registry
        .packages(&PackageFilter::default())
        .await
        .unwrap();
    assert!(rows.is_empty());
}
