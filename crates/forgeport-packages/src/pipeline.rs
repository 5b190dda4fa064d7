//! End-to-end import of one uploaded bundle
//!
//! ```text
//! archive ─► safety gate ─► layout ─► per unit: descriptor ─► templates
//!                                       ─► injection ─► pack ─► publish
//! ```
//!
//! Problems confined to one unit become diagnostics and the run continues;
//! unsafe archives, unknown layouts and publish failures end the run.

use crate::builder::{arcname, classify_tree, ensure_single_kind, ArtifactBuilder};
use crate::descriptor::{parse, ParseOutcome, ParsedPackage};
use crate::layout::{resolve_layout, LayoutReport, PackageUnit};
use crate::publish::{publish, PackedArtifact};
use crate::support_files::BundleMeta;
use crate::templates::extract_templates;
use forgeport_archive::{pack_dir, safe_extract_nested};
use forgeport_core::types::{ArtifactKind, PackageKey};
use forgeport_core::{Error, PipelineConfig, Registry, Result, Storage, WriteBatch};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Knobs for one import
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Fail units whose version is not an update of the published line
    pub is_update_check: bool,
    /// Mark published packages as released
    pub is_release: bool,
    /// Only build these relative paths; all units when unset
    pub selected: Option<Vec<String>>,
}

/// Something that went wrong with a single unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitDiagnostic {
    pub unit: String,
    pub message: String,
}

impl UnitDiagnostic {
    fn new(unit: impl Into<String>, message: impl ToString) -> Self {
        Self {
            unit: unit.into(),
            message: message.to_string(),
        }
    }
}

/// Result of a run; `fatal` is set when the run was aborted
#[derive(Debug, Default)]
pub struct PipelineOutcome {
    pub kind: Option<ArtifactKind>,
    pub published: Vec<PackageKey>,
    pub diagnostics: Vec<UnitDiagnostic>,
    pub fatal: Option<Error>,
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        self.fatal.is_none()
    }
}

/// Dry-run view of one unit
#[derive(Debug, Clone, Serialize)]
pub struct UnitDescription {
    pub relative_path: String,
    pub package: Option<ParsedPackage>,
    pub rejection: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DescribeReport {
    pub kind: ArtifactKind,
    pub units: Vec<UnitDescription>,
    pub skipped: Vec<String>,
}

/// Temporary directories owned by one run, removed on drop
#[derive(Default)]
struct RunScratch {
    dirs: Vec<TempDir>,
}

impl RunScratch {
    fn create(&mut self, prefix: &str) -> Result<PathBuf> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        let path = dir.path().to_path_buf();
        self.dirs.push(dir);
        Ok(path)
    }

    fn clear(&mut self) {
        self.dirs.clear();
    }
}

/// Import pipeline over one storage and registry; each `run` or `describe` starts on fresh scratch
pub struct PipelineRun {
    config: Arc<PipelineConfig>,
    storage: Arc<dyn Storage>,
    registry: Arc<dyn Registry>,
    scratch: RunScratch,
}

impl PipelineRun {
    pub fn new(
        config: Arc<PipelineConfig>,
        storage: Arc<dyn Storage>,
        registry: Arc<dyn Registry>,
    ) -> Self {
        Self {
            config,
            storage,
            registry,
            scratch: RunScratch::default(),
        }
    }

    /// Gate, extract and lay out the bundle
    fn open_bundle(&mut self, archive: &Path) -> Result<(ArtifactKind, LayoutReport)> {
        // directories of a previous run on this instance are no longer needed
        self.scratch.clear();

        info!("Stage 1/5: Validating and extracting {}", archive.display());
        let extract_dir = self.scratch.create("forgeport-extract-")?;
        let report = safe_extract_nested(archive, &extract_dir, self.config.nested_archive_depth)?;
        debug!(
            "Extracted {} files, {} nested archives",
            report.files, report.nested_archives
        );

        info!("Stage 2/5: Resolving package layout");
        let layout = resolve_layout(&extract_dir)?;
        let kind = classify_tree(&layout.root)?;
        ensure_single_kind(kind, &layout.units)?;
        info!(
            "Bundle is a {} bundle with {} package units",
            kind,
            layout.units.len()
        );
        Ok((kind, layout))
    }

    /// Import every unit of `archive` and publish what passes
    pub async fn run(&mut self, archive: &Path, options: &PipelineOptions) -> PipelineOutcome {
        let mut outcome = PipelineOutcome::default();
        if let Err(e) = self.run_inner(archive, options, &mut outcome).await {
            warn!("Import of {} aborted: {}", archive.display(), e);
            outcome.fatal = Some(e);
        }
        outcome
    }

    async fn run_inner(
        &mut self,
        archive: &Path,
        options: &PipelineOptions,
        outcome: &mut PipelineOutcome,
    ) -> Result<()> {
        let (kind, layout) = self.open_bundle(archive)?;
        outcome.kind = Some(kind);
        for skipped in &layout.skipped {
            debug!("Skipped {}: {}", skipped.path, skipped.reason);
        }

        let config = Arc::clone(&self.config);
        let storage = Arc::clone(&self.storage);
        let registry = Arc::clone(&self.registry);
        let builder = ArtifactBuilder::new(kind, &config, storage.as_ref(), registry.as_ref());

        let meta = match builder.support_files_info(&layout.root) {
            Ok(meta) => meta,
            Err(e) => {
                warn!("Failed to read bundle support files: {}", e);
                BundleMeta::default()
            }
        };

        info!("Stage 3/5: Parsing package descriptors");
        let mut parsed_units = Vec::new();
        for unit in &layout.units {
            if let Some(selected) = &options.selected {
                if !selected.contains(&unit.relative_path) {
                    debug!("{} not selected, skipping", unit.relative_path);
                    continue;
                }
            }
            if !config.supports(unit.platform, unit.arch) {
                outcome.diagnostics.push(UnitDiagnostic::new(
                    &unit.relative_path,
                    format!("{}_{} is not a supported platform", unit.platform, unit.arch),
                ));
                continue;
            }

            match parse(unit, options.is_update_check, true, registry.as_ref()).await {
                Ok(ParseOutcome::Parsed(package)) => parsed_units.push((unit, package)),
                Ok(ParseOutcome::Rejected(reason)) => {
                    warn!("Rejected {}: {}", unit.relative_path, reason);
                    outcome
                        .diagnostics
                        .push(UnitDiagnostic::new(&unit.relative_path, reason));
                }
                Err(e) if e.is_unit_scoped() => {
                    warn!("Skipping {}: {}", unit.relative_path, e);
                    outcome
                        .diagnostics
                        .push(UnitDiagnostic::new(&unit.relative_path, e));
                }
                Err(e) => return Err(e),
            }
        }

        info!("Stage 4/5: Building {} packages", parsed_units.len());
        let mut artifacts = Vec::new();
        for (unit, package) in parsed_units {
            let batch = match self
                .prepare_unit(&builder, unit, &package, &meta, options)
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    warn!("Skipping {}: {}", unit.relative_path, e);
                    outcome
                        .diagnostics
                        .push(UnitDiagnostic::new(&unit.relative_path, e));
                    continue;
                }
            };

            if let Some(mismatch) = meta.version_mismatch(&package.version) {
                warn!("{}: {}", unit.relative_path, mismatch);
                outcome
                    .diagnostics
                    .push(UnitDiagnostic::new(&unit.relative_path, mismatch));
            }

            for template in package.templates.iter().filter(|t| !t.is_valid()) {
                outcome.diagnostics.push(UnitDiagnostic::new(
                    &unit.relative_path,
                    format!(
                        "template {} not imported: {}",
                        template.name,
                        template.schema_error.as_deref().unwrap_or_default()
                    ),
                ));
            }

            let artifact =
                self.pack_unit(kind, unit, &package, meta.changelog.clone(), options)?;
            artifacts.push((artifact, batch));
        }

        info!("Stage 5/5: Publishing {} packages", artifacts.len());
        for (artifact, batch) in artifacts {
            publish(storage.as_ref(), registry.as_ref(), &config, &artifact, batch).await?;
            outcome.published.push(artifact.key);
        }

        info!(
            "Import finished: {} published, {} diagnostics",
            outcome.published.len(),
            outcome.diagnostics.len()
        );
        Ok(())
    }

    /// Everything that may fail per unit: metadata rows, templates, injection
    async fn prepare_unit(
        &mut self,
        builder: &ArtifactBuilder<'_>,
        unit: &PackageUnit,
        package: &ParsedPackage,
        meta: &BundleMeta,
        options: &PipelineOptions,
    ) -> Result<WriteBatch> {
        let paths = self.config.install_paths_for(unit.platform);
        let process_control = package.process_control(paths)?;

        let templates = extract_templates(
            &unit.absolute_path,
            &package.project,
            unit.platform,
            unit.arch,
            &package.templates,
            options.is_release,
        )?;

        let work_dir = self.scratch.create("forgeport-unit-")?;
        builder
            .extract_initial_artifact(unit, &package.project, &package.version, &work_dir)
            .await?;

        let mut batch = WriteBatch::new();
        batch.process_controls.push(process_control);
        batch.descriptors.push(package.descriptor_record());
        batch.templates = templates;
        batch.support_files =
            meta.records(&package.project, &package.version, unit.platform, unit.arch);
        Ok(batch)
    }

    fn pack_unit(
        &mut self,
        kind: ArtifactKind,
        unit: &PackageUnit,
        package: &ParsedPackage,
        version_log: Option<String>,
        options: &PipelineOptions,
    ) -> Result<PackedArtifact> {
        let key = package.key();
        let out_dir = self.scratch.create("forgeport-pack-")?;
        let output = out_dir.join(&key.pkg_name);
        let summary = pack_dir(
            &unit.absolute_path,
            &arcname(kind, unit.is_external, &package.project),
            &output,
            self.config.compression_level,
        )?;
        debug!(
            "Packed {} ({} files, {} bytes)",
            key, summary.file_count, summary.size_bytes
        );

        Ok(PackedArtifact {
            key,
            kind,
            category: Some(package.category),
            is_external: unit.is_external,
            is_release: options.is_release,
            version_log,
            summary,
        })
    }

    /// Parse every unit without building or publishing anything
    pub async fn describe(&mut self, archive: &Path) -> Result<DescribeReport> {
        let (kind, layout) = self.open_bundle(archive)?;

        info!("Stage 3/5: Parsing package descriptors");
        let mut units = Vec::with_capacity(layout.units.len());
        for unit in &layout.units {
            let (package, rejection) =
                match parse(unit, false, false, self.registry.as_ref()).await? {
                    ParseOutcome::Parsed(package) => (Some(*package), None),
                    ParseOutcome::Rejected(reason) => (None, Some(reason.to_string())),
                };
            units.push(UnitDescription {
                relative_path: unit.relative_path.clone(),
                package,
                rejection,
            });
        }

        Ok(DescribeReport {
            kind,
            units,
            skipped: layout.skipped.into_iter().map(|s| s.path).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use forgeport_core::{LocalRegistry, LocalStorage};
    use std::fs;

    #[tokio::test]
    async fn test_repeated_runs_release_earlier_scratch() {
        let temp = TempDir::new().unwrap();
        let docs = temp.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        fs::write(docs.join("README"), "not a package").unwrap();
        let archive = temp.path().join("docs.tgz");
        pack_dir(&docs, "docs/", &archive, 6).unwrap();

        let storage =
            LocalStorage::new(Utf8PathBuf::from_path_buf(temp.path().join("store")).unwrap());
        let mut run = PipelineRun::new(
            Arc::new(PipelineConfig::default()),
            Arc::new(storage),
            Arc::new(LocalRegistry::in_memory()),
        );

        for _ in 0..3 {
            let outcome = run.run(&archive, &PipelineOptions::default()).await;
            assert!(matches!(
                outcome.fatal,
                Some(Error::UnrecognizedLayout { .. })
            ));
            assert_eq!(run.scratch.dirs.len(), 1);
        }
    }
}
