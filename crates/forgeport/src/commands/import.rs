//! Import command

use anyhow::{bail, Result};
use camino::Utf8Path;
use forgeport_core::types::PackageKey;
use forgeport_core::PipelineConfig;
use forgeport_packages::{PipelineOptions, PipelineOutcome, PipelineRun, UnitDiagnostic};
use serde::Serialize;
use std::sync::Arc;
use tabled::{settings::Style, Table, Tabled};

use super::{apply_overrides, load_config, open_registry, open_storage};
use crate::cli::{GlobalArgs, ImportArgs};
use crate::output;

pub async fn run(args: ImportArgs, globals: &GlobalArgs) -> Result<()> {
    let mut config = load_config(globals)?;
    apply_overrides(&mut config, &args.overrides);

    let options = PipelineOptions {
        is_update_check: args.update_check,
        is_release: args.release,
        selected: None,
    };
    execute(config, &args.archive, &options, args.json).await
}

#[derive(Tabled)]
struct PublishedRow {
    package: String,
    version: String,
    target: String,
    path: String,
}

#[derive(Serialize)]
struct OutcomeJson<'a> {
    kind: Option<String>,
    published: &'a [PackageKey],
    diagnostics: &'a [UnitDiagnostic],
    fatal: Option<String>,
}

/// Run the pipeline over `archive` and report; fails when the run was aborted
pub(crate) async fn execute(
    config: PipelineConfig,
    archive: &Utf8Path,
    options: &PipelineOptions,
    json: bool,
) -> Result<()> {
    if !archive.is_file() {
        bail!("Archive {} does not exist", archive);
    }

    let storage = Arc::new(open_storage(&config));
    let registry = Arc::new(open_registry(&config)?);
    let mut pipeline = PipelineRun::new(Arc::new(config), storage, registry);

    let spinner = (!json).then(|| output::spinner(&format!("Importing {}...", archive)));
    let outcome = pipeline.run(archive.as_std_path(), options).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    if json {
        let report = OutcomeJson {
            kind: outcome.kind.map(|k| k.to_string()),
            published: &outcome.published,
            diagnostics: &outcome.diagnostics,
            fatal: outcome.fatal.as_ref().map(|e| e.to_string()),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render(&outcome);
    }

    match outcome.fatal {
        Some(e) => Err(anyhow::Error::new(e).context(format!("Import of {} failed", archive))),
        None => Ok(()),
    }
}

fn render(outcome: &PipelineOutcome) {
    if let Some(kind) = outcome.kind {
        output::kv("Bundle", &kind.to_string());
    }

    if outcome.published.is_empty() {
        output::info("No packages were published");
    } else {
        output::header("Published packages");
        let rows: Vec<PublishedRow> = outcome
            .published
            .iter()
            .map(|key| PublishedRow {
                package: key.project.clone(),
                version: key.version.clone(),
                target: format!("{}/{}", key.platform, key.arch),
                path: key.storage_key(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::sharp());
        println!("{}", table);
    }

    for diagnostic in &outcome.diagnostics {
        output::warning(&format!("{}: {}", diagnostic.unit, diagnostic.message));
    }

    match &outcome.fatal {
        Some(e) => output::error(&format!("Import aborted: {}", e)),
        None => output::success(&format!(
            "{} published, {} skipped",
            outcome.published.len(),
            outcome.diagnostics.len()
        )),
    }
}
