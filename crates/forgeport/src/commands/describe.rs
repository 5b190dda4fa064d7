//! Describe command

use anyhow::{bail, Context, Result};
use forgeport_packages::{DescribeReport, PipelineRun};
use std::sync::Arc;
use tabled::{settings::Style, Table, Tabled};

use super::{load_config, open_registry, open_storage};
use crate::cli::{DescribeArgs, GlobalArgs};
use crate::output;

#[derive(Tabled)]
struct UnitRow {
    unit: String,
    package: String,
    version: String,
    category: String,
    status: String,
}

pub async fn run(args: DescribeArgs, globals: &GlobalArgs) -> Result<()> {
    if !args.archive.is_file() {
        bail!("Archive {} does not exist", args.archive);
    }
    let config = load_config(globals)?;
    let storage = Arc::new(open_storage(&config));
    let registry = Arc::new(open_registry(&config)?);
    let mut pipeline = PipelineRun::new(Arc::new(config), storage, registry);

    let spinner = (!args.json).then(|| output::spinner(&format!("Reading {}...", args.archive)));
    let report = pipeline
        .describe(args.archive.as_std_path())
        .await
        .with_context(|| format!("Failed to describe {}", args.archive));
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let report = report?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    render(&report);
    Ok(())
}

fn render(report: &DescribeReport) {
    output::kv("Bundle", &report.kind.to_string());
    output::header("Package units");

    let rows: Vec<UnitRow> = report
        .units
        .iter()
        .map(|unit| match (&unit.package, &unit.rejection) {
            (Some(package), _) => UnitRow {
                unit: unit.relative_path.clone(),
                package: package.project.clone(),
                version: package.version.clone(),
                category: package.category.to_string(),
                status: package.decision.class.to_string(),
            },
            (None, rejection) => UnitRow {
                unit: unit.relative_path.clone(),
                package: "-".to_string(),
                version: "-".to_string(),
                category: "-".to_string(),
                status: format!("rejected: {}", rejection.as_deref().unwrap_or("unknown")),
            },
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{}", table);

    for skipped in &report.skipped {
        output::warning(&format!("{} ignored: not a package directory", skipped));
    }
}
