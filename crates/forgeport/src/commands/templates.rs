//! Templates command

use anyhow::{Context, Result};
use forgeport_core::registry::TemplateFilter;
use forgeport_core::types::{ConfigTemplateRecord, PlatformTarget};
use forgeport_core::Registry;
use forgeport_packages::resolve_latest;
use tabled::{settings::Style, Table, Tabled};

use super::{load_config, open_registry};
use crate::cli::{GlobalArgs, TemplatesArgs};
use crate::output;

#[derive(Tabled)]
struct TemplateRow {
    name: String,
    version: String,
    plugin_version: String,
    main: bool,
    path: String,
}

pub async fn run(args: TemplatesArgs, globals: &GlobalArgs) -> Result<()> {
    let target: PlatformTarget = args
        .target
        .parse()
        .with_context(|| format!("Invalid target {}", args.target))?;
    let config = load_config(globals)?;
    let registry = open_registry(&config)?;

    let known = registry
        .config_templates(
            &TemplateFilter::for_plugin(&args.plugin).with_target(target.platform, target.arch),
        )
        .await?;
    let resolved = resolve_latest(
        &args.plugin,
        target.platform,
        target.arch,
        &known,
        args.plugin_version.as_deref(),
        &registry,
    )
    .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
        return Ok(());
    }

    if resolved.is_empty() {
        output::warning(&format!(
            "No config templates for {} on {}",
            args.plugin, args.target
        ));
        return Ok(());
    }

    output::header(&format!("Config templates for {} ({})", args.plugin, args.target));
    let rows: Vec<TemplateRow> = resolved.iter().map(row).collect();
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{}", table);

    if args.content {
        for template in &resolved {
            output::header(&template.name);
            println!("{}", template.content);
        }
    }
    Ok(())
}

fn row(template: &ConfigTemplateRecord) -> TemplateRow {
    TemplateRow {
        name: template.name.clone(),
        version: template.version.clone(),
        plugin_version: template.plugin_version.clone(),
        main: template.is_main,
        path: template.file_path.clone(),
    }
}
