//! Config command

use anyhow::Result;
use forgeport_core::PipelineConfig;

use super::{load_config, registry_path};
use crate::cli::{ConfigCommands, ConfigShowArgs, GlobalArgs};
use crate::output;

pub fn run(cmd: ConfigCommands, globals: &GlobalArgs) -> Result<()> {
    match cmd {
        ConfigCommands::Show(args) => show(args, globals),
        ConfigCommands::Validate => validate(globals),
    }
}

fn show(args: ConfigShowArgs, globals: &GlobalArgs) -> Result<()> {
    let config = load_config(globals)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        println!("{}", serde_yaml_ng::to_string(&config)?);
    }
    Ok(())
}

fn validate(globals: &GlobalArgs) -> Result<()> {
    let spinner = output::spinner("Validating configuration...");
    let loaded = load_config(globals);
    spinner.finish_and_clear();
    let config = loaded?;

    output::success("Configuration is valid");
    summarize(&config);
    Ok(())
}

fn summarize(config: &PipelineConfig) {
    output::kv("Download root", config.download_root.as_str());
    output::kv("Registry", registry_path(config).as_str());
    output::kv(
        "Cert path",
        config.cert_path.as_ref().map_or("(none)", |p| p.as_str()),
    );
    let platforms = if config.supported_platforms.is_empty() {
        "all".to_string()
    } else {
        config
            .supported_platforms
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    output::kv("Platforms", &platforms);
    if let Some(alias) = &config.overwrite_version {
        output::kv("Overwrite version", alias);
    }
}
