use super::ConfigTemplateEntry;
use chrono::Utc;
use forgeport_core::types::{ConfigTemplateRecord, CpuArch, Platform};
use forgeport_core::{Error, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Capture template contents as registry records.
///
/// Entries with a schema error are skipped. Each captured source file is
/// removed from `unit_dir` so templates are not shipped inside the tarball.
pub fn extract_templates(
    unit_dir: &Path,
    plugin_name: &str,
    platform: Platform,
    arch: CpuArch,
    entries: &[ConfigTemplateEntry],
    is_release: bool,
) -> Result<Vec<ConfigTemplateRecord>> {
    let mut records = Vec::new();

    for entry in entries {
        if let Some(reason) = &entry.schema_error {
            warn!(
                "Skipping template {} of {}: {}",
                entry.name, plugin_name, reason
            );
            continue;
        }

        let source = unit_dir.join(&entry.source_path);
        let content = fs::read_to_string(&source).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::file_not_exist(source.display().to_string()),
            _ => Error::Io(e),
        })?;

        records.push(ConfigTemplateRecord {
            plugin_name: plugin_name.to_string(),
            plugin_version: entry.plugin_version.clone(),
            name: entry.name.clone(),
            version: entry.version.clone(),
            platform,
            arch,
            is_main: entry.is_main,
            format: entry.format.clone(),
            file_path: entry.file_path.clone(),
            content,
            variables: entry.variables.clone(),
            is_release_version: is_release,
            updated_at: Utc::now(),
        });

        fs::remove_file(&source)?;
        debug!(
            "Captured template {} v{} for {} and removed {}",
            entry.name,
            entry.version,
            plugin_name,
            source.display()
        );
    }

    Ok(records)
}
