//! `project.yaml` descriptor parsing
//!
//! A descriptor is either parsed into a [`ParsedPackage`] or rejected with a
//! [`RejectReason`]. Rejections are ordinary outcomes, reported per unit; the
//! only hard error is a failed update check.

use crate::layout::PackageUnit;
use crate::port_range::validate_port_range;
use crate::templates::schema::{coerce_bool, validate as validate_schema};
use crate::templates::ConfigTemplateEntry;
use crate::version::{classify, VersionClass, VersionDecision};
use forgeport_core::config::InstallPaths;
use forgeport_core::types::{
    package_file_name, Category, ControlCommands, CpuArch, PackageKey, Platform,
    PluginDescriptorRecord, ProcessControlRecord,
};
use forgeport_core::version::parse_lenient;
use forgeport_core::{Error, Registry, Result};
use serde::Serialize;
use serde_yaml_ng::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::{Component, Path};
use thiserror::Error as ThisError;
use tracing::{debug, info, warn};

/// Manifest file expected at the root of every package directory
pub const MANIFEST_FILE: &str = "project.yaml";

/// Why a package directory was not accepted
#[derive(Debug, Clone, PartialEq, Eq, ThisError, Serialize)]
pub enum RejectReason {
    #[error("project.yaml is missing")]
    ManifestMissing,

    #[error("project.yaml could not be read as a mapping")]
    ManifestUnreadable,

    #[error("project.yaml is missing required fields")]
    MissingRequiredFields,

    #[error("category '{0}' is not one of official, external, scripts")]
    InvalidCategory(String),

    #[error("config template source {0} does not exist")]
    MissingTemplateFile(String),

    #[error("version '{0}' is not a valid semantic version")]
    InvalidVersion(String),
}

/// A descriptor that passed every check
#[derive(Debug, Clone, Serialize)]
pub struct ParsedPackage {
    pub project: String,
    pub version: String,
    pub pkg_name: String,
    pub category: Category,
    pub description: String,
    pub platform: Platform,
    pub arch: CpuArch,
    /// Omitted when parsed without detail
    pub control: Option<ControlCommands>,
    pub templates: Vec<ConfigTemplateEntry>,
    pub process_name: Option<String>,
    pub launch_node: String,
    pub auto_launch: bool,
    pub need_delegate: bool,
    pub port_range: Option<String>,
    pub decision: VersionDecision,
}

#[derive(Debug, Clone)]
pub enum ParseOutcome {
    Parsed(Box<ParsedPackage>),
    Rejected(RejectReason),
}

impl ParsedPackage {
    pub fn key(&self) -> PackageKey {
        PackageKey::new(&self.project, &self.version, self.platform, self.arch)
    }

    pub fn descriptor_record(&self) -> PluginDescriptorRecord {
        PluginDescriptorRecord {
            name: self.project.clone(),
            description: self.description.clone(),
            category: self.category,
            launch_node: self.launch_node.clone(),
            auto_launch: self.auto_launch,
            need_delegate: self.need_delegate,
            process_name: self.process_name.clone(),
        }
    }

    /// Build the process-control row using the platform's install layout.
    ///
    /// Fails with `InvalidPortRange` when the declared ports are malformed.
    pub fn process_control(&self, paths: &InstallPaths) -> Result<ProcessControlRecord> {
        let port_range = match self.port_range.as_deref() {
            Some(raw) => {
                let normalized = validate_port_range(raw)?;
                (!normalized.is_empty()).then_some(normalized)
            }
            None => None,
        };

        let separator = self.platform.path_separator();
        let pid_path = format!(
            "{}{}{}.pid",
            paths.run_dir.trim_end_matches(['/', '\\']),
            separator,
            self.project
        );

        Ok(ProcessControlRecord {
            key: self.key(),
            install_path: paths.home.clone(),
            log_path: paths.log_dir.clone(),
            data_path: paths.data_dir.clone(),
            pid_path,
            control: self.control.clone().unwrap_or_default(),
            process_name: self.process_name.clone(),
            port_range,
            need_delegate: self.need_delegate,
        })
    }
}

/// Read a scalar as a string, keeping `1.0` as `"1.0"`
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn required_string(mapping: &Mapping, key: &str) -> Option<String> {
    mapping
        .get(key)
        .and_then(scalar_string)
        .filter(|s| !s.trim().is_empty())
}

fn flag(mapping: &Mapping, key: &str, default: bool) -> bool {
    match mapping.get(key) {
        Some(value) if !value.is_null() => coerce_bool(value, key).unwrap_or(default),
        _ => default,
    }
}

/// Source paths must stay inside the package directory
fn is_contained(relative: &str) -> bool {
    let path = Path::new(relative);
    !relative.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn read_manifest(unit_dir: &Path) -> std::result::Result<Mapping, RejectReason> {
    let manifest_path = unit_dir.join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        warn!("No {} under {}", MANIFEST_FILE, unit_dir.display());
        return Err(RejectReason::ManifestMissing);
    }

    let raw = std::fs::read_to_string(&manifest_path).map_err(|e| {
        warn!("Failed to read {}: {}", manifest_path.display(), e);
        RejectReason::ManifestUnreadable
    })?;
    match serde_yaml_ng::from_str::<Value>(&raw) {
        Ok(Value::Mapping(mapping)) => Ok(mapping),
        Ok(_) => {
            warn!("{} is not a mapping", manifest_path.display());
            Err(RejectReason::ManifestUnreadable)
        }
        Err(e) => {
            warn!("Failed to parse {}: {}", manifest_path.display(), e);
            Err(RejectReason::ManifestUnreadable)
        }
    }
}

fn parse_control(mapping: &Mapping) -> std::result::Result<ControlCommands, RejectReason> {
    let control = match mapping.get("control") {
        None | Some(Value::Null) => return Ok(ControlCommands::default()),
        Some(Value::Mapping(control)) => control,
        Some(_) => return Err(RejectReason::MissingRequiredFields),
    };

    let mut commands = BTreeMap::new();
    for (key, value) in control {
        if let (Some(key), Some(value)) = (scalar_string(key), scalar_string(value)) {
            commands.insert(key, value);
        }
    }
    Ok(ControlCommands::from_map(&commands))
}

fn parse_templates(
    mapping: &Mapping,
    unit_dir: &Path,
) -> std::result::Result<Vec<ConfigTemplateEntry>, RejectReason> {
    let raw_templates = match mapping.get("config_templates") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Sequence(seq)) => seq,
        Some(_) => return Err(RejectReason::MissingRequiredFields),
    };

    let mut entries = Vec::with_capacity(raw_templates.len());
    for raw in raw_templates {
        let template = raw
            .as_mapping()
            .ok_or(RejectReason::MissingRequiredFields)?;
        let field = |key: &str| {
            required_string(template, key).ok_or(RejectReason::MissingRequiredFields)
        };

        let source_path = field("source_path")?;
        if !is_contained(&source_path) || !unit_dir.join(&source_path).is_file() {
            warn!(
                "Template source {} is missing under {}",
                source_path,
                unit_dir.display()
            );
            return Err(RejectReason::MissingTemplateFile(source_path));
        }

        let name = field("name")?;
        let (variables, schema_error) = match template.get("variables") {
            None | Some(Value::Null) => (None, None),
            Some(raw_vars) => match validate_schema(raw_vars) {
                Ok(node) => (Some(node), None),
                Err(e) => {
                    warn!("Template {} has an invalid variables schema: {}", name, e);
                    (None, Some(e.to_string()))
                }
            },
        };

        entries.push(ConfigTemplateEntry {
            is_main: flag(template, "is_main_config", false) || flag(template, "is_main", false),
            plugin_version: field("plugin_version")?,
            version: field("version")?,
            file_path: field("file_path")?,
            format: field("format")?,
            source_path,
            name,
            variables,
            schema_error,
        });
    }
    Ok(entries)
}

/// Parse and classify the package in `unit`.
///
/// With `is_update_check`, anything but an `Update` is a hard
/// `PackageVersionValidation` error. `need_detail = false` leaves out the
/// control map for a cheap dry run.
pub async fn parse(
    unit: &PackageUnit,
    is_update_check: bool,
    need_detail: bool,
    registry: &dyn Registry,
) -> Result<ParseOutcome> {
    let unit_dir = unit.absolute_path.as_path();

    let mapping = match read_manifest(unit_dir) {
        Ok(mapping) => mapping,
        Err(reason) => return Ok(ParseOutcome::Rejected(reason)),
    };

    let (Some(project), Some(version), Some(category_raw)) = (
        required_string(&mapping, "name"),
        required_string(&mapping, "version"),
        required_string(&mapping, "category"),
    ) else {
        warn!("{} under {} lacks name/version/category", MANIFEST_FILE, unit.relative_path);
        return Ok(ParseOutcome::Rejected(RejectReason::MissingRequiredFields));
    };

    let control = match parse_control(&mapping) {
        Ok(control) => control,
        Err(reason) => {
            warn!("control in {} is not a mapping", unit.relative_path);
            return Ok(ParseOutcome::Rejected(reason));
        }
    };

    let category: Category = match category_raw.parse() {
        Ok(category) => category,
        Err(_) => {
            warn!(
                "{} {} declares category {}, which is not accepted",
                project, version, category_raw
            );
            return Ok(ParseOutcome::Rejected(RejectReason::InvalidCategory(
                category_raw,
            )));
        }
    };

    if parse_lenient(&version).is_err() {
        return Ok(ParseOutcome::Rejected(RejectReason::InvalidVersion(version)));
    }

    let decision = classify(&project, &version, unit.platform, unit.arch, registry).await?;
    info!(
        "{} {} ({}/{}) classified as {} (latest {})",
        project, version, unit.platform, unit.arch, decision.class, decision.release_version
    );

    if is_update_check && decision.class != VersionClass::Update {
        return Err(Error::version_validation(
            unit_dir.display().to_string(),
            &version,
            &decision.release_version,
        ));
    }

    let templates = match parse_templates(&mapping, unit_dir) {
        Ok(templates) => templates,
        Err(reason) => return Ok(ParseOutcome::Rejected(reason)),
    };

    let port_range = mapping
        .get("port_range")
        .and_then(scalar_string)
        .filter(|s| !s.trim().is_empty());

    debug!(
        "Parsed {} {} with {} templates",
        project,
        version,
        templates.len()
    );

    Ok(ParseOutcome::Parsed(Box::new(ParsedPackage {
        pkg_name: package_file_name(&project, &version),
        description: mapping
            .get("description")
            .and_then(scalar_string)
            .unwrap_or_default(),
        platform: unit.platform,
        arch: unit.arch,
        control: need_detail.then_some(control),
        templates,
        process_name: mapping.get("process_name").and_then(scalar_string),
        launch_node: mapping
            .get("launch_node")
            .and_then(scalar_string)
            .unwrap_or_else(|| "all".to_string()),
        auto_launch: flag(&mapping, "auto_launch", false),
        need_delegate: flag(&mapping, "need_delegate", true),
        port_range,
        decision,
        project,
        version,
        category,
    })))
}
