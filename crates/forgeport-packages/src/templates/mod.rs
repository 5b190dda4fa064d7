//! Config templates declared by package manifests

pub mod extract;
pub mod resolve;
pub mod schema;

pub use extract::extract_templates;
pub use resolve::{latest_for_package, resolve_latest};

use forgeport_core::types::VariableNode;
use serde::Serialize;

/// Template declared in `project.yaml` under `config_templates`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigTemplateEntry {
    pub name: String,
    /// Plugin version this template belongs to, or `*` for any
    pub plugin_version: String,
    pub version: String,
    /// Path of the template file inside the package directory
    pub source_path: String,
    /// Where the rendered file lands on the host
    pub file_path: String,
    pub format: String,
    pub is_main: bool,
    pub variables: Option<VariableNode>,
    /// Set when `variables` failed validation; the template is not persisted
    pub schema_error: Option<String>,
}

impl ConfigTemplateEntry {
    pub fn is_valid(&self) -> bool {
        self.schema_error.is_none()
    }
}
