//! Config template records and variable schema nodes

use super::platform::{CpuArch, Platform};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Plugin version marker meaning "applies to every plugin version"
pub const WILDCARD_VERSION: &str = "*";

/// Persisted config template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigTemplateRecord {
    pub plugin_name: String,
    /// Owning plugin version, or `*`
    pub plugin_version: String,
    pub name: String,
    pub version: String,
    pub platform: Platform,
    pub arch: CpuArch,
    pub is_main: bool,
    pub format: String,
    /// Install path of the rendered file on the host
    pub file_path: String,
    pub content: String,
    #[serde(default)]
    pub variables: Option<VariableNode>,
    #[serde(default)]
    pub is_release_version: bool,
    pub updated_at: DateTime<Utc>,
}

impl ConfigTemplateRecord {
    pub fn is_wildcard(&self) -> bool {
        self.plugin_version == WILDCARD_VERSION
    }

    /// Upsert identity: (plugin, plugin version, name, version, platform, arch, is_main)
    pub fn same_identity(&self, other: &Self) -> bool {
        self.plugin_name == other.plugin_name
            && self.plugin_version == other.plugin_version
            && self.name == other.name
            && self.version == other.version
            && self.platform == other.platform
            && self.arch == other.arch
            && self.is_main == other.is_main
    }
}

/// Declared variable type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    Object,
    Array,
    Number,
    String,
    Boolean,
}

impl VariableType {
    pub fn is_container(&self) -> bool {
        matches!(self, VariableType::Object | VariableType::Array)
    }
}

/// Normalized default value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableDefault {
    Boolean(bool),
    Number(f64),
    String(String),
}

/// Validated node of a template's variable schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableNode {
    #[serde(rename = "type")]
    pub kind: VariableType,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<VariableDefault>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, VariableNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<VariableNode>>,
}

impl VariableNode {
    pub fn new(kind: VariableType) -> Self {
        Self {
            kind,
            title: None,
            required: false,
            default: None,
            properties: BTreeMap::new(),
            items: None,
        }
    }

    /// Depth of the tree, root counting as 1
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self, 1usize)];
        while let Some((node, depth)) = stack.pop() {
            max = max.max(depth);
            stack.extend(node.properties.values().map(|child| (child, depth + 1)));
            if let Some(items) = &node.items {
                stack.push((items, depth + 1));
            }
        }
        max
    }
}
