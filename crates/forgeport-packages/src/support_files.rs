//! Bundle-level metadata shipped alongside agent and proxy packages
//!
//! ```text
//! gse/
//! ├── CHANGELOG.md
//! ├── VERSION
//! ├── agent_linux_x86_64/
//! └── support-files/
//!     ├── env/
//!     └── templates/
//! ```

use forgeport_core::types::{CpuArch, Platform, SupportFileKind, SupportFileRecord};
use forgeport_core::version::parse_lenient;
use forgeport_core::Result;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

pub const VERSION_FILE: &str = "VERSION";
pub const CHANGELOG_FILE: &str = "CHANGELOG.md";
pub const SUPPORT_FILES_DIR: &str = "support-files";

static SEMVER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?(?:\+[0-9A-Za-z.-]+)?")
        .expect("semantic version regex is valid")
});

/// A file from `support-files/{env,templates}`
#[derive(Debug, Clone, PartialEq)]
pub struct SupportFile {
    pub kind: SupportFileKind,
    pub file_name: String,
    pub content: String,
}

/// Metadata gathered once per bundle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BundleMeta {
    /// First semantic version found in `VERSION`
    pub version: Option<String>,
    pub changelog: Option<String>,
    pub files: Vec<SupportFile>,
}

impl BundleMeta {
    /// Describe a disagreement between `VERSION` and a manifest version
    pub fn version_mismatch(&self, manifest_version: &str) -> Option<String> {
        let bundled = self.version.as_deref()?;
        let agrees = match (parse_lenient(bundled), parse_lenient(manifest_version)) {
            (Ok(a), Ok(b)) => a.cmp_precedence(&b).is_eq(),
            _ => bundled == manifest_version,
        };
        (!agrees).then(|| {
            format!(
                "{} says {} but the manifest says {}",
                VERSION_FILE, bundled, manifest_version
            )
        })
    }

    /// Registry rows for one packaged target
    pub fn records(
        &self,
        agent_name: &str,
        version: &str,
        platform: Platform,
        arch: CpuArch,
    ) -> Vec<SupportFileRecord> {
        self.files
            .iter()
            .map(|file| SupportFileRecord {
                agent_name: agent_name.to_string(),
                version: version.to_string(),
                platform,
                arch,
                kind: file.kind,
                file_name: file.file_name.clone(),
                content: file.content.clone(),
                env_values: match file.kind {
                    SupportFileKind::Env => parse_env(&file.content),
                    SupportFileKind::Template => BTreeMap::new(),
                },
            })
            .collect()
    }
}

/// Parse `KEY=VALUE` lines, ignoring blanks and `#`/`;` comments
pub fn parse_env(content: &str) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            debug!("Ignoring env line without '=': {}", line);
            continue;
        };
        let key = key.trim().trim_start_matches("export ").trim();
        if key.is_empty() {
            continue;
        }
        let value = value.trim().trim_matches('"');
        values.insert(key.to_string(), value.to_string());
    }
    values
}

/// First semantic version in `raw`
pub fn extract_version(raw: &str) -> Option<String> {
    SEMVER_RE.find(raw).map(|m| m.as_str().to_string())
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn collect_dir(dir: &Path, kind: SupportFileKind, out: &mut Vec<SupportFile>) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        match fs::read_to_string(entry.path()) {
            Ok(content) => out.push(SupportFile {
                kind,
                file_name,
                content,
            }),
            Err(e) => warn!("Skipping unreadable support file {}: {}", file_name, e),
        }
    }
    Ok(())
}

/// Gather `VERSION`, `CHANGELOG.md` and `support-files/` under a bundle root.
///
/// Everything is optional; a bundle without them yields an empty meta.
pub fn collect_bundle_meta(bundle_root: &Path) -> Result<BundleMeta> {
    let version = read_optional(&bundle_root.join(VERSION_FILE))?
        .as_deref()
        .and_then(extract_version);
    let changelog = read_optional(&bundle_root.join(CHANGELOG_FILE))?;

    let support_dir = bundle_root.join(SUPPORT_FILES_DIR);
    let mut files = Vec::new();
    collect_dir(&support_dir.join("env"), SupportFileKind::Env, &mut files)?;
    collect_dir(
        &support_dir.join("templates"),
        SupportFileKind::Template,
        &mut files,
    )?;

    debug!(
        "Bundle meta under {}: version {:?}, {} support files",
        bundle_root.display(),
        version,
        files.len()
    );
    Ok(BundleMeta {
        version,
        changelog,
        files,
    })
}
