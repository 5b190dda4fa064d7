//! Package layout resolution.
//!
//! Bundles group packages into directories named
//! `{external_}{plugins|agent|proxy}_{os}_{arch}`. Plugin containers hold one
//! directory per plugin; agent and proxy directories are packages themselves.

use forgeport_core::types::{ArtifactKind, CpuArch, Platform};
use forgeport_core::Result;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

static LAYOUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<external>external_)?(?P<kind>plugins|agent|proxy)_(?P<os>linux|windows|aix)_(?P<arch>x86_64|x86|powerpc|aarch64)$",
    )
    .expect("layout regex is valid")
});

/// One platform/arch package discovered in a bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageUnit {
    /// Extraction root the unit belongs to
    pub root: PathBuf,
    /// Path relative to the extraction root, `/`-separated
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub platform: Platform,
    pub arch: CpuArch,
    pub is_external: bool,
    pub kind: ArtifactKind,
}

impl PackageUnit {
    /// Directory name the package installs as, `{kind}_{os}_{arch}`
    pub fn install_dir_name(&self) -> String {
        format!(
            "{}_{}_{}",
            self.kind.layout_token(),
            self.platform,
            self.arch
        )
    }
}

/// Entry that did not match the naming convention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub path: String,
    pub reason: String,
}

/// Units found under an extraction root
#[derive(Debug, Clone, Default)]
pub struct LayoutReport {
    /// Directory the layout was matched against (may be a wrapper under the extraction root)
    pub root: PathBuf,
    pub units: Vec<PackageUnit>,
    pub skipped: Vec<SkippedEntry>,
}

struct LayoutMatch {
    kind: ArtifactKind,
    platform: Platform,
    arch: CpuArch,
    is_external: bool,
}

fn match_layout_name(name: &str) -> Option<LayoutMatch> {
    let caps = LAYOUT_RE.captures(name)?;
    Some(LayoutMatch {
        kind: ArtifactKind::from_layout_token(&caps["kind"])?,
        platform: caps["os"].parse().ok()?,
        arch: caps["arch"].parse().ok()?,
        is_external: caps.name("external").is_some(),
    })
}

/// Child directories and files of `dir`, sorted by name
fn sorted_children(dir: &Path) -> Result<Vec<(String, PathBuf, bool)>> {
    let mut children = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.file_type()?.is_dir();
        children.push((name, entry.path(), is_dir));
    }
    children.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(children)
}

/// Pick the directory whose children follow the layout convention.
///
/// Vendor bundles often wrap everything in one top-level directory
/// (`gse/agent_linux_x86_64`), so one wrapper level is looked through.
pub fn find_layout_root(extract_root: &Path) -> Result<PathBuf> {
    let children = sorted_children(extract_root)?;
    if children
        .iter()
        .any(|(name, _, is_dir)| *is_dir && match_layout_name(name).is_some())
    {
        return Ok(extract_root.to_path_buf());
    }

    for (_, path, is_dir) in &children {
        if !is_dir {
            continue;
        }
        let nested = sorted_children(path)?;
        if nested
            .iter()
            .any(|(name, _, is_dir)| *is_dir && match_layout_name(name).is_some())
        {
            debug!("Using wrapper directory {} as layout root", path.display());
            return Ok(path.clone());
        }
    }

    Ok(extract_root.to_path_buf())
}

/// Walk an extracted bundle and classify its package units.
///
/// Non-matching entries are skipped, not errors. An empty result is valid.
pub fn resolve_layout(extract_root: &Path) -> Result<LayoutReport> {
    let root = find_layout_root(extract_root)?;
    let mut report = LayoutReport {
        root: root.clone(),
        ..Default::default()
    };

    for (name, path, is_dir) in sorted_children(&root)? {
        if !is_dir {
            continue;
        }

        let Some(layout) = match_layout_name(&name) else {
            debug!("Skipping {}: does not match the package naming convention", name);
            report.skipped.push(SkippedEntry {
                path: name,
                reason: "does not match {kind}_{os}_{arch}".to_string(),
            });
            continue;
        };

        match layout.kind {
            ArtifactKind::Plugin => {
                for (child, child_path, child_is_dir) in sorted_children(&path)? {
                    let relative = format!("{}/{}", name, child);
                    if !child_is_dir {
                        debug!("Skipping {}: plain file in plugin container", relative);
                        report.skipped.push(SkippedEntry {
                            path: relative,
                            reason: "plain file in plugin container".to_string(),
                        });
                        continue;
                    }
                    report.units.push(PackageUnit {
                        root: root.clone(),
                        relative_path: relative,
                        absolute_path: child_path,
                        platform: layout.platform,
                        arch: layout.arch,
                        is_external: layout.is_external,
                        kind: layout.kind,
                    });
                }
            }
            ArtifactKind::Agent | ArtifactKind::Proxy => {
                report.units.push(PackageUnit {
                    root: root.clone(),
                    relative_path: name,
                    absolute_path: path,
                    platform: layout.platform,
                    arch: layout.arch,
                    is_external: layout.is_external,
                    kind: layout.kind,
                });
            }
        }
    }

    debug!(
        "Resolved {} package units ({} skipped) under {}",
        report.units.len(),
        report.skipped.len(),
        root.display()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mkdir(root: &Path, rel: &str) {
        fs::create_dir_all(root.join(rel)).unwrap();
    }

    #[test]
    fn test_match_layout_name() {
        let m = match_layout_name("external_plugins_windows_x86").unwrap();
        assert!(m.is_external);
        assert_eq!(m.kind, ArtifactKind::Plugin);
        assert_eq!(m.platform, Platform::Windows);
        assert_eq!(m.arch, CpuArch::X86);

        // x86 must not swallow the _64 suffix
        let m = match_layout_name("agent_linux_x86_64").unwrap();
        assert_eq!(m.arch, CpuArch::X86_64);

        assert!(match_layout_name("plugins_darwin_x86_64").is_none());
        assert!(match_layout_name("plugins_linux_x86_64_extra").is_none());
    }

    #[test]
    fn test_plugin_containers_are_two_levels() {
        let temp = TempDir::new().unwrap();
        mkdir(temp.path(), "plugins_linux_x86_64/basereport");
        mkdir(temp.path(), "plugins_linux_x86_64/processbeat");
        fs::write(temp.path().join("plugins_linux_x86_64/README"), "x").unwrap();
        mkdir(temp.path(), "external_plugins_aix_powerpc/custom");

        let report = resolve_layout(temp.path()).unwrap();
        let rels: Vec<&str> = report.units.iter().map(|u| u.relative_path.as_str()).collect();
        assert_eq!(
            rels,
            vec![
                "external_plugins_aix_powerpc/custom",
                "plugins_linux_x86_64/basereport",
                "plugins_linux_x86_64/processbeat",
            ]
        );
        assert!(report.units[0].is_external);
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn test_agent_directories_are_units() {
        let temp = TempDir::new().unwrap();
        mkdir(temp.path(), "agent_linux_x86_64/bin");
        mkdir(temp.path(), "agent_windows_x86/bin");
        mkdir(temp.path(), "support-files/env");

        let report = resolve_layout(temp.path()).unwrap();
        assert_eq!(report.units.len(), 2);
        assert_eq!(report.units[0].install_dir_name(), "agent_linux_x86_64");
        assert_eq!(report.units[1].platform, Platform::Windows);
        assert_eq!(report.skipped[0].path, "support-files");
    }

    #[test]
    fn test_wrapper_directory_is_looked_through() {
        let temp = TempDir::new().unwrap();
        mkdir(temp.path(), "gse/agent_linux_aarch64/bin");

        let report = resolve_layout(temp.path()).unwrap();
        assert_eq!(report.root, temp.path().join("gse"));
        assert_eq!(report.units.len(), 1);
        assert_eq!(report.units[0].arch, CpuArch::Aarch64);
    }

    #[test]
    fn test_no_matches_is_empty_not_error() {
        let temp = TempDir::new().unwrap();
        mkdir(temp.path(), "random");
        let report = resolve_layout(temp.path()).unwrap();
        assert!(report.units.is_empty());
        assert_eq!(report.skipped.len(), 1);
    }
}
