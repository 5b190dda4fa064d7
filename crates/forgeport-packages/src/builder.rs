//! Kind-specific preparation of package directories
//!
//! A bundle is classified once into an [`ArtifactKind`]; everything that
//! differs between plugins, agents and proxies dispatches on that value.

use crate::inject::{inject_dependencies, BIN_DIR};
use crate::layout::PackageUnit;
use crate::support_files::{collect_bundle_meta, BundleMeta};
use forgeport_archive::safe_extract;
use forgeport_core::registry::PackageFilter;
use forgeport_core::storage::with_timeout;
use forgeport_core::types::ArtifactKind;
use forgeport_core::{Error, PipelineConfig, Registry, Result, Storage};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Directory holding gateway binaries in proxy bundles
pub const SERVER_DIR: &str = "server";

/// Decide which builder handles an extracted bundle
pub fn classify_tree(root: &Path) -> Result<ArtifactKind> {
    if root.join(SERVER_DIR).is_dir() {
        return Ok(ArtifactKind::Proxy);
    }

    let mut dir_names = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dir_names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }

    if dir_names.iter().any(|name| name.starts_with("agent_")) {
        Ok(ArtifactKind::Agent)
    } else if dir_names
        .iter()
        .any(|name| name.starts_with("plugins_") || name.starts_with("external_plugins_"))
    {
        Ok(ArtifactKind::Plugin)
    } else {
        Err(Error::unrecognized_layout(root.display().to_string()))
    }
}

/// Reject bundles whose units disagree with the bundle kind
pub fn ensure_single_kind(kind: ArtifactKind, units: &[PackageUnit]) -> Result<()> {
    match units.iter().find(|unit| unit.kind != kind) {
        Some(unit) => Err(Error::mixed_bundle(kind, unit.relative_path.clone())),
        None => Ok(()),
    }
}

/// Top-level directory a package unpacks into on the host
pub fn arcname(kind: ArtifactKind, is_external: bool, project: &str) -> String {
    match kind {
        ArtifactKind::Plugin if is_external => format!("external_plugins/{}/", project),
        ArtifactKind::Plugin => "plugins/".to_string(),
        ArtifactKind::Agent => "agent/".to_string(),
        ArtifactKind::Proxy => "proxy/".to_string(),
    }
}

/// Prepares units of one bundle for packaging
pub struct ArtifactBuilder<'a> {
    kind: ArtifactKind,
    config: &'a PipelineConfig,
    storage: &'a dyn Storage,
    registry: &'a dyn Registry,
}

impl<'a> ArtifactBuilder<'a> {
    pub fn new(
        kind: ArtifactKind,
        config: &'a PipelineConfig,
        storage: &'a dyn Storage,
        registry: &'a dyn Registry,
    ) -> Self {
        Self {
            kind,
            config,
            storage,
            registry,
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// Bring a unit directory into its installable shape.
    ///
    /// Plugins ship as uploaded. Agents get certificates, the launcher script
    /// and executable bits. Proxies are first seeded from the published agent
    /// of the same version and overlaid with the server binaries.
    pub async fn extract_initial_artifact(
        &self,
        unit: &PackageUnit,
        project: &str,
        version: &str,
        scratch: &Path,
    ) -> Result<()> {
        match self.kind {
            ArtifactKind::Plugin => {
                debug!("Plugin {} needs no injection", unit.relative_path);
                Ok(())
            }
            ArtifactKind::Agent => {
                inject_dependencies(
                    &unit.absolute_path,
                    self.kind,
                    unit.platform,
                    project,
                    self.config,
                    self.storage,
                )
                .await
            }
            ArtifactKind::Proxy => {
                self.seed_from_agent(unit, version, scratch).await?;
                self.overlay_server_binaries(unit)?;

                let bin_dir = unit.absolute_path.join(BIN_DIR);
                if !bin_dir.is_dir() {
                    return Err(Error::file_not_exist(bin_dir.display().to_string()));
                }
                inject_dependencies(
                    &unit.absolute_path,
                    self.kind,
                    unit.platform,
                    project,
                    self.config,
                    self.storage,
                )
                .await
            }
        }
    }

    /// Bundle-level support files; plugins carry none
    pub fn support_files_info(&self, bundle_root: &Path) -> Result<BundleMeta> {
        match self.kind {
            ArtifactKind::Plugin => Ok(BundleMeta::default()),
            ArtifactKind::Agent | ArtifactKind::Proxy => collect_bundle_meta(bundle_root),
        }
    }

    /// Copy files from the ready agent package that the proxy unit lacks
    async fn seed_from_agent(&self, unit: &PackageUnit, version: &str, scratch: &Path) -> Result<()> {
        let agent = &self.config.agent_project;
        let filter = PackageFilter::for_target(agent.as_str(), unit.platform, unit.arch)
            .with_version(version)
            .ready();
        let record = self
            .registry
            .packages(&filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::missing_dependency(format!(
                    "{} {} for {}/{} is not published and ready",
                    agent, version, unit.platform, unit.arch
                ))
            })?;

        let timeout = self.config.storage_timeout_secs;
        let key = record.storage_path.as_str();
        if !with_timeout(timeout, "agent package lookup", self.storage.exists(key)).await? {
            return Err(Error::missing_dependency(format!(
                "agent package {} is registered but missing from storage",
                key
            )));
        }
        let bytes = with_timeout(timeout, "agent package download", self.storage.open(key)).await?;

        let archive_path = scratch.join(&record.key.pkg_name);
        fs::write(&archive_path, bytes)?;
        let extract_dir = scratch.join(format!("{}-{}", unit.install_dir_name(), "agent"));
        safe_extract(&archive_path, &extract_dir)?;

        // agent packages are rooted at agent/
        let agent_root: PathBuf = {
            let rooted = extract_dir.join(ArtifactKind::Agent.layout_token());
            if rooted.is_dir() {
                rooted
            } else {
                extract_dir.clone()
            }
        };

        let seeded = copy_missing(&agent_root, &unit.absolute_path)?;
        info!(
            "Seeded {} files from {} into {}",
            seeded, record.key, unit.relative_path
        );
        Ok(())
    }

    fn overlay_server_binaries(&self, unit: &PackageUnit) -> Result<()> {
        let server_bin = unit.root.join(SERVER_DIR).join(BIN_DIR);
        let bin_dir = unit.absolute_path.join(BIN_DIR);
        fs::create_dir_all(&bin_dir)?;

        for binary in &self.config.proxy_server_binaries {
            let source = server_bin.join(binary);
            if !source.is_file() {
                return Err(Error::file_not_exist(source.display().to_string()));
            }
            fs::copy(&source, bin_dir.join(binary))?;
            debug!("Copied {} into {}", binary, bin_dir.display());
        }
        Ok(())
    }
}

/// Copy every file under `source` that does not already exist under `dest`
fn copy_missing(source: &Path, dest: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() && !target.exists() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_classify_tree() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir_all(root.join("external_plugins_linux_x86_64")).unwrap();
        assert_eq!(classify_tree(root).unwrap(), ArtifactKind::Plugin);

        fs::create_dir_all(root.join("agent_linux_x86_64")).unwrap();
        assert_eq!(classify_tree(root).unwrap(), ArtifactKind::Agent);

        fs::create_dir_all(root.join("server/bin")).unwrap();
        assert_eq!(classify_tree(root).unwrap(), ArtifactKind::Proxy);
    }

    #[test]
    fn test_classify_unrecognized() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("docs")).unwrap();
        assert!(matches!(
            classify_tree(temp.path()),
            Err(Error::UnrecognizedLayout { .. })
        ));
    }

    fn unit(relative_path: &str, kind: ArtifactKind) -> PackageUnit {
        PackageUnit {
            root: PathBuf::from("/bundle"),
            relative_path: relative_path.to_string(),
            absolute_path: PathBuf::from("/bundle").join(relative_path),
            platform: forgeport_core::types::Platform::Linux,
            arch: forgeport_core::types::CpuArch::X86_64,
            is_external: false,
            kind,
        }
    }

    #[test]
    fn test_ensure_single_kind() {
        let agent = unit("agent_linux_x86_64", ArtifactKind::Agent);
        let plugin = unit("plugins_linux_x86_64/proc", ArtifactKind::Plugin);

        assert!(ensure_single_kind(ArtifactKind::Agent, std::slice::from_ref(&agent)).is_ok());
        assert!(ensure_single_kind(ArtifactKind::Agent, &[]).is_ok());

        let err = ensure_single_kind(ArtifactKind::Agent, &[agent, plugin]).unwrap_err();
        assert!(matches!(
            err,
            Error::MixedBundle { ref unit, .. } if unit == "plugins_linux_x86_64/proc"
        ));
        assert!(!err.is_unit_scoped());
    }

    #[test]
    fn test_arcname() {
        assert_eq!(arcname(ArtifactKind::Plugin, false, "proc"), "plugins/");
        assert_eq!(
            arcname(ArtifactKind::Plugin, true, "proc"),
            "external_plugins/proc/"
        );
        assert_eq!(arcname(ArtifactKind::Agent, false, "gse_agent"), "agent/");
        assert_eq!(arcname(ArtifactKind::Proxy, false, "gse_proxy"), "proxy/");
    }

    #[test]
    fn test_copy_missing_keeps_existing_files() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src");
        let dest = temp.path().join("dest");
        fs::create_dir_all(source.join("bin")).unwrap();
        fs::create_dir_all(dest.join("bin")).unwrap();
        fs::write(source.join("bin/gse_agent"), "agent").unwrap();
        fs::write(source.join("bin/gsectl"), "agent ctl").unwrap();
        fs::write(dest.join("bin/gsectl"), "proxy ctl").unwrap();

        assert_eq!(copy_missing(&source, &dest).unwrap(), 1);
        assert_eq!(fs::read_to_string(dest.join("bin/gsectl")).unwrap(), "proxy ctl");
        assert_eq!(fs::read_to_string(dest.join("bin/gse_agent")).unwrap(), "agent");
    }
}
