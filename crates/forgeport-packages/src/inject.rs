//! Dependency injection for agent and proxy package directories
//!
//! Certificates come from the configured cert path and the launcher script
//! from storage, so both can be rotated without rebuilding vendor bundles.

use forgeport_core::config::LinuxAutoType;
use forgeport_core::storage::with_timeout;
use forgeport_core::types::{ArtifactKind, Platform};
use forgeport_core::{Error, PipelineConfig, Result, Storage};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const CERT_DIR: &str = "cert";
pub const BIN_DIR: &str = "bin";
pub const AUTO_TYPE_PLACEHOLDER: &str = "{{ AUTO_TYPE }}";

/// Recreate `cert/` and copy every configured certificate that exists.
///
/// Returns the names of the certificates copied.
pub fn inject_certificates(unit_dir: &Path, config: &PipelineConfig) -> Result<Vec<String>> {
    let cert_dst = unit_dir.join(CERT_DIR);
    if cert_dst.exists() {
        fs::remove_dir_all(&cert_dst)?;
        warn!("{} was not clean, removed it", cert_dst.display());
    }
    fs::create_dir_all(&cert_dst)?;

    let Some(cert_path) = config.cert_path.as_ref() else {
        debug!("No cert path configured, {} left empty", cert_dst.display());
        return Ok(Vec::new());
    };

    let mut injected = Vec::new();
    for cert_filename in &config.cert_filenames {
        let source = cert_path.join(cert_filename);
        if !source.is_file() {
            warn!("Certificate {} does not exist, skipping", source);
            continue;
        }
        fs::copy(&source, cert_dst.join(cert_filename))?;
        injected.push(cert_filename.clone());
    }

    info!(
        "Copied ({}) from {} to {}",
        injected.join(","),
        cert_path,
        cert_dst.display()
    );
    Ok(injected)
}

/// Fetch the launcher script for `kind` on `platform` from storage into `bin/`.
///
/// The unix script has `{{ AUTO_TYPE }}` replaced with the auto type
/// configured for `project`.
pub async fn inject_control_script(
    unit_dir: &Path,
    kind: ArtifactKind,
    platform: Platform,
    project: &str,
    config: &PipelineConfig,
    storage: &dyn Storage,
) -> Result<PathBuf> {
    let key = config.control_script_key(kind, platform);
    let timeout = config.storage_timeout_secs;

    if !with_timeout(timeout, "control script lookup", storage.exists(&key)).await? {
        return Err(Error::file_not_exist(key));
    }
    let mut content =
        with_timeout(timeout, "control script download", storage.open(&key)).await?;
    if !platform.is_windows() {
        let auto_type = config.auto_type_for(project);
        debug!("Rendering {} with auto type {}", key, auto_type);
        content = render_auto_type(content, auto_type);
    }

    let bin_dir = unit_dir.join(BIN_DIR);
    fs::create_dir_all(&bin_dir)?;
    let target = bin_dir.join(config.control_script_for(platform));
    fs::write(&target, content)?;

    info!("Copied control script {} to {}", key, target.display());
    Ok(target)
}

fn render_auto_type(content: Vec<u8>, auto_type: LinuxAutoType) -> Vec<u8> {
    match String::from_utf8(content) {
        Ok(text) => text
            .replace(AUTO_TYPE_PLACEHOLDER, auto_type.as_str())
            .into_bytes(),
        Err(e) => e.into_bytes(),
    }
}

/// Mark every file under `bin/` executable
pub fn make_bin_executable(unit_dir: &Path) -> Result<usize> {
    let bin_dir = unit_dir.join(BIN_DIR);
    if !bin_dir.is_dir() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in WalkDir::new(&bin_dir).follow_links(false) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        set_executable(entry.path())?;
        debug!("Made {} executable", entry.path().display());
        count += 1;
    }
    Ok(count)
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Certificates, launcher script and executable bits for one unit
pub async fn inject_dependencies(
    unit_dir: &Path,
    kind: ArtifactKind,
    platform: Platform,
    project: &str,
    config: &PipelineConfig,
    storage: &dyn Storage,
) -> Result<()> {
    inject_certificates(unit_dir, config)?;
    inject_control_script(unit_dir, kind, platform, project, config, storage).await?;
    make_bin_executable(unit_dir)?;
    Ok(())
}
