//! Bundle fixtures
//!
//! A bundle is staged as a directory tree inside a temp dir and then packed
//! into a `.tgz` the way vendors ship them.

#![allow(dead_code)]

use super::builders::ManifestBuilder;
use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Stages bundle trees and packs them into archives
pub struct FixtureManager {
    temp_dir: TempDir,
}

impl FixtureManager {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new().context("Failed to create temp directory")?;
        Ok(Self { temp_dir })
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// UTF-8 path under the temp dir, for storage roots and registry files
    pub fn utf8_path(&self, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.temp_dir.path().join(name))
            .unwrap_or_else(|p| panic!("non utf-8 temp path {}", p.display()))
    }

    /// Root of a bundle being staged
    pub fn stage(&self, bundle: &str) -> Result<PathBuf> {
        let dir = self.temp_dir.path().join("stage").join(bundle);
        fs::create_dir_all(&dir).context("Failed to create staging directory")?;
        Ok(dir)
    }

    /// Write a file relative to a staged bundle root
    pub fn write(&self, root: &Path, relative: &str, content: &str) -> Result<PathBuf> {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", relative))?;
        Ok(path)
    }

    /// Create a package directory with a manifest, its template sources and a binary
    pub fn add_package(
        &self,
        root: &Path,
        relative: &str,
        manifest: &ManifestBuilder,
    ) -> Result<PathBuf> {
        let dir = root.join(relative);
        fs::create_dir_all(dir.join("bin"))?;
        self.write(&dir, "project.yaml", &manifest.build())?;
        self.write(&dir, "bin/run", "#!/bin/sh\nexit 0\n")?;
        for source in manifest.template_sources() {
            self.write(&dir, &source, "key: {{ value }}\n")?;
        }
        Ok(dir)
    }

    /// Pack a staged bundle into `<name>.tgz`
    pub fn pack(&self, root: &Path, name: &str) -> Result<PathBuf> {
        let archive_path = self.temp_dir.path().join(format!("{}.tgz", name));
        let file = File::create(&archive_path)?;
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        builder
            .append_dir_all(".", root)
            .context("Failed to append bundle tree")?;
        builder.into_inner()?.finish()?;
        Ok(archive_path)
    }

    /// Plugin bundle with one official plugin per target
    pub fn plugin_bundle(&self, name: &str, manifest: &ManifestBuilder, targets: &[&str]) -> Result<PathBuf> {
        let root = self.stage(name)?;
        for target in targets {
            self.add_package(&root, &format!("plugins_{}/{}", target, name), manifest)?;
        }
        self.pack(&root, name)
    }

    /// Agent bundle with a `gse/` wrapper, VERSION and support files
    pub fn agent_bundle(&self, name: &str, manifest: &ManifestBuilder, targets: &[&str]) -> Result<PathBuf> {
        self.agent_bundle_with_version(name, manifest, targets, "2.0.0")
    }

    /// Agent bundle whose VERSION file reads `bundled_version`
    pub fn agent_bundle_with_version(
        &self,
        name: &str,
        manifest: &ManifestBuilder,
        targets: &[&str],
        bundled_version: &str,
    ) -> Result<PathBuf> {
        let stage = self.stage(name)?;
        let root = stage.join("gse");
        for target in targets {
            self.add_package(&root, &format!("agent_{}", target), manifest)?;
        }
        self.write(&root, "VERSION", &format!("{}\n", bundled_version))?;
        self.write(&root, "CHANGELOG.md", "# 2.0.0\n- initial\n")?;
        self.write(&root, "support-files/env/gse_agent.env", "BK_GSE_HOME=/usr/local/gse\n")?;
        self.write(&root, "support-files/templates/gse_agent.conf", "{{ BK_GSE_HOME }}\n")?;
        self.pack(&stage, name)
    }

    /// Plugin bundle that also carries an entry climbing out of the root
    pub fn unsafe_bundle(&self, name: &str, manifest: &ManifestBuilder) -> Result<PathBuf> {
        let archive_path = self.temp_dir.path().join(format!("{}.tgz", name));
        let file = File::create(&archive_path)?;
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

        let body = manifest.build();
        append_raw(
            &mut builder,
            &format!("plugins_linux_x86_64/{}/project.yaml", name),
            body.as_bytes(),
        )?;
        append_raw(&mut builder, "../escaped.txt", b"gotcha")?;
        builder.into_inner()?.finish()?;
        Ok(archive_path)
    }
}

/// Append a regular file without the tar crate's path validation
fn append_raw<W: std::io::Write>(
    builder: &mut tar::Builder<W>,
    name: &str,
    data: &[u8],
) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    let bytes = name.as_bytes();
    header.as_old_mut().name[..bytes.len()].copy_from_slice(bytes);
    header.set_entry_type(tar::EntryType::Regular);
    header.set_mode(0o644);
    header.set_size(data.len() as u64);
    header.set_cksum();
    builder.append(&header, data)?;
    Ok(())
}

/// Entry paths of a gzipped tarball
pub fn tarball_entries(content: &[u8]) -> Result<Vec<String>> {
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(content));
    let mut names = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        names.push(entry.path()?.to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Text of the first tarball entry whose path ends with `suffix`
pub fn tarball_file(content: &[u8], suffix: &str) -> Result<Option<String>> {
    use std::io::Read;

    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(content));
    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.to_string_lossy().into_owned();
        if path.ends_with(suffix) {
            let mut text = String::new();
            entry
                .read_to_string(&mut text)
                .with_context(|| format!("Failed to read {}", path))?;
            return Ok(Some(text));
        }
    }
    Ok(None)
}
