//! Package tarball creation.
//!
//! A package directory is archived under a canonical root (`plugins/`,
//! `agent/`, ...) regardless of where it sat in the uploaded bundle.

use crate::checksum::calculate_checksum;
use flate2::write::GzEncoder;
use flate2::Compression;
use forgeport_core::{Error, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use tar::Builder as TarBuilder;
use tracing::debug;
use walkdir::WalkDir;

/// Default compression level (6 = balanced speed/ratio).
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Result of packing a directory
#[derive(Debug, Clone)]
pub struct PackSummary {
    pub archive_path: PathBuf,
    pub size_bytes: u64,
    /// sha256 of the compressed archive
    pub checksum: String,
    pub file_count: usize,
}

/// Tar and gzip `source_dir` into `output_path`, rooted at `arcname`.
///
/// Entries are added in sorted order so identical trees produce identical
/// member lists. Symlinks inside the tree are not followed or archived.
pub fn pack_dir(
    source_dir: &Path,
    arcname: &str,
    output_path: &Path,
    compression_level: u32,
) -> Result<PackSummary> {
    if !source_dir.is_dir() {
        return Err(Error::file_not_exist(source_dir.display().to_string()));
    }

    let root = arcname.trim_matches('/');
    let file = File::create(output_path)?;
    let encoder = GzEncoder::new(file, Compression::new(compression_level.clamp(1, 9)));
    let mut builder = TarBuilder::new(encoder);
    builder.follow_symlinks(false);

    let mut file_count = 0;
    for entry in WalkDir::new(source_dir)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(source_dir)
            .map_err(|_| Error::file_not_exist(entry.path().display().to_string()))?;

        let member = member_name(root, relative);
        if member.is_empty() {
            continue;
        }

        let file_type = entry.file_type();
        if file_type.is_dir() {
            builder.append_dir(&member, entry.path())?;
        } else if file_type.is_file() {
            builder.append_path_with_name(entry.path(), &member)?;
            file_count += 1;
        } else {
            debug!("Skipping non-regular file {}", entry.path().display());
        }
    }

    let encoder = builder.into_inner()?;
    encoder.finish()?;

    let size_bytes = std::fs::metadata(output_path)?.len();
    let checksum = calculate_checksum(output_path)?;

    Ok(PackSummary {
        archive_path: output_path.to_path_buf(),
        size_bytes,
        checksum,
        file_count,
    })
}

fn member_name(root: &str, relative: &Path) -> String {
    let relative = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    match (root.is_empty(), relative.is_empty()) {
        (true, _) => relative,
        (false, true) => root.to_string(),
        (false, false) => format!("{}/{}", root, relative),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_name_joins_root() {
        assert_eq!(member_name("plugins", Path::new("bin/proc")), "plugins/bin/proc");
        assert_eq!(member_name("plugins", Path::new("")), "plugins");
        assert_eq!(member_name("", Path::new("bin")), "bin");
        assert_eq!(
            member_name("external_plugins/proc", Path::new("etc/a.conf")),
            "external_plugins/proc/etc/a.conf"
        );
    }
}
