//! Archive safety gate.
//!
//! Uploaded bundles are untrusted. Every entry of an archive is inspected
//! before a single byte is written: absolute names, `..` segments, links
//! and special files reject the whole archive. Extraction only starts once
//! the complete entry list has passed.

use flate2::read::GzDecoder;
use forgeport_core::{Error, Result};
use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tar::{Archive, EntryType};
use tracing::{debug, info, warn};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Kind of an accepted archive entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One validated entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySummary {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
}

/// Counts from a completed extraction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub files: usize,
    pub directories: usize,
    /// Inner archives expanded by `safe_extract_nested`
    pub nested_archives: usize,
}

impl ExtractReport {
    fn absorb(&mut self, other: ExtractReport) {
        self.files += other.files;
        self.directories += other.directories;
        self.nested_archives += other.nested_archives;
    }
}

/// Open a tar archive, transparently decompressing gzip input
pub fn open_archive(path: &Path) -> Result<Archive<Box<dyn Read>>> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 2];
    let read = file.read(&mut magic)?;
    file.seek(SeekFrom::Start(0))?;

    let reader: Box<dyn Read> = if read == 2 && magic == GZIP_MAGIC {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(Archive::new(reader))
}

/// Reject names that are absolute or climb out of the extraction root
pub fn check_entry_name(name: &str) -> Result<()> {
    if name.starts_with('/') || name.starts_with('\\') || has_drive_prefix(name) {
        return Err(Error::unsafe_archive(name));
    }
    if name.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(Error::unsafe_archive(name));
    }
    Ok(())
}

fn has_drive_prefix(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Enumerate and validate every entry without writing anything
pub fn validate_entries<R: Read>(archive: &mut Archive<R>) -> Result<Vec<EntrySummary>> {
    let mut accepted = Vec::new();

    for entry in archive.entries()? {
        let entry = entry?;
        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        check_entry_name(&name)?;

        let kind = match entry.header().entry_type() {
            EntryType::Regular | EntryType::Continuous => EntryKind::File,
            EntryType::Directory => EntryKind::Directory,
            EntryType::XGlobalHeader | EntryType::XHeader => continue,
            EntryType::Symlink | EntryType::Link => {
                return Err(Error::unsafe_archive(format!(
                    "{} (link entries are not allowed)",
                    name
                )))
            }
            other => {
                return Err(Error::unsafe_archive(format!(
                    "{} (unsupported entry type {:?})",
                    name, other
                )))
            }
        };

        accepted.push(EntrySummary {
            name,
            kind,
            size: entry.size(),
        });
    }

    Ok(accepted)
}

/// Validate the archive at `path` and list its entries
pub fn inspect(path: &Path) -> Result<Vec<EntrySummary>> {
    let mut archive = open_archive(path)?;
    validate_entries(&mut archive)
}

/// Validate every entry, then extract into `dest`.
///
/// `dest` is only created after validation succeeds, so a rejected archive
/// leaves it untouched.
pub fn safe_extract(archive_path: &Path, dest: &Path) -> Result<ExtractReport> {
    let entries = inspect(archive_path)?;
    debug!(
        "Archive {} passed validation ({} entries)",
        archive_path.display(),
        entries.len()
    );

    fs::create_dir_all(dest)?;

    let mut archive = open_archive(archive_path)?;
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);

    let mut report = ExtractReport::default();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_type = entry.header().entry_type();
        if matches!(entry_type, EntryType::XGlobalHeader | EntryType::XHeader) {
            continue;
        }

        if !entry.unpack_in(dest)? {
            let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            return Err(Error::unsafe_archive(name));
        }

        if entry_type == EntryType::Directory {
            report.directories += 1;
        } else {
            report.files += 1;
        }
    }

    Ok(report)
}

/// Extract an archive and expand archives-within-archives through the same gate.
///
/// Only archives sitting directly in the extraction root (and directly in the
/// directories they expand into) are opened; archives inside package
/// directories are left alone. `max_depth` bounds the nesting levels.
pub fn safe_extract_nested(
    archive_path: &Path,
    dest: &Path,
    max_depth: usize,
) -> Result<ExtractReport> {
    let mut report = safe_extract(archive_path, dest)?;
    let mut pending: Vec<(PathBuf, usize)> = vec![(dest.to_path_buf(), 1)];

    while let Some((dir, depth)) = pending.pop() {
        for inner in nested_archives_in(&dir)? {
            if depth > max_depth {
                warn!(
                    "Nested archive {} exceeds depth limit {}, leaving it packed",
                    inner.display(),
                    max_depth
                );
                continue;
            }

            let file_name = inner
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let target = dir.join(archive_stem(&file_name));

            info!("Expanding nested archive {}", inner.display());
            let inner_report = safe_extract(&inner, &target)?;
            fs::remove_file(&inner)?;

            report.absorb(inner_report);
            report.nested_archives += 1;
            pending.push((target, depth + 1));
        }
    }

    Ok(report)
}

/// Whether a file name looks like a tar archive
pub fn is_archive_name(name: &str) -> bool {
    name.ends_with(".tar.gz") || name.ends_with(".tgz") || name.ends_with(".tar")
}

fn archive_stem(name: &str) -> &str {
    name.strip_suffix(".tar.gz")
        .or_else(|| name.strip_suffix(".tgz"))
        .or_else(|| name.strip_suffix(".tar"))
        .unwrap_or(name)
}

fn nested_archives_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_archive_name(&name) {
            found.push(entry.path());
        }
    }
    found.sort();
    Ok(found)
}
