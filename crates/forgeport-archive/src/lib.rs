//! Archive handling for Forgeport.
//!
//! - [`gate`]: validate-before-write extraction of untrusted bundles
//! - [`pack`]: canonical-root package tarballs
//! - [`checksum`]: sha256 content hashes

pub mod checksum;
pub mod gate;
pub mod pack;

pub use checksum::{calculate_checksum, checksum_bytes};
pub use gate::{
    inspect, is_archive_name, safe_extract, safe_extract_nested, EntryKind, EntrySummary,
    ExtractReport,
};
pub use pack::{pack_dir, PackSummary, DEFAULT_COMPRESSION_LEVEL};
