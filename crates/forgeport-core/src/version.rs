//! Lenient semantic-version parsing
//!
//! Vendor manifests routinely carry versions like `1.2`, `v2.0.1` or a bare
//! `3`. These are normalized into full `semver::Version` values so ordering
//! follows semver precedence rules (pre-release sorts below release, build
//! metadata is ignored for precedence).

use crate::error::{Error, Result};
use semver::Version;

/// Parse a version string, padding missing minor/patch components
pub fn parse_lenient(raw: &str) -> Result<Version> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    if trimmed.is_empty() {
        return Err(Error::invalid_version(raw));
    }

    let split_at = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (numeric, suffix) = trimmed.split_at(split_at);

    let parts: Vec<&str> = numeric.split('.').collect();
    if parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(Error::invalid_version(raw));
    }

    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);

    Version::parse(&padded).map_err(|_| Error::invalid_version(raw))
}
