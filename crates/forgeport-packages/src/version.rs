//! Version decision engine
//!
//! Decides how a candidate version relates to what is already published for
//! the same project/platform/arch.

use forgeport_core::registry::PackageFilter;
use forgeport_core::types::{CpuArch, Platform};
use forgeport_core::version::parse_lenient;
use forgeport_core::{Registry, Result};
use semver::Version;
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

/// Relationship of a candidate version to the published line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionClass {
    /// Nothing published yet for this target
    New,
    /// Same version already published, released and ready
    OverwriteReleased,
    /// Newer than (or equal to an unreleased) latest version
    Update,
    /// Older than the latest published version
    LowVersion,
}

impl VersionClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionClass::New => "new",
            VersionClass::OverwriteReleased => "overwrite_released",
            VersionClass::Update => "update",
            VersionClass::LowVersion => "low_version",
        }
    }
}

impl fmt::Display for VersionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionDecision {
    pub class: VersionClass,
    /// Candidate for New/OverwriteReleased, otherwise the latest published version
    pub release_version: String,
}

/// Classify `candidate` against the registry.
pub async fn classify(
    project: &str,
    candidate: &str,
    platform: Platform,
    arch: CpuArch,
    registry: &dyn Registry,
) -> Result<VersionDecision> {
    let candidate_version = parse_lenient(candidate)?;
    let records = registry
        .packages(&PackageFilter::for_target(project, platform, arch))
        .await?;

    if records.is_empty() {
        debug!("{} {} is new for {}/{}", project, candidate, platform, arch);
        return Ok(VersionDecision {
            class: VersionClass::New,
            release_version: candidate.to_string(),
        });
    }

    // Same string as the published key, so an overwrite lands on the same object
    if records
        .iter()
        .any(|r| r.is_released_and_ready() && r.key.version == candidate)
    {
        return Ok(VersionDecision {
            class: VersionClass::OverwriteReleased,
            release_version: candidate.to_string(),
        });
    }

    let mut latest: Option<(Version, &str)> = None;
    for record in &records {
        let raw = record.key.version.as_str();
        let parsed = match parse_lenient(raw) {
            Ok(v) => v,
            Err(_) => {
                warn!(
                    "Ignoring unparsable published version {} of {}",
                    raw, project
                );
                continue;
            }
        };
        let is_newer = latest
            .as_ref()
            .is_none_or(|(current, _)| parsed.cmp_precedence(current).is_gt());
        if is_newer {
            latest = Some((parsed, raw));
        }
    }

    let Some((latest_version, latest_raw)) = latest else {
        // every stored version was unparsable
        return Ok(VersionDecision {
            class: VersionClass::New,
            release_version: candidate.to_string(),
        });
    };

    let class = if latest_version.cmp_precedence(&candidate_version).is_gt() {
        VersionClass::LowVersion
    } else {
        VersionClass::Update
    };

    Ok(VersionDecision {
        class,
        release_version: latest_raw.to_string(),
    })
}
