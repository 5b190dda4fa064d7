//! Platform, CPU architecture and artifact classification enums

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operating system a package targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Windows,
    Aix,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Linux, Platform::Windows, Platform::Aix];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Windows => "windows",
            Platform::Aix => "aix",
        }
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, Platform::Windows)
    }

    /// Path separator used when composing on-host paths
    pub fn path_separator(&self) -> &'static str {
        if self.is_windows() {
            "\\"
        } else {
            "/"
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "linux" => Ok(Platform::Linux),
            "windows" => Ok(Platform::Windows),
            "aix" => Ok(Platform::Aix),
            other => Err(Error::invalid_config(format!("Unknown platform: {}", other))),
        }
    }
}

/// CPU architecture a package targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CpuArch {
    #[serde(rename = "x86_64")]
    X86_64,
    #[serde(rename = "x86")]
    X86,
    #[serde(rename = "powerpc")]
    PowerPc,
    #[serde(rename = "aarch64")]
    Aarch64,
}

impl CpuArch {
    pub const ALL: [CpuArch; 4] = [
        CpuArch::X86_64,
        CpuArch::X86,
        CpuArch::PowerPc,
        CpuArch::Aarch64,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CpuArch::X86_64 => "x86_64",
            CpuArch::X86 => "x86",
            CpuArch::PowerPc => "powerpc",
            CpuArch::Aarch64 => "aarch64",
        }
    }
}

impl fmt::Display for CpuArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CpuArch {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "x86_64" => Ok(CpuArch::X86_64),
            "x86" => Ok(CpuArch::X86),
            "powerpc" => Ok(CpuArch::PowerPc),
            "aarch64" => Ok(CpuArch::Aarch64),
            other => Err(Error::invalid_config(format!(
                "Unknown cpu architecture: {}",
                other
            ))),
        }
    }
}

/// A `(platform, arch)` pair, written `os_arch` in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlatformTarget {
    pub platform: Platform,
    pub arch: CpuArch,
}

impl PlatformTarget {
    pub fn new(platform: Platform, arch: CpuArch) -> Self {
        Self { platform, arch }
    }
}

impl fmt::Display for PlatformTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.platform, self.arch)
    }
}

impl FromStr for PlatformTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        // arch tokens may contain '_' (x86_64), the os token never does
        let (os, arch) = s.trim().split_once('_').ok_or_else(|| {
            Error::invalid_config(format!("Platform target must be os_arch, got: {}", s))
        })?;
        Ok(Self {
            platform: os.parse()?,
            arch: arch.parse()?,
        })
    }
}

impl TryFrom<String> for PlatformTarget {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PlatformTarget> for String {
    fn from(value: PlatformTarget) -> Self {
        value.to_string()
    }
}

/// Which builder handles an uploaded bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Plugin,
    Agent,
    Proxy,
}

impl ArtifactKind {
    /// Directory token used in bundle layouts (`plugins_linux_x86_64`, `agent_...`)
    pub fn layout_token(&self) -> &'static str {
        match self {
            ArtifactKind::Plugin => "plugins",
            ArtifactKind::Agent => "agent",
            ArtifactKind::Proxy => "proxy",
        }
    }

    pub fn from_layout_token(token: &str) -> Option<Self> {
        match token {
            "plugins" => Some(ArtifactKind::Plugin),
            "agent" => Some(ArtifactKind::Agent),
            "proxy" => Some(ArtifactKind::Proxy),
            _ => None,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactKind::Plugin => "plugin",
            ArtifactKind::Agent => "agent",
            ArtifactKind::Proxy => "proxy",
        };
        f.write_str(name)
    }
}

/// Descriptor category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Official,
    External,
    Scripts,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Official => "official",
            Category::External => "external",
            Category::Scripts => "scripts",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "official" => Ok(Category::Official),
            "external" => Ok(Category::External),
            "scripts" => Ok(Category::Scripts),
            other => Err(Error::invalid_config(format!("Unknown category: {}", other))),
        }
    }
}
