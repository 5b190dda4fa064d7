//! Error types for forgeport-core

use thiserror::Error;

/// Result type alias using forgeport-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for Forgeport
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration format
    #[error("Invalid configuration format: {message}")]
    InvalidConfig { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive entry escapes the extraction root
    #[error("Unsafe archive entry rejected: {entry}")]
    UnsafeArchive { entry: String },

    /// Candidate version does not update the published line
    #[error(
        "Package at {path} parsed as version {version}, latest version is {release_version}: update check failed"
    )]
    PackageVersionValidation {
        path: String,
        version: String,
        release_version: String,
    },

    /// Required upstream artifact has not been published
    #[error("Missing dependency: {message}")]
    MissingDependency { message: String },

    /// Expected file is absent
    #[error("File does not exist: {path}")]
    FileNotExist { path: String },

    /// Storage returned a path other than the deterministic publish path
    #[error("Package saved to {actual}, expected {expected}")]
    PackageSaveMismatch { expected: String, actual: String },

    /// Storage backend failure
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// Registry backend failure
    #[error("Registry error: {message}")]
    Registry { message: String },

    /// Variable schema validation error
    #[error("Schema validation failed: {message}")]
    SchemaValidation { message: String },

    /// Port range declaration is malformed
    #[error("Invalid port range '{range}': {reason}")]
    InvalidPortRange { range: String, reason: String },

    /// Invalid semver version
    #[error("Invalid version format: {version}")]
    InvalidVersion { version: String },

    /// Extracted tree matches no known bundle layout
    #[error("Unrecognized bundle layout under {path}")]
    UnrecognizedLayout { path: String },

    /// Bundle holds units of a kind other than the one it was classified as
    #[error("{kind} bundle also contains {unit}")]
    MixedBundle { kind: String, unit: String },
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an unsafe archive error
    pub fn unsafe_archive(entry: impl Into<String>) -> Self {
        Self::UnsafeArchive {
            entry: entry.into(),
        }
    }

    /// Create a version validation error
    pub fn version_validation(
        path: impl Into<String>,
        version: impl Into<String>,
        release_version: impl Into<String>,
    ) -> Self {
        Self::PackageVersionValidation {
            path: path.into(),
            version: version.into(),
            release_version: release_version.into(),
        }
    }

    /// Create a missing dependency error
    pub fn missing_dependency(message: impl Into<String>) -> Self {
        Self::MissingDependency {
            message: message.into(),
        }
    }

    /// Create a file not exist error
    pub fn file_not_exist(path: impl Into<String>) -> Self {
        Self::FileNotExist { path: path.into() }
    }

    /// Create a save mismatch error
    pub fn save_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::PackageSaveMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a registry error
    pub fn registry(message: impl Into<String>) -> Self {
        Self::Registry {
            message: message.into(),
        }
    }

    /// Create a schema validation error
    pub fn schema_validation(message: impl Into<String>) -> Self {
        Self::SchemaValidation {
            message: message.into(),
        }
    }

    /// Create a port range error
    pub fn invalid_port_range(range: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPortRange {
            range: range.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid version error
    pub fn invalid_version(version: impl Into<String>) -> Self {
        Self::InvalidVersion {
            version: version.into(),
        }
    }

    /// Create an unrecognized layout error
    pub fn unrecognized_layout(path: impl Into<String>) -> Self {
        Self::UnrecognizedLayout { path: path.into() }
    }

    /// Create a mixed bundle error
    pub fn mixed_bundle(kind: impl ToString, unit: impl Into<String>) -> Self {
        Self::MixedBundle {
            kind: kind.to_string(),
            unit: unit.into(),
        }
    }

    /// Whether this error only invalidates the package unit that raised it.
    ///
    /// Publish-side failures (storage, registry, save mismatch) and unsafe
    /// archives stop the whole run instead.
    pub fn is_unit_scoped(&self) -> bool {
        matches!(
            self,
            Self::PackageVersionValidation { .. }
                | Self::MissingDependency { .. }
                | Self::FileNotExist { .. }
                | Self::SchemaValidation { .. }
                | Self::InvalidPortRange { .. }
                | Self::InvalidVersion { .. }
        )
    }
}
