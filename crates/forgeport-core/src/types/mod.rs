//! Domain types shared across the pipeline crates

mod package;
mod platform;
mod signature;
mod template;

pub use package::{
    package_file_name, ControlCommands, PackageKey, PackageRecord, PluginDescriptorRecord,
    ProcessControlRecord, SupportFileKind, SupportFileRecord,
};
pub use platform::{ArtifactKind, Category, CpuArch, Platform, PlatformTarget};
pub use signature::ResourceSignatureState;
pub use template::{
    ConfigTemplateRecord, VariableDefault, VariableNode, VariableType, WILDCARD_VERSION,
};
