//! Configuration loading and types

mod loader;
mod pipeline;

pub use loader::ConfigLoader;
pub use pipeline::{
    ControlScriptConfig, InstallPaths, InstallPathsConfig, LinuxAutoType, PipelineConfig,
};
