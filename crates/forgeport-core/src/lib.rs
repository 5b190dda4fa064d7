//! # forgeport-core
//!
//! Core library for Forgeport providing:
//! - Error types shared by the pipeline crates
//! - Domain records (packages, process control, config templates, signatures)
//! - Lenient semantic-version parsing
//! - Hierarchical pipeline configuration
//! - Storage and registry collaborator contracts with local implementations

pub mod config;
pub mod error;
pub mod registry;
pub mod storage;
pub mod types;
pub mod version;

pub use config::{ConfigLoader, PipelineConfig};
pub use error::{Error, Result};
pub use registry::{LocalRegistry, Registry, WriteBatch};
pub use storage::{LocalStorage, Storage};
