//! # forgeport-packages
//!
//! Turns vendor bundles into published, per-platform packages:
//!
//! - [`layout`]: find `{kind}_{os}_{arch}` package directories
//! - [`descriptor`]: parse and validate `project.yaml`
//! - [`version`]: classify a candidate against the published line
//! - [`templates`]: config templates, variable schemas and resolution
//! - [`inject`] / [`builder`]: certificates, launcher scripts, proxy seeding
//! - [`publish`]: storage upload plus registry commit with rollback
//! - [`pipeline`]: the end-to-end run
//! - [`signature`]: dirty tracking for named resources

pub mod builder;
pub mod descriptor;
pub mod inject;
pub mod layout;
pub mod pipeline;
pub mod port_range;
pub mod publish;
pub mod signature;
pub mod support_files;
pub mod templates;
pub mod version;

pub use builder::{arcname, classify_tree, ensure_single_kind, ArtifactBuilder};
pub use descriptor::{parse, ParseOutcome, ParsedPackage, RejectReason};
pub use layout::{resolve_layout, LayoutReport, PackageUnit};
pub use pipeline::{
    DescribeReport, PipelineOptions, PipelineOutcome, PipelineRun, UnitDescription,
    UnitDiagnostic,
};
pub use publish::{publish, PackedArtifact, PublishTransaction};
pub use signature::{compute_signature, SignatureState, SignatureTracker};
pub use templates::{latest_for_package, resolve_latest, ConfigTemplateEntry};
pub use version::{classify, VersionClass, VersionDecision};
