//! Common test utilities for forgeport-packages
//!
//! - Manifest builders for `project.yaml` files
//! - Bundle fixtures packed with tar + flate2
//! - In-memory storage and registry doubles

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod builders;
pub mod fixtures;
pub mod mocks;

pub use builders::*;
pub use fixtures::*;
pub use mocks::*;
