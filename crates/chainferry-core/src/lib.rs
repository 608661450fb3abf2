//! Core types and pure functions for chainferry.
//!
//! This crate is the dependency-free leaf of the workspace. It provides:
//!
//! - **Identifier classification**: deciding whether an opaque lifecycle
//!   identifier names an engine-managed container or a managed workload
//! - **Workload naming**: deterministic derivation of orchestrator-legal
//!   object names from caller-supplied workload references
//!
//! # Example
//!
//! ```
//! use chainferry_core::{classify, derive_workload_name, IdentifierKind};
//!
//! let id = "dev.peer0.org1.mycc.v1.0";
//! assert_eq!(classify(id), IdentifierKind::WorkloadRef);
//! assert_eq!(derive_workload_name("dev.peer0.org1"), "dev-peer0-org1");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod names;

pub use names::{
    classify, derive_workload_name, IdentifierKind, WORKLOAD_NAME_MAX_LEN, WORKLOAD_NAME_PREFIX,
};
