//! Dispatch core for chainferry.
//!
//! This crate routes every container-lifecycle verb to one of two backends:
//! the local container engine for short-lived build/utility containers, or
//! the cluster orchestrator for long-running managed workloads. The
//! [`ContainerRouter`] classifies identifiers and drives the multi-step
//! provisioning flows; the [`ImagePipeline`] builds, pulls, tags, pushes
//! and exports images with all builds serialized behind one lock.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod archive;
pub mod error;
pub mod image;
pub mod router;

pub use error::{ControlError, Result};
pub use image::{ImageMode, ImagePipeline, PipelineConfig};
pub use router::{ContainerRouter, Created, RouterConfig};
