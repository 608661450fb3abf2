//! Container engine backend for chainferry.
//!
//! This crate provides the [`Engine`] capability trait over the local
//! container engine, together with the [`DockerEngine`] implementation backed
//! by the Docker API. The control plane uses the engine for short-lived
//! build/utility containers and for all image operations (build, pull, tag,
//! push, export); long-running workloads go to the orchestrator instead.
//!
//! # Testing
//!
//! Enable the `test-utils` feature for an in-memory [`MockEngine`] that
//! records calls and needs no Docker daemon.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod docker;
pub mod error;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use config::{EngineConfig, RegistryConfig};
pub use docker::{DockerEngine, Engine};
pub use error::{EngineError, Result};
pub use types::{ContainerSpec, CreatedContainer};

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockEngine;
