//! alpine-autobuild - manifest-driven builds of multi-architecture Alpine base images
//!
//! A JSON manifest records every supported Alpine release and how far it got through
//! the pipeline (`new → downloaded → built → pushed`, or `failed`). Each run merges the
//! currently supported upstream releases into the manifest, picks the releases that
//! still need work and drives each one through download, build, health check, push and
//! multi-architecture compose, saving the manifest after every step.
//!
//! # Project Structure
//!
//! - [`manifest`]: data model, persistence, merge and planning
//! - [`release`]: upstream releases, architectures and version ordering
//! - [`registry`]: push targets and multi-registry aggregation
//! - [`collaborators`]: traits for everything that touches the outside world
//! - [`orchestrator`]: the per-release pipeline
//! - [`adapters`]: HTTP, docker and git implementations of the collaborators
//! - [`app`]: the run lifecycle around the orchestrator

pub mod adapters;
pub mod app;
pub mod cli;
pub mod collaborators;
pub mod config;
pub mod manifest;
pub mod orchestrator;
pub mod progress;
pub mod registry;
pub mod release;
pub mod util;

pub use app::{RunError, Services};
pub use config::{AutobuildConfig, ConfigError};
pub use manifest::{
    ImageEntry, ImageStatus, Manifest, ManifestError, ManifestSession, ManifestStore,
};
pub use orchestrator::{BuildOrchestrator, OrchestratorOptions, RunSummary};
pub use util::{init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
