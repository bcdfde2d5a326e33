//! Production implementations of the collaborator traits
//!
//! - [`HttpReleaseScraper`] and [`HttpRootFsDownloader`] talk to the Alpine mirrors over
//!   `reqwest`.
//! - [`DockerCliBuilder`] and [`DockerManifestComposer`] shell out to `docker buildx`.
//! - [`BollardHealthChecker`] and [`BollardRegistryPusher`] use the Docker Engine API.
//! - [`GitCliSync`] shells out to `git`.

pub mod command;
pub mod docker;
pub mod downloader;
pub mod git;
pub mod health;
pub mod pusher;
pub mod scraper;

pub use docker::{DockerCliBuilder, DockerManifestComposer};
pub use downloader::HttpRootFsDownloader;
pub use git::GitCliSync;
pub use health::BollardHealthChecker;
pub use pusher::BollardRegistryPusher;
pub use scraper::HttpReleaseScraper;
