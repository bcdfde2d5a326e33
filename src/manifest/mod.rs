//! Build manifest: data model, persistence, merge and planning.
//!
//! The manifest is stored as a single JSON document and is append-only: once a release
//! is recorded it stays, whatever happens upstream.

pub mod errors;
pub mod merge;
pub mod planner;
pub mod store;
pub mod types;

pub use errors::ManifestError;
pub use merge::{merge_active_into_manifest, MergeOutcome};
pub use planner::{images_to_process, stats, ManifestStats};
pub use store::{ManifestSession, ManifestStore};
pub use types::{ImageEntry, ImageStatus, Manifest, Transition};
