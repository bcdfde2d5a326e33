use super::types::ImageStatus;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading, writing, or mutating the manifest
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Corrupt manifest at {}: {reason}", path.display())]
    CorruptManifest { path: PathBuf, reason: String },

    #[error("Failed to serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("No manifest entry for version {0}")]
    UnknownVersion(String),

    #[error("Invalid status transition for {version}: {from} -> {to}")]
    InvalidTransition {
        version: String,
        from: ImageStatus,
        to: ImageStatus,
    },
}

impl ManifestError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ManifestError::Io {
            path: path.into(),
            source,
        }
    }
}
