use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image {path} could not be processed: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid JSON in {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, AuditError>;

/// Failures reported by a [`crate::page::PageProbe`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("no element matches {0}")]
    NotFound(String),
    #[error("element {selector} not attached within {waited:?}")]
    Timeout { selector: String, waited: Duration },
    #[error("page query failed: {0}")]
    Query(String),
}
