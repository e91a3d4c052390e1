//! Error taxonomy for catalog setup, snapshot handling, and format dispatch.
//!
//! Setup errors are fatal to the call that raised them. Per-row load failures
//! inside the materializer never surface here; they are folded into
//! [`crate::materialize::LoadOutcome::Absent`] instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// No registered format handler accepted the path.
    #[error("No handler available for '{}'", .path.display())]
    NoHandlerFound { path: PathBuf },

    /// A configuration file name did not split into `<project>_<layout>`.
    #[error(
        "Malformed configuration name '{}': expected '<project>_<layout>.conf'",
        .path.display()
    )]
    MalformedConfigName { path: PathBuf },

    #[error("No configuration registered for project '{project}' and layout '{layout}'")]
    UnknownLayoutConfig { project: String, layout: String },

    #[error("Unknown configuration for project '{project}'. Available projects are: {available:?}")]
    UnknownProject {
        project: String,
        available: Vec<String>,
    },

    #[error(
        "Unknown representation for project '{project}'. Available projects are: {available:?}"
    )]
    UnknownProjectRepresentation {
        project: String,
        available: Vec<String>,
    },

    #[error("Layout '{layout}' is not yet supported. Available layouts are: {available:?}")]
    UnsupportedLayout {
        layout: String,
        available: Vec<&'static str>,
    },

    #[error("No configuration available for layout '{layout}' in project '{project}'")]
    MissingLayoutConfig { project: String, layout: String },

    #[error("'{}' is not a valid directory", .path.display())]
    InvalidRoot { path: PathBuf },

    /// Read operations never build implicitly; a snapshot must exist.
    #[error(
        "A pre-generated '{layout}' layout for project '{project}' is expected in user mode"
    )]
    LayoutNotPrebuilt { project: String, layout: String },

    #[error("Unrecognized key '{key}' in layout '{layout}'")]
    UnknownKey { layout: String, key: String },

    #[error("One 'filename' column expected in the selection")]
    MissingFilenameColumn,

    #[error("Malformed snapshot name '{}': expected '<project>_<layout>_<Y-M-D>.json'", .path.display())]
    MalformedSnapshotName { path: PathBuf },

    #[error("Snapshot {} is unreadable: {details}", .path.display())]
    SnapshotFormat { path: PathBuf, details: String },

    #[error("Configuration {} is not valid JSON", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration {} failed schema validation:\n{details}", .path.display())]
    ConfigSchema { path: PathBuf, details: String },

    #[error("Entity '{entity}' has an invalid pattern")]
    InvalidPattern {
        entity: String,
        #[source]
        source: regex::Error,
    },

    #[error("I/O error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CatalogError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CatalogError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
