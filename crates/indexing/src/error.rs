//! Error types for the indexing pipeline.
//!
//! Three tiers with different blast radius: [`ConfigError`] aborts the
//! process before any I/O, [`SourceError`] fails one source and lets
//! the run continue, and [`ParseFailure`] fails one file and lets the
//! source continue.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration problems detected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Source '{source_id}' expects {expected} product name(s), got {actual}")]
    ProductNameArity {
        source_id: String,
        expected: usize,
        actual: usize,
    },

    #[error("No loader registered for source '{0}'")]
    UnknownSource(String),

    #[error("Data root {} does not exist", .0.display())]
    MissingDataRoot(PathBuf),
}

/// Failures that end one source's run but not the sweep.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Source folder {} does not exist", .0.display())]
    FolderMissing(PathBuf),

    #[error("Configured file {} is missing", .0.display())]
    MissingFile(PathBuf),

    #[error("Failed to walk source folder: {0}")]
    Walk(String),

    #[error("Product '{name}' already exists with an incompatible schema")]
    IncompatibleProduct { name: String },

    #[error("Remote fetch failed: {0}")]
    Fetch(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] catalog::CatalogError),
}

pub type SourceResult<T> = Result<T, SourceError>;

/// One file that could not be turned into a catalog record.
///
/// Counted per source and sampled into the final report; never fatal.
#[derive(Debug, Clone, Error)]
#[error("{}: {reason}", .path.display())]
pub struct ParseFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl ParseFailure {
    pub fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
