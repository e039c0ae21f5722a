//! Error types for NetCDF parsing operations.

use thiserror::Error;

/// Result type for NetCDF parser operations.
pub type NetCdfResult<T> = Result<T, NetCdfError>;

/// Error types for NetCDF parsing.
#[derive(Error, Debug)]
pub enum NetCdfError {
    /// Input ends before a required field
    #[error("Not enough data: need {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    /// First bytes are not a classic CDF signature
    #[error("Invalid magic bytes: {0:?} (expected \"CDF\")")]
    InvalidMagic([u8; 4]),

    /// Recognized but unsupported container flavor
    #[error("Unsupported format: {0}")]
    Unsupported(String),

    /// Structurally invalid header
    #[error("Invalid header at offset {offset}: {reason}")]
    InvalidHeader { offset: usize, reason: String },

    /// Missing required variable or attribute
    #[error("Missing required data: {0}")]
    MissingData(String),
}
