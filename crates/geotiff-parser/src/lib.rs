//! GeoTIFF header parsing (classic TIFF 6.0 with GeoTIFF tags).
//!
//! This crate reads just enough of a GeoTIFF file to catalog it: image
//! dimensions, band layout, georeferencing, CRS identification, and the
//! GDAL nodata marker. It never touches strip or tile data, so a header
//! read is cheap even for large rasters.

pub mod header;
pub mod tags;

pub use header::{CrsKind, GeoTiffHeader};

/// Errors produced while reading a GeoTIFF header.
#[derive(Debug, thiserror::Error)]
pub enum GeoTiffError {
    #[error("Not enough data: need {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("Invalid byte-order marker: {0:?} (expected \"II\" or \"MM\")")]
    InvalidByteOrder([u8; 2]),

    #[error("Invalid TIFF magic number: {0} (expected 42)")]
    InvalidMagic(u16),

    #[error("BigTIFF files are not supported")]
    BigTiff,

    #[error("Invalid entry for tag {tag}: {reason}")]
    InvalidTag { tag: u16, reason: String },

    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    #[error("No georeferencing present (ModelTiepoint/ModelPixelScale or ModelTransformation)")]
    MissingGeoreference,
}

pub type GeoTiffResult<T> = Result<T, GeoTiffError>;
