//! NetCDF header parser for gridded model output.
//!
//! This crate reads the header of classic NetCDF files (CDF-1 and
//! CDF-2): dimensions, attributes, variable declarations, and the data
//! offsets needed to pull individual coordinate values. It is enough to
//! derive a grid's bounds, reference time, and band metadata without
//! decoding any data slabs.
//!
//! # Implementation Notes
//!
//! The reader is self-contained; it does not link the NetCDF C library
//! and cannot open NetCDF-4 (HDF5) containers. Those are detected by
//! signature and rejected with a clear error so callers can surface the
//! unsupported format instead of a parse failure deep in the header.

pub mod classic;
pub mod error;

pub use classic::{
    nc_type_name, nc_type_size, parse_cf_time_units, Attribute, AttributeValue, Dimension,
    NetCdfFile, NetCdfHeader, Variable,
};
pub use error::{NetCdfError, NetCdfResult};
