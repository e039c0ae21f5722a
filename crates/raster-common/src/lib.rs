//! Common geospatial types shared across the indexer workspace.

pub mod bbox;
pub mod time;

pub use bbox::{BoundingBox, GeometryError};
pub use time::{AcquisitionTime, TimeError};
