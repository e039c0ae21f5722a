//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

/// A geographic or projected bounding box.
///
/// For geographic CRS (EPSG:4326), coordinates are in degrees.
/// For projected CRS, coordinates are in the projection's linear units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Check if a point is contained within this bbox.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Return a copy grown by `margin` on every side.
    pub fn grown(&self, margin: f64) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    /// Validate axis ordering (min <= max) and coordinate finiteness,
    /// independent of CRS.
    pub fn validate_extent(&self) -> Result<(), GeometryError> {
        for v in [self.min_x, self.min_y, self.max_x, self.max_y] {
            if !v.is_finite() {
                return Err(GeometryError::NonFiniteCoordinate(v));
            }
        }
        if self.min_x > self.max_x || self.min_y > self.max_y {
            return Err(GeometryError::InvertedExtent {
                min_x: self.min_x,
                min_y: self.min_y,
                max_x: self.max_x,
                max_y: self.max_y,
            });
        }
        Ok(())
    }

    /// Validate this bbox as geographic degrees.
    ///
    /// Checks extent validity plus coordinate ranges (longitude
    /// [-180, 180], latitude [-90, 90]).
    pub fn validate_geographic(&self) -> Result<(), GeometryError> {
        self.validate_extent()?;
        for x in [self.min_x, self.max_x] {
            if !(-180.0..=180.0).contains(&x) {
                return Err(GeometryError::LongitudeOutOfRange(x));
            }
        }
        for y in [self.min_y, self.max_y] {
            if !(-90.0..=90.0).contains(&y) {
                return Err(GeometryError::LatitudeOutOfRange(y));
            }
        }
        Ok(())
    }

    /// Counter-clockwise closed ring of the four corners.
    ///
    /// First and last vertex are identical, matching the polygon
    /// convention the catalog stores.
    pub fn to_ring(&self) -> [[f64; 2]; 5] {
        [
            [self.min_x, self.min_y],
            [self.max_x, self.min_y],
            [self.max_x, self.max_y],
            [self.min_x, self.max_y],
            [self.min_x, self.min_y],
        ]
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("Inverted extent: min ({min_x}, {min_y}) exceeds max ({max_x}, {max_y})")]
    InvertedExtent {
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    },

    #[error("Longitude out of range: {0}")]
    LongitudeOutOfRange(f64),

    #[error("Latitude out of range: {0}")]
    LatitudeOutOfRange(f64),

    #[error("Non-finite coordinate: {0}")]
    NonFiniteCoordinate(f64),
}
