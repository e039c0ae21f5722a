//! Canonicalization of loader output into catalog records.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use catalog::{BandDescriptor, CatalogRecord, RecordValidationError};
use raster_common::AcquisitionTime;

use crate::header::RasterHeader;

/// How far a filename-derived coordinate may fall outside the header
/// bounds before the record is rejected.
pub const GEOMETRY_TOLERANCE_DEGREES: f64 = 0.5;

/// Everything a loader extracts for one file before normalization.
#[derive(Debug, Clone)]
pub struct RecordParts {
    pub product_name: String,
    pub uri: String,
    pub bands: Vec<BandDescriptor>,
    /// Tile center parsed from the file name, when the grammar has one.
    pub filename_center: Option<(f64, f64)>,
    /// Timestamp parsed from the file name.
    pub filename_time: Option<AcquisitionTime>,
    /// Used when neither the file name nor the header supplies a time.
    pub fallback_time: Option<AcquisitionTime>,
    pub extra_metadata: BTreeMap<String, String>,
}

impl RecordParts {
    pub fn new(
        product_name: impl Into<String>,
        uri: impl Into<String>,
        bands: Vec<BandDescriptor>,
    ) -> Self {
        Self {
            product_name: product_name.into(),
            uri: uri.into(),
            bands,
            filename_center: None,
            filename_time: None,
            fallback_time: None,
            extra_metadata: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error(
        "Filename coordinates ({lon}, {lat}) disagree with header bounds by more than {tolerance} degrees"
    )]
    CenterOutsideBounds { lon: f64, lat: f64, tolerance: f64 },

    #[error("No acquisition time could be determined")]
    MissingTime,

    #[error(transparent)]
    InvalidRecord(#[from] RecordValidationError),
}

/// Resolve geometry and time and assemble a validated record.
///
/// Header bounds always win. Filename coordinates, when present and the
/// header is geographic, must land inside the bounds grown by
/// [`GEOMETRY_TOLERANCE_DEGREES`]; disagreement within tolerance keeps
/// the header bounds and is logged, never silent. For non-geographic
/// headers the numeric check is skipped and the coordinates ride along
/// as extra metadata.
pub fn normalize(
    parts: RecordParts,
    header: &RasterHeader,
) -> Result<CatalogRecord, NormalizeError> {
    let bounds = header.bounds;
    let mut extra_metadata = parts.extra_metadata;

    if let Some((lon, lat)) = parts.filename_center {
        if header.geographic {
            if !bounds.grown(GEOMETRY_TOLERANCE_DEGREES).contains_point(lon, lat) {
                return Err(NormalizeError::CenterOutsideBounds {
                    lon,
                    lat,
                    tolerance: GEOMETRY_TOLERANCE_DEGREES,
                });
            }
            if !bounds.contains_point(lon, lat) {
                let delta_lon = (lon - lon.clamp(bounds.min_x, bounds.max_x)).abs();
                let delta_lat = (lat - lat.clamp(bounds.min_y, bounds.max_y)).abs();
                debug!(
                    lon,
                    lat,
                    delta_lon,
                    delta_lat,
                    "Filename coordinates fall outside header bounds within tolerance; keeping header bounds"
                );
            }
        } else {
            debug!(
                crs = %header.crs,
                lon,
                lat,
                "Header is not geographic; skipping coordinate cross-check"
            );
            extra_metadata.insert("filename_lon".to_string(), lon.to_string());
            extra_metadata.insert("filename_lat".to_string(), lat.to_string());
        }
    }

    let time = parts
        .filename_time
        .or_else(|| header.time.map(AcquisitionTime::instant))
        .or(parts.fallback_time)
        .ok_or(NormalizeError::MissingTime)?;

    let record = CatalogRecord {
        product_name: parts.product_name,
        uri: parts.uri,
        crs: header.crs.clone(),
        geometry: bounds,
        time,
        bands: parts.bands,
        extra_metadata,
    };
    record.validate()?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use raster_common::BoundingBox;

    fn header(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> RasterHeader {
        RasterHeader {
            crs: "EPSG:4326".to_string(),
            geographic: true,
            bounds: BoundingBox::new(min_x, min_y, max_x, max_y),
            band_types: vec!["uint16".to_string()],
            nodata: Some(0.0),
            time: None,
        }
    }

    fn parts() -> RecordParts {
        let mut p = RecordParts::new(
            "s2",
            "/data/anthroprotect/tiles/s2/anthropo_21.7-63.7_0.tif",
            vec![BandDescriptor::new("blue", "uint16", 0.0)],
        );
        p.fallback_time = Some(AcquisitionTime::instant(
            Utc.with_ymd_and_hms(2020, 8, 1, 12, 0, 0).unwrap(),
        ));
        p
    }

    #[test]
    fn header_bounds_win_over_filename_center() {
        let mut p = parts();
        p.filename_center = Some((21.7, 63.7));
        let h = header(21.6, 63.6, 21.8, 63.8);

        let record = normalize(p, &h).unwrap();
        assert_eq!(record.geometry, BoundingBox::new(21.6, 63.6, 21.8, 63.8));
    }

    #[test]
    fn center_within_tolerance_keeps_header_bounds() {
        let mut p = parts();
        // 0.3 degrees north of the bounds, inside the 0.5 tolerance.
        p.filename_center = Some((21.7, 64.1));
        let h = header(21.6, 63.6, 21.8, 63.8);

        let record = normalize(p, &h).unwrap();
        assert_eq!(record.geometry, BoundingBox::new(21.6, 63.6, 21.8, 63.8));
    }

    #[test]
    fn center_beyond_tolerance_is_rejected() {
        let mut p = parts();
        p.filename_center = Some((25.0, 63.7));
        let h = header(21.6, 63.6, 21.8, 63.8);

        assert!(matches!(
            normalize(p, &h),
            Err(NormalizeError::CenterOutsideBounds { .. })
        ));
    }

    #[test]
    fn projected_header_skips_cross_check_and_keeps_coordinates() {
        let mut p = parts();
        p.filename_center = Some((21.7, 63.7));
        let h = RasterHeader {
            crs: "EPSG:32632".to_string(),
            geographic: false,
            bounds: BoundingBox::new(399_960.0, 6_790_200.0, 409_800.0, 6_800_040.0),
            band_types: vec!["uint16".to_string()],
            nodata: None,
            time: None,
        };

        let record = normalize(p, &h).unwrap();
        assert_eq!(record.extra_metadata.get("filename_lon").unwrap(), "21.7");
        assert_eq!(record.extra_metadata.get("filename_lat").unwrap(), "63.7");
    }

    #[test]
    fn filename_time_beats_header_time() {
        let mut p = parts();
        let from_name = Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap();
        p.filename_time = Some(AcquisitionTime::instant(from_name));
        let mut h = header(0.0, 0.0, 1.0, 1.0);
        h.time = Some(Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap());

        let record = normalize(p, &h).unwrap();
        assert_eq!(record.time.start(), from_name);
    }

    #[test]
    fn header_time_beats_fallback() {
        let mut p = parts();
        let embedded = Utc.with_ymd_and_hms(2022, 3, 4, 6, 0, 0).unwrap();
        let mut h = header(0.0, 0.0, 1.0, 1.0);
        h.time = Some(embedded);

        let record = normalize(p, &h).unwrap();
        assert_eq!(record.time.start(), embedded);
    }

    #[test]
    fn missing_time_everywhere_is_an_error() {
        let mut p = parts();
        p.fallback_time = None;
        let h = header(0.0, 0.0, 1.0, 1.0);

        assert!(matches!(normalize(p, &h), Err(NormalizeError::MissingTime)));
    }

    #[test]
    fn invalid_geographic_bounds_are_rejected() {
        let p = parts();
        let h = header(170.0, 0.0, 190.0, 1.0);

        assert!(matches!(
            normalize(p, &h),
            Err(NormalizeError::InvalidRecord(_))
        ));
    }
}
