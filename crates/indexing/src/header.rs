//! Format-independent view of a raster file's header.

use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

use geotiff_parser::{CrsKind, GeoTiffError, GeoTiffHeader};
use netcdf_parser::{nc_type_name, NetCdfError, NetCdfFile};
use raster_common::BoundingBox;

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("GeoTIFF parse error: {0}")]
    GeoTiff(#[from] GeoTiffError),

    #[error("NetCDF parse error: {0}")]
    NetCdf(#[from] NetCdfError),

    #[error("Unsupported raster extension '{0}'")]
    UnsupportedExtension(String),
}

/// What the normalizer needs from any raster header, regardless of
/// container format.
#[derive(Debug, Clone)]
pub struct RasterHeader {
    /// CRS identifier such as "EPSG:4326", or "unknown" when the file
    /// carries no usable CRS tag.
    pub crs: String,
    /// Whether `bounds` is expressed in geographic degrees.
    pub geographic: bool,
    pub bounds: BoundingBox,
    /// Per-band catalog data type names. Empty for container formats
    /// whose sources carry fixed measurement tables.
    pub band_types: Vec<String>,
    pub nodata: Option<f64>,
    /// Embedded acquisition time, when the format stores one.
    pub time: Option<DateTime<Utc>>,
}

impl RasterHeader {
    pub fn from_geotiff(header: &GeoTiffHeader) -> Self {
        let (crs, geographic) = match header.crs {
            CrsKind::Geographic(code) => (format!("EPSG:{}", code), true),
            CrsKind::Projected(code) => (format!("EPSG:{}", code), false),
            CrsKind::Unknown => ("unknown".to_string(), false),
        };
        let band_types = header
            .band_data_types()
            .iter()
            .map(|t| t.unwrap_or("unknown").to_string())
            .collect();

        Self {
            crs,
            geographic,
            bounds: header.bounds,
            band_types,
            nodata: header.nodata,
            time: None,
        }
    }

    pub fn from_netcdf(file: &NetCdfFile<'_>) -> Result<Self, NetCdfError> {
        let bounds = file.geographic_bounds()?;
        let time = file.first_time()?;

        // Grid variables only; 1-D coordinate variables describe axes,
        // not measurements.
        let band_types = file
            .header
            .variables
            .iter()
            .filter(|v| v.dimension_ids.len() >= 2)
            .map(|v| nc_type_name(v.nc_type).to_string())
            .collect();

        Ok(Self {
            crs: "EPSG:4326".to_string(),
            geographic: true,
            bounds,
            band_types,
            nodata: None,
            time,
        })
    }
}

/// Parse the header of an in-memory raster, dispatching on extension.
pub fn summarize_raster(path: &Path, data: &[u8]) -> Result<RasterHeader, HeaderError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "tif" | "tiff" => Ok(RasterHeader::from_geotiff(&GeoTiffHeader::parse(data)?)),
        "nc" => Ok(RasterHeader::from_netcdf(&NetCdfFile::parse(data)?)?),
        other => Err(HeaderError::UnsupportedExtension(other.to_string())),
    }
}

/// Read a file and parse its raster header.
pub async fn read_raster_header(path: &Path) -> Result<RasterHeader, HeaderError> {
    let data = Bytes::from(tokio::fs::read(path).await?);
    summarize_raster(path, &data)
}
