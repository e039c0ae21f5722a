//! GeoTIFF header parsing.
//!
//! Reads the TIFF preamble and the first IFD, then interprets the
//! GeoTIFF georeferencing tags. Strip/tile offsets and image data are
//! ignored.

use raster_common::BoundingBox;
use tracing::trace;

use crate::tags::*;
use crate::{GeoTiffError, GeoTiffResult};

/// Coordinate reference system identification from the GeoKey directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsKind {
    /// Geographic CRS (degrees), with its EPSG code.
    Geographic(u16),
    /// Projected CRS (linear units), with its EPSG code.
    Projected(u16),
    /// No usable GeoKey directory.
    Unknown,
}

impl CrsKind {
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsKind::Geographic(_))
    }
}

/// Parsed GeoTIFF header.
#[derive(Debug, Clone)]
pub struct GeoTiffHeader {
    pub width: u32,
    pub height: u32,
    pub band_count: u32,
    /// Bits per sample, one entry per band.
    pub bits_per_sample: Vec<u16>,
    /// TIFF sample format codes (tag 339), one entry per band.
    pub sample_formats: Vec<u16>,
    pub crs: CrsKind,
    /// Extent in CRS units, derived from the georeferencing tags.
    pub bounds: BoundingBox,
    /// Pixel size in CRS units (x, y).
    pub resolution: (f64, f64),
    /// GDAL nodata marker (tag 42113), if present.
    pub nodata: Option<f64>,
}

impl GeoTiffHeader {
    /// Parse a GeoTIFF header from the start of a file's bytes.
    pub fn parse(data: &[u8]) -> GeoTiffResult<Self> {
        parse_header(data)
    }

    /// Catalog data type name per band, where the bit depth and sample
    /// format map to a known type.
    pub fn band_data_types(&self) -> Vec<Option<&'static str>> {
        self.bits_per_sample
            .iter()
            .zip(self.sample_formats.iter())
            .map(|(&bits, &format)| data_type_name(bits, format))
            .collect()
    }
}

/// One 12-byte IFD entry. `value_offset` is the absolute offset of the
/// entry's 4 value-or-pointer bytes, not the value itself.
#[derive(Debug, Clone, Copy)]
struct IfdEntry {
    tag: u16,
    field_type: u16,
    count: u32,
    value_offset: usize,
}

/// Endianness-aware reader over the raw file bytes.
struct Reader<'a> {
    data: &'a [u8],
    little_endian: bool,
}

impl<'a> Reader<'a> {
    fn need(&self, offset: usize, len: usize) -> GeoTiffResult<&'a [u8]> {
        self.data
            .get(offset..offset + len)
            .ok_or(GeoTiffError::Truncated {
                offset,
                needed: len,
            })
    }

    fn u16_at(&self, offset: usize) -> GeoTiffResult<u16> {
        let b = self.need(offset, 2)?;
        Ok(if self.little_endian {
            u16::from_le_bytes([b[0], b[1]])
        } else {
            u16::from_be_bytes([b[0], b[1]])
        })
    }

    fn u32_at(&self, offset: usize) -> GeoTiffResult<u32> {
        let b = self.need(offset, 4)?;
        Ok(if self.little_endian {
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        } else {
            u32::from_be_bytes([b[0], b[1], b[2], b[3]])
        })
    }

    fn f64_at(&self, offset: usize) -> GeoTiffResult<f64> {
        let b = self.need(offset, 8)?;
        let bytes = [b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]];
        Ok(if self.little_endian {
            f64::from_le_bytes(bytes)
        } else {
            f64::from_be_bytes(bytes)
        })
    }

    /// Absolute offset of an entry's value array. Values totalling four
    /// bytes or fewer are stored inline in the entry itself.
    fn value_location(&self, entry: &IfdEntry) -> GeoTiffResult<usize> {
        let unit = field_type_size(entry.field_type);
        if unit == 0 {
            return Err(GeoTiffError::InvalidTag {
                tag: entry.tag,
                reason: format!("unknown field type {}", entry.field_type),
            });
        }
        let total = entry.count as usize * unit;
        if total <= 4 {
            Ok(entry.value_offset)
        } else {
            Ok(self.u32_at(entry.value_offset)? as usize)
        }
    }

    /// Read an unsigned scalar stored as SHORT or LONG (tags like
    /// ImageWidth come in either type).
    fn read_unsigned(&self, entry: &IfdEntry) -> GeoTiffResult<u32> {
        let at = self.value_location(entry)?;
        match entry.field_type {
            TYPE_SHORT => Ok(self.u16_at(at)? as u32),
            TYPE_LONG => self.u32_at(at),
            other => Err(GeoTiffError::InvalidTag {
                tag: entry.tag,
                reason: format!("expected SHORT or LONG, got type {}", other),
            }),
        }
    }

    fn read_shorts(&self, entry: &IfdEntry) -> GeoTiffResult<Vec<u16>> {
        if entry.field_type != TYPE_SHORT {
            return Err(GeoTiffError::InvalidTag {
                tag: entry.tag,
                reason: format!("expected SHORT, got type {}", entry.field_type),
            });
        }
        let at = self.value_location(entry)?;
        (0..entry.count as usize)
            .map(|i| self.u16_at(at + i * 2))
            .collect()
    }

    fn read_doubles(&self, entry: &IfdEntry) -> GeoTiffResult<Vec<f64>> {
        if entry.field_type != TYPE_DOUBLE {
            return Err(GeoTiffError::InvalidTag {
                tag: entry.tag,
                reason: format!("expected DOUBLE, got type {}", entry.field_type),
            });
        }
        let at = self.value_location(entry)?;
        (0..entry.count as usize)
            .map(|i| self.f64_at(at + i * 8))
            .collect()
    }

    fn read_ascii(&self, entry: &IfdEntry) -> GeoTiffResult<String> {
        if entry.field_type != TYPE_ASCII {
            return Err(GeoTiffError::InvalidTag {
                tag: entry.tag,
                reason: format!("expected ASCII, got type {}", entry.field_type),
            });
        }
        let at = self.value_location(entry)?;
        let raw = self.need(at, entry.count as usize)?;
        let text: String = raw
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| b as char)
            .collect();
        Ok(text)
    }
}

fn parse_header(data: &[u8]) -> GeoTiffResult<GeoTiffHeader> {
    // Octets 0-1: byte-order marker
    if data.len() < 8 {
        return Err(GeoTiffError::Truncated {
            offset: 0,
            needed: 8,
        });
    }
    let little_endian = match &data[0..2] {
        b"II" => true,
        b"MM" => false,
        other => return Err(GeoTiffError::InvalidByteOrder([other[0], other[1]])),
    };
    let reader = Reader {
        data,
        little_endian,
    };

    // Octets 2-3: magic number (42 classic, 43 BigTIFF)
    let magic = reader.u16_at(2)?;
    if magic == 43 {
        return Err(GeoTiffError::BigTiff);
    }
    if magic != 42 {
        return Err(GeoTiffError::InvalidMagic(magic));
    }

    // Octets 4-7: offset of the first IFD
    let ifd_offset = reader.u32_at(4)? as usize;
    let entry_count = reader.u16_at(ifd_offset)? as usize;

    let mut entries = Vec::with_capacity(entry_count);
    for i in 0..entry_count {
        let at = ifd_offset + 2 + i * 12;
        entries.push(IfdEntry {
            tag: reader.u16_at(at)?,
            field_type: reader.u16_at(at + 2)?,
            count: reader.u32_at(at + 4)?,
            value_offset: at + 8,
        });
    }

    let find = |tag: u16| entries.iter().find(|e| e.tag == tag);

    let width = find(TAG_IMAGE_WIDTH)
        .ok_or(GeoTiffError::MissingTag("ImageWidth"))
        .and_then(|e| reader.read_unsigned(e))?;
    let height = find(TAG_IMAGE_LENGTH)
        .ok_or(GeoTiffError::MissingTag("ImageLength"))
        .and_then(|e| reader.read_unsigned(e))?;

    let band_count = match find(TAG_SAMPLES_PER_PIXEL) {
        Some(e) => reader.read_unsigned(e)?,
        None => 1,
    };

    let bits_per_sample = match find(TAG_BITS_PER_SAMPLE) {
        Some(e) => reader.read_shorts(e)?,
        None => vec![8; band_count as usize],
    };

    // Tag 339 defaults to unsigned integer when absent.
    let sample_formats = match find(TAG_SAMPLE_FORMAT) {
        Some(e) => reader.read_shorts(e)?,
        None => vec![1; band_count as usize],
    };

    let nodata = match find(TAG_GDAL_NODATA) {
        Some(e) => parse_nodata(&reader.read_ascii(e)?),
        None => None,
    };

    let crs = match find(TAG_GEO_KEY_DIRECTORY) {
        Some(e) => parse_geo_keys(&reader.read_shorts(e)?),
        None => CrsKind::Unknown,
    };

    let (bounds, resolution) = derive_bounds(&reader, &entries, width, height)?;

    trace!(
        width,
        height,
        band_count,
        "parsed GeoTIFF header ({} IFD entries)",
        entry_count
    );

    Ok(GeoTiffHeader {
        width,
        height,
        band_count,
        bits_per_sample,
        sample_formats,
        crs,
        bounds,
        resolution,
        nodata,
    })
}

/// Derive the raster extent from ModelTransformation or from
/// ModelTiepoint + ModelPixelScale.
fn derive_bounds(
    reader: &Reader<'_>,
    entries: &[IfdEntry],
    width: u32,
    height: u32,
) -> GeoTiffResult<(BoundingBox, (f64, f64))> {
    let find = |tag: u16| entries.iter().find(|e| e.tag == tag);

    if let Some(e) = find(TAG_MODEL_TRANSFORMATION) {
        let m = reader.read_doubles(e)?;
        if m.len() != 16 {
            return Err(GeoTiffError::InvalidTag {
                tag: TAG_MODEL_TRANSFORMATION,
                reason: format!("expected 16 doubles, got {}", m.len()),
            });
        }
        // Row-major 4x4 affine: X = m0*i + m1*j + m3, Y = m4*i + m5*j + m7
        let corner = |i: f64, j: f64| (m[0] * i + m[1] * j + m[3], m[4] * i + m[5] * j + m[7]);
        let (w, h) = (width as f64, height as f64);
        let corners = [corner(0.0, 0.0), corner(w, 0.0), corner(0.0, h), corner(w, h)];
        let bounds = BoundingBox::new(
            corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min),
            corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min),
            corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max),
            corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max),
        );
        return Ok((bounds, (m[0].abs(), m[5].abs())));
    }

    let scale = find(TAG_MODEL_PIXEL_SCALE);
    let tiepoint = find(TAG_MODEL_TIEPOINT);
    let (scale, tiepoint) = match (scale, tiepoint) {
        (Some(s), Some(t)) => (reader.read_doubles(s)?, reader.read_doubles(t)?),
        _ => return Err(GeoTiffError::MissingGeoreference),
    };
    if scale.len() < 2 {
        return Err(GeoTiffError::InvalidTag {
            tag: TAG_MODEL_PIXEL_SCALE,
            reason: format!("expected at least 2 doubles, got {}", scale.len()),
        });
    }
    if tiepoint.len() < 6 {
        return Err(GeoTiffError::InvalidTag {
            tag: TAG_MODEL_TIEPOINT,
            reason: format!("expected at least 6 doubles, got {}", tiepoint.len()),
        });
    }

    // Tiepoint maps raster (i, j) to model (x, y); scale is the pixel
    // size with y positive downward in raster space.
    let (sx, sy) = (scale[0], scale[1]);
    let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
    let upper_left_x = x - i * sx;
    let upper_left_y = y + j * sy;
    let bounds = BoundingBox::new(
        upper_left_x,
        upper_left_y - height as f64 * sy,
        upper_left_x + width as f64 * sx,
        upper_left_y,
    );
    Ok((bounds, (sx, sy)))
}

/// Interpret the GeoKeyDirectory shorts (tag 34735).
///
/// Layout: a 4-short header {version, revision, minor, key count}
/// followed by one 4-short record per key {key id, tag location,
/// count, value}. Keys we consume are SHORT-valued (tag location 0).
fn parse_geo_keys(shorts: &[u16]) -> CrsKind {
    if shorts.len() < 4 {
        return CrsKind::Unknown;
    }
    let key_count = shorts[3] as usize;

    let mut model_type = None;
    let mut geographic_crs = None;
    let mut projected_crs = None;

    for k in 0..key_count {
        let at = 4 + k * 4;
        if at + 4 > shorts.len() {
            break;
        }
        let (key_id, location, value) = (shorts[at], shorts[at + 1], shorts[at + 3]);
        if location != 0 {
            continue;
        }
        match key_id {
            KEY_MODEL_TYPE => model_type = Some(value),
            KEY_GEOGRAPHIC_TYPE => geographic_crs = Some(value),
            KEY_PROJECTED_CS_TYPE => projected_crs = Some(value),
            _ => {}
        }
    }

    match model_type {
        Some(MODEL_TYPE_GEOGRAPHIC) => CrsKind::Geographic(geographic_crs.unwrap_or(4326)),
        Some(MODEL_TYPE_PROJECTED) => CrsKind::Projected(projected_crs.unwrap_or(0)),
        _ => CrsKind::Unknown,
    }
}

/// GDAL writes nodata as ASCII, including "nan" for float rasters.
fn parse_nodata(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    trimmed.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_short_input() {
        assert!(matches!(
            GeoTiffHeader::parse(b"II"),
            Err(GeoTiffError::Truncated { .. })
        ));
    }

    #[test]
    fn test_reject_bad_byte_order() {
        let data = [b'X', b'X', 42, 0, 8, 0, 0, 0];
        assert!(matches!(
            GeoTiffHeader::parse(&data),
            Err(GeoTiffError::InvalidByteOrder(_))
        ));
    }

    #[test]
    fn test_reject_bigtiff() {
        let data = [b'I', b'I', 43, 0, 8, 0, 0, 0];
        assert!(matches!(
            GeoTiffHeader::parse(&data),
            Err(GeoTiffError::BigTiff)
        ));
    }

    #[test]
    fn test_geo_keys_geographic() {
        // header + one key: GTModelType = geographic
        let shorts = [1, 1, 0, 1, KEY_MODEL_TYPE, 0, 1, MODEL_TYPE_GEOGRAPHIC];
        assert_eq!(parse_geo_keys(&shorts), CrsKind::Geographic(4326));

        let shorts = [
            1, 1, 0, 2, //
            KEY_MODEL_TYPE, 0, 1, MODEL_TYPE_GEOGRAPHIC, //
            KEY_GEOGRAPHIC_TYPE, 0, 1, 4258,
        ];
        assert_eq!(parse_geo_keys(&shorts), CrsKind::Geographic(4258));
    }

    #[test]
    fn test_geo_keys_projected() {
        let shorts = [
            1, 1, 0, 2, //
            KEY_MODEL_TYPE, 0, 1, MODEL_TYPE_PROJECTED, //
            KEY_PROJECTED_CS_TYPE, 0, 1, 32633,
        ];
        assert_eq!(parse_geo_keys(&shorts), CrsKind::Projected(32633));
    }

    #[test]
    fn test_nodata_values() {
        assert_eq!(parse_nodata("0"), Some(0.0));
        assert_eq!(parse_nodata("-32767 "), Some(-32767.0));
        assert!(parse_nodata("nan").map(f64::is_nan).unwrap_or(false));
        assert_eq!(parse_nodata("not-a-number"), None);
    }
}
