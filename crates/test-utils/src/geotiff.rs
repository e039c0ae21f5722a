//! GeoTIFF test-file builder.
//!
//! Assembles a classic TIFF with the GeoTIFF tags the indexing pipeline
//! reads: image size, band layout, pixel scale + tiepoint, GeoKey
//! directory, and the GDAL nodata marker. No strip data is written;
//! the result is a header-only file that parses cleanly.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CrsSetting {
    Geographic(u16),
    Projected(u16),
    None,
}

/// Builder for synthetic GeoTIFF files.
///
/// Defaults: 64x64, one uint16 band, WGS84 geographic CRS, bounds
/// (10.0, 50.0) to (11.0, 51.0), little-endian, no nodata marker.
#[derive(Debug, Clone)]
pub struct GeoTiffBuilder {
    width: u32,
    height: u32,
    /// (bits per sample, TIFF sample format code) per band.
    bands: Vec<(u16, u16)>,
    bounds: (f64, f64, f64, f64),
    crs: CrsSetting,
    nodata: Option<String>,
    big_endian: bool,
    georeferenced: bool,
}

impl Default for GeoTiffBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GeoTiffBuilder {
    pub fn new() -> Self {
        Self {
            width: 64,
            height: 64,
            bands: vec![(16, 1)],
            bounds: (10.0, 50.0, 11.0, 51.0),
            crs: CrsSetting::Geographic(4326),
            nodata: None,
            big_endian: false,
            georeferenced: true,
        }
    }

    /// Preset resembling a multispectral imagery tile: ten uint16
    /// bands, nodata 0, a small extent centered on the given point.
    pub fn imagery_tile(center_lon: f64, center_lat: f64) -> Self {
        Self::new()
            .with_size(256, 256)
            .with_bands(10, 16, 1)
            .with_bounds(
                center_lon - 0.0115,
                center_lat - 0.0115,
                center_lon + 0.0115,
                center_lat + 0.0115,
            )
            .with_nodata("0")
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Uniform band layout: `count` bands of the given bit depth and
    /// TIFF sample format code (1 unsigned, 2 signed, 3 float).
    pub fn with_bands(mut self, count: u32, bits: u16, sample_format: u16) -> Self {
        self.bands = vec![(bits, sample_format); count as usize];
        self
    }

    pub fn with_bounds(mut self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        self.bounds = (min_x, min_y, max_x, max_y);
        self
    }

    pub fn with_nodata(mut self, nodata: &str) -> Self {
        self.nodata = Some(nodata.to_string());
        self
    }

    pub fn with_geographic_crs(mut self, epsg: u16) -> Self {
        self.crs = CrsSetting::Geographic(epsg);
        self
    }

    pub fn with_projected_crs(mut self, epsg: u16) -> Self {
        self.crs = CrsSetting::Projected(epsg);
        self
    }

    /// Omit the GeoKey directory entirely.
    pub fn without_crs(mut self) -> Self {
        self.crs = CrsSetting::None;
        self
    }

    /// Omit ModelPixelScale/ModelTiepoint, producing a TIFF with no
    /// georeferencing.
    pub fn without_georeferencing(mut self) -> Self {
        self.georeferenced = false;
        self
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    /// Assemble the file bytes.
    pub fn build(&self) -> Vec<u8> {
        let mut entries: Vec<RawEntry> = Vec::new();
        let band_count = self.bands.len();

        entries.push(self.shorts_entry(256, &[self.width as u16]));
        entries.push(self.shorts_entry(257, &[self.height as u16]));
        let bits: Vec<u16> = self.bands.iter().map(|b| b.0).collect();
        entries.push(self.shorts_entry(258, &bits));
        entries.push(self.shorts_entry(277, &[band_count as u16]));
        let formats: Vec<u16> = self.bands.iter().map(|b| b.1).collect();
        entries.push(self.shorts_entry(339, &formats));

        if self.georeferenced {
            let (min_x, min_y, max_x, max_y) = self.bounds;
            let scale_x = (max_x - min_x) / self.width as f64;
            let scale_y = (max_y - min_y) / self.height as f64;
            entries.push(self.doubles_entry(33550, &[scale_x, scale_y, 0.0]));
            // Tiepoint: raster (0,0) maps to the upper-left corner.
            entries.push(self.doubles_entry(33922, &[0.0, 0.0, 0.0, min_x, max_y, 0.0]));
        }

        match self.crs {
            CrsSetting::Geographic(epsg) => {
                let keys = [1, 1, 0, 2, 1024, 0, 1, 2, 2048, 0, 1, epsg];
                entries.push(self.shorts_entry(34735, &keys));
            }
            CrsSetting::Projected(epsg) => {
                let keys = [1, 1, 0, 2, 1024, 0, 1, 1, 3072, 0, 1, epsg];
                entries.push(self.shorts_entry(34735, &keys));
            }
            CrsSetting::None => {}
        }

        if let Some(nodata) = &self.nodata {
            let mut payload: Vec<u8> = nodata.as_bytes().to_vec();
            payload.push(0);
            entries.push(RawEntry {
                tag: 42113,
                field_type: 2, // ASCII
                count: payload.len() as u32,
                payload,
            });
        }

        entries.sort_by_key(|e| e.tag);
        self.assemble(&entries)
    }

    fn shorts_entry(&self, tag: u16, values: &[u16]) -> RawEntry {
        let mut payload = Vec::with_capacity(values.len() * 2);
        for &v in values {
            self.push_u16(&mut payload, v);
        }
        RawEntry {
            tag,
            field_type: 3, // SHORT
            count: values.len() as u32,
            payload,
        }
    }

    fn doubles_entry(&self, tag: u16, values: &[f64]) -> RawEntry {
        let mut payload = Vec::with_capacity(values.len() * 8);
        for &v in values {
            let bytes = if self.big_endian {
                v.to_be_bytes()
            } else {
                v.to_le_bytes()
            };
            payload.extend_from_slice(&bytes);
        }
        RawEntry {
            tag,
            field_type: 12, // DOUBLE
            count: values.len() as u32,
            payload,
        }
    }

    fn push_u16(&self, buf: &mut Vec<u8>, v: u16) {
        let bytes = if self.big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        };
        buf.extend_from_slice(&bytes);
    }

    fn push_u32(&self, buf: &mut Vec<u8>, v: u32) {
        let bytes = if self.big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        };
        buf.extend_from_slice(&bytes);
    }

    /// Lay out header, IFD, and external value area.
    fn assemble(&self, entries: &[RawEntry]) -> Vec<u8> {
        let ifd_offset = 8usize;
        let ifd_len = 2 + entries.len() * 12 + 4;
        let external_base = ifd_offset + ifd_len;

        let mut out = Vec::new();
        out.extend_from_slice(if self.big_endian { b"MM" } else { b"II" });
        self.push_u16(&mut out, 42);
        self.push_u32(&mut out, ifd_offset as u32);

        let mut external: Vec<u8> = Vec::new();
        self.push_u16(&mut out, entries.len() as u16);
        for entry in entries {
            self.push_u16(&mut out, entry.tag);
            self.push_u16(&mut out, entry.field_type);
            self.push_u32(&mut out, entry.count);
            if entry.payload.len() <= 4 {
                let mut inline = entry.payload.clone();
                inline.resize(4, 0);
                out.extend_from_slice(&inline);
            } else {
                // Keep external values word-aligned.
                if external.len() % 2 == 1 {
                    external.push(0);
                }
                self.push_u32(&mut out, (external_base + external.len()) as u32);
                external.extend_from_slice(&entry.payload);
            }
        }
        self.push_u32(&mut out, 0); // no further IFDs
        out.extend_from_slice(&external);
        out
    }
}

#[derive(Debug, Clone)]
struct RawEntry {
    tag: u16,
    field_type: u16,
    count: u32,
    payload: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_preamble() {
        let data = GeoTiffBuilder::new().build();
        assert_eq!(&data[0..2], b"II");
        assert_eq!(u16::from_le_bytes([data[2], data[3]]), 42);
        assert_eq!(u32::from_le_bytes([data[4], data[5], data[6], data[7]]), 8);
    }

    #[test]
    fn test_big_endian_preamble() {
        let data = GeoTiffBuilder::new().big_endian().build();
        assert_eq!(&data[0..2], b"MM");
        assert_eq!(u16::from_be_bytes([data[2], data[3]]), 42);
    }

    #[test]
    fn test_entry_count_grows_with_options() {
        let bare = GeoTiffBuilder::new().without_crs().build();
        let full = GeoTiffBuilder::new().with_nodata("0").build();
        let count = |d: &[u8]| u16::from_le_bytes([d[8], d[9]]);
        assert!(count(&full) > count(&bare));
    }

    #[test]
    fn test_imagery_tile_band_count() {
        let builder = GeoTiffBuilder::imagery_tile(21.7, 63.7);
        assert_eq!(builder.bands.len(), 10);
        assert!(builder.nodata.is_some());
    }
}
