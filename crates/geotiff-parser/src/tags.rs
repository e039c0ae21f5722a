//! TIFF tag and GeoKey constants, with the lookup tables used to
//! interpret them.

// ===== Baseline TIFF tags =====

pub const TAG_IMAGE_WIDTH: u16 = 256;
pub const TAG_IMAGE_LENGTH: u16 = 257;
pub const TAG_BITS_PER_SAMPLE: u16 = 258;
pub const TAG_SAMPLES_PER_PIXEL: u16 = 277;
pub const TAG_SAMPLE_FORMAT: u16 = 339;

// ===== GeoTIFF tags =====

pub const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
pub const TAG_MODEL_TIEPOINT: u16 = 33922;
pub const TAG_MODEL_TRANSFORMATION: u16 = 34264;
pub const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
pub const TAG_GDAL_NODATA: u16 = 42113;

// ===== GeoKeys (stored inside the GeoKeyDirectory) =====

pub const KEY_MODEL_TYPE: u16 = 1024;
pub const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
pub const KEY_PROJECTED_CS_TYPE: u16 = 3072;

/// GTModelTypeGeoKey values.
pub const MODEL_TYPE_PROJECTED: u16 = 1;
pub const MODEL_TYPE_GEOGRAPHIC: u16 = 2;

// ===== TIFF field types =====

pub const TYPE_BYTE: u16 = 1;
pub const TYPE_ASCII: u16 = 2;
pub const TYPE_SHORT: u16 = 3;
pub const TYPE_LONG: u16 = 4;
pub const TYPE_RATIONAL: u16 = 5;
pub const TYPE_DOUBLE: u16 = 12;

/// Size in bytes of a single value of the given TIFF field type.
///
/// Returns 0 for unknown types; callers treat that as an invalid entry.
pub fn field_type_size(field_type: u16) -> usize {
    match field_type {
        1 | 2 | 6 | 7 => 1,  // BYTE, ASCII, SBYTE, UNDEFINED
        3 | 8 => 2,          // SHORT, SSHORT
        4 | 9 | 11 => 4,     // LONG, SLONG, FLOAT
        5 | 10 | 12 => 8,    // RATIONAL, SRATIONAL, DOUBLE
        _ => 0,
    }
}

/// Map a (bits per sample, sample format code) pair to a catalog data
/// type name.
///
/// Sample format codes follow TIFF tag 339: 1 = unsigned integer,
/// 2 = signed integer, 3 = IEEE float.
pub fn data_type_name(bits: u16, sample_format: u16) -> Option<&'static str> {
    match (bits, sample_format) {
        (8, 1) => Some("uint8"),
        (8, 2) => Some("int8"),
        (16, 1) => Some("uint16"),
        (16, 2) => Some("int16"),
        (32, 1) => Some("uint32"),
        (32, 2) => Some("int32"),
        (32, 3) => Some("float32"),
        (64, 3) => Some("float64"),
        _ => None,
    }
}
