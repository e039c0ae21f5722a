//! Classic NetCDF (CDF-1 / CDF-2) header reader.
//!
//! Parses the big-endian file header: dimension list, global
//! attributes, and variable list with per-variable attributes and data
//! offsets. Coordinate values (first/last of a 1-D variable) can be
//! read through the recorded `begin` offsets, which is all the
//! indexing pipeline needs to derive bounds and a reference time.
//! NetCDF-4/HDF5 containers are detected and rejected.

use chrono::{DateTime, Duration, Utc};
use raster_common::{AcquisitionTime, BoundingBox};
use tracing::{debug, trace};

use crate::error::{NetCdfError, NetCdfResult};

// ===== External types =====

pub const NC_BYTE: u32 = 1;
pub const NC_CHAR: u32 = 2;
pub const NC_SHORT: u32 = 3;
pub const NC_INT: u32 = 4;
pub const NC_FLOAT: u32 = 5;
pub const NC_DOUBLE: u32 = 6;

/// List tags inside the header.
const TAG_DIMENSION: u32 = 0x0A;
const TAG_VARIABLE: u32 = 0x0B;
const TAG_ATTRIBUTE: u32 = 0x0C;

/// numrecs value meaning "record count unknown".
const STREAMING: u32 = 0xFFFF_FFFF;

/// Size in bytes of one value of an external type.
pub fn nc_type_size(nc_type: u32) -> Option<usize> {
    match nc_type {
        NC_BYTE | NC_CHAR => Some(1),
        NC_SHORT => Some(2),
        NC_INT | NC_FLOAT => Some(4),
        NC_DOUBLE => Some(8),
        _ => None,
    }
}

pub fn nc_type_name(nc_type: u32) -> &'static str {
    match nc_type {
        NC_BYTE => "byte",
        NC_CHAR => "char",
        NC_SHORT => "short",
        NC_INT => "int",
        NC_FLOAT => "float",
        NC_DOUBLE => "double",
        _ => "unknown",
    }
}

// ===== Header model =====

/// A named dimension. Size 0 marks the record (unlimited) dimension.
#[derive(Debug, Clone)]
pub struct Dimension {
    pub name: String,
    pub size: u32,
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Text(String),
    Bytes(Vec<i8>),
    Shorts(Vec<i16>),
    Ints(Vec<i32>),
    Floats(Vec<f32>),
    Doubles(Vec<f64>),
}

impl AttributeValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// First value widened to f64, for numeric attributes.
    pub fn first_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Text(_) => None,
            AttributeValue::Bytes(v) => v.first().map(|&x| x as f64),
            AttributeValue::Shorts(v) => v.first().map(|&x| x as f64),
            AttributeValue::Ints(v) => v.first().map(|&x| x as f64),
            AttributeValue::Floats(v) => v.first().map(|&x| x as f64),
            AttributeValue::Doubles(v) => v.first().copied(),
        }
    }

    /// All values widened to f64; empty for text attributes.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            AttributeValue::Text(_) => Vec::new(),
            AttributeValue::Bytes(v) => v.iter().map(|&x| x as f64).collect(),
            AttributeValue::Shorts(v) => v.iter().map(|&x| x as f64).collect(),
            AttributeValue::Ints(v) => v.iter().map(|&x| x as f64).collect(),
            AttributeValue::Floats(v) => v.iter().map(|&x| x as f64).collect(),
            AttributeValue::Doubles(v) => v.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    /// Indices into the header's dimension list, outermost first.
    pub dimension_ids: Vec<usize>,
    pub nc_type: u32,
    pub attributes: Vec<Attribute>,
    /// Declared byte size of one slab (padded, per the format).
    pub vsize: u32,
    /// Absolute file offset of the variable's data.
    pub begin: u64,
}

impl Variable {
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }

    pub fn units(&self) -> Option<&str> {
        self.attribute("units").and_then(AttributeValue::as_text)
    }

    /// Declared fill/missing marker, unpacked to physical units.
    pub fn fill_value(&self) -> Option<f64> {
        self.attribute("_FillValue")
            .or_else(|| self.attribute("missing_value"))
            .and_then(AttributeValue::first_f64)
            .map(|raw| self.unpack(raw))
    }

    /// Apply scale_factor/add_offset packing to a stored value.
    pub fn unpack(&self, raw: f64) -> f64 {
        let scale = self
            .attribute("scale_factor")
            .and_then(AttributeValue::first_f64)
            .unwrap_or(1.0);
        let offset = self
            .attribute("add_offset")
            .and_then(AttributeValue::first_f64)
            .unwrap_or(0.0);
        raw * scale + offset
    }
}

#[derive(Debug, Clone)]
pub struct NetCdfHeader {
    /// CDF format version byte (1 or 2).
    pub version: u8,
    pub num_records: u32,
    pub dimensions: Vec<Dimension>,
    pub global_attributes: Vec<Attribute>,
    pub variables: Vec<Variable>,
}

/// A parsed file: the header plus a borrow of the raw bytes for
/// coordinate reads.
pub struct NetCdfFile<'a> {
    data: &'a [u8],
    pub header: NetCdfHeader,
}

// ===== Parsing =====

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> NetCdfResult<&'a [u8]> {
        let slice = self
            .data
            .get(self.pos..self.pos + len)
            .ok_or(NetCdfError::Truncated {
                offset: self.pos,
                needed: len,
            })?;
        self.pos += len;
        Ok(slice)
    }

    fn u32(&mut self) -> NetCdfResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> NetCdfResult<u64> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Advance past padding to the next 4-byte boundary.
    fn align4(&mut self) -> NetCdfResult<()> {
        let rem = self.pos % 4;
        if rem != 0 {
            self.take(4 - rem)?;
        }
        Ok(())
    }

    /// A counted name string, padded to 4 bytes.
    fn name(&mut self) -> NetCdfResult<String> {
        let len = self.u32()? as usize;
        let start = self.pos;
        let bytes = self.take(len)?;
        let s = std::str::from_utf8(bytes)
            .map_err(|_| NetCdfError::InvalidHeader {
                offset: start,
                reason: "name is not valid UTF-8".to_string(),
            })?
            .to_string();
        self.align4()?;
        Ok(s)
    }
}

/// Read a list tag, returning the element count (zero for ABSENT).
fn list_header(cursor: &mut Cursor<'_>, expected_tag: u32, what: &str) -> NetCdfResult<u32> {
    let offset = cursor.pos;
    let tag = cursor.u32()?;
    let nelems = cursor.u32()?;
    if tag == expected_tag {
        Ok(nelems)
    } else if tag == 0 && nelems == 0 {
        Ok(0)
    } else {
        Err(NetCdfError::InvalidHeader {
            offset,
            reason: format!("bad {} list tag {:#x}", what, tag),
        })
    }
}

fn read_attributes(cursor: &mut Cursor<'_>) -> NetCdfResult<Vec<Attribute>> {
    let count = list_header(cursor, TAG_ATTRIBUTE, "attribute")?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = cursor.name()?;
        let offset = cursor.pos;
        let nc_type = cursor.u32()?;
        let nelems = cursor.u32()? as usize;
        let value = match nc_type {
            NC_CHAR => {
                let bytes = cursor.take(nelems)?;
                AttributeValue::Text(String::from_utf8_lossy(bytes).into_owned())
            }
            NC_BYTE => {
                AttributeValue::Bytes(cursor.take(nelems)?.iter().map(|&b| b as i8).collect())
            }
            NC_SHORT => {
                let mut values = Vec::with_capacity(nelems);
                for _ in 0..nelems {
                    let b = cursor.take(2)?;
                    values.push(i16::from_be_bytes([b[0], b[1]]));
                }
                AttributeValue::Shorts(values)
            }
            NC_INT => {
                let mut values = Vec::with_capacity(nelems);
                for _ in 0..nelems {
                    let b = cursor.take(4)?;
                    values.push(i32::from_be_bytes([b[0], b[1], b[2], b[3]]));
                }
                AttributeValue::Ints(values)
            }
            NC_FLOAT => {
                let mut values = Vec::with_capacity(nelems);
                for _ in 0..nelems {
                    let b = cursor.take(4)?;
                    values.push(f32::from_be_bytes([b[0], b[1], b[2], b[3]]));
                }
                AttributeValue::Floats(values)
            }
            NC_DOUBLE => {
                let mut values = Vec::with_capacity(nelems);
                for _ in 0..nelems {
                    let b = cursor.take(8)?;
                    values.push(f64::from_be_bytes([
                        b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
                    ]));
                }
                AttributeValue::Doubles(values)
            }
            other => {
                return Err(NetCdfError::InvalidHeader {
                    offset,
                    reason: format!("unknown attribute type {}", other),
                })
            }
        };
        cursor.align4()?;
        attributes.push(Attribute { name, value });
    }
    Ok(attributes)
}

impl<'a> NetCdfFile<'a> {
    /// Parse the header from a file's full bytes.
    pub fn parse(data: &'a [u8]) -> NetCdfResult<Self> {
        // NetCDF-4 files are HDF5 containers with their own signature.
        if data.len() >= 8 && data[0..8] == [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1A, b'\n'] {
            return Err(NetCdfError::Unsupported(
                "NetCDF-4/HDF5 container".to_string(),
            ));
        }

        let mut cursor = Cursor { data, pos: 0 };

        // Octets 0-3: magic "CDF" + version byte
        let magic = cursor.take(4)?;
        if &magic[0..3] != b"CDF" {
            return Err(NetCdfError::InvalidMagic([
                magic[0], magic[1], magic[2], magic[3],
            ]));
        }
        let version = magic[3];
        match version {
            1 | 2 => {}
            5 => return Err(NetCdfError::Unsupported("CDF-5 (64-bit data)".to_string())),
            other => {
                return Err(NetCdfError::Unsupported(format!("CDF version {}", other)));
            }
        }

        // Octets 4-7: record count
        let num_records = match cursor.u32()? {
            STREAMING => 0,
            n => n,
        };

        let dim_count = list_header(&mut cursor, TAG_DIMENSION, "dimension")?;
        let mut dimensions = Vec::with_capacity(dim_count as usize);
        for _ in 0..dim_count {
            let name = cursor.name()?;
            let size = cursor.u32()?;
            dimensions.push(Dimension { name, size });
        }

        let global_attributes = read_attributes(&mut cursor)?;

        let var_count = list_header(&mut cursor, TAG_VARIABLE, "variable")?;
        let mut variables = Vec::with_capacity(var_count as usize);
        for _ in 0..var_count {
            let name = cursor.name()?;
            let ndims = cursor.u32()? as usize;
            let mut dimension_ids = Vec::with_capacity(ndims);
            for _ in 0..ndims {
                let at = cursor.pos;
                let id = cursor.u32()? as usize;
                if id >= dimensions.len() {
                    return Err(NetCdfError::InvalidHeader {
                        offset: at,
                        reason: format!("dimension id {} out of range", id),
                    });
                }
                dimension_ids.push(id);
            }
            let attributes = read_attributes(&mut cursor)?;
            let at = cursor.pos;
            let nc_type = cursor.u32()?;
            if nc_type_size(nc_type).is_none() {
                return Err(NetCdfError::InvalidHeader {
                    offset: at,
                    reason: format!("unknown variable type {}", nc_type),
                });
            }
            let vsize = cursor.u32()?;
            let begin = match version {
                1 => cursor.u32()? as u64,
                _ => cursor.u64()?,
            };
            variables.push(Variable {
                name,
                dimension_ids,
                nc_type,
                attributes,
                vsize,
                begin,
            });
        }

        trace!(
            version,
            dims = dimensions.len(),
            vars = variables.len(),
            "parsed NetCDF header"
        );

        Ok(NetCdfFile {
            data,
            header: NetCdfHeader {
                version,
                num_records,
                dimensions,
                global_attributes,
                variables,
            },
        })
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.header.variables.iter().find(|v| v.name == name)
    }

    /// Total number of values a variable holds, resolving the record
    /// dimension through the header's record count.
    pub fn value_count(&self, var: &Variable) -> u64 {
        var.dimension_ids
            .iter()
            .map(|&id| {
                let size = self.header.dimensions[id].size;
                if size == 0 {
                    self.header.num_records as u64
                } else {
                    size as u64
                }
            })
            .product()
    }

    fn is_record_var(&self, var: &Variable) -> bool {
        var.dimension_ids
            .first()
            .map(|&id| self.header.dimensions[id].size == 0)
            .unwrap_or(false)
    }

    /// Byte stride of one record across all record variables.
    ///
    /// With a single record variable the stride is its unpadded slab
    /// size, per the format's vsize note.
    fn record_stride(&self) -> u64 {
        let record_vars: Vec<&Variable> = self
            .header
            .variables
            .iter()
            .filter(|v| self.is_record_var(v))
            .collect();
        if record_vars.len() == 1 {
            let var = record_vars[0];
            let per_record: u64 = var.dimension_ids[1..]
                .iter()
                .map(|&id| self.header.dimensions[id].size as u64)
                .product();
            return per_record * nc_type_size(var.nc_type).unwrap_or(1) as u64;
        }
        record_vars.iter().map(|v| v.vsize as u64).sum()
    }

    fn read_raw(&self, offset: u64, nc_type: u32) -> NetCdfResult<f64> {
        let size = nc_type_size(nc_type).ok_or_else(|| {
            NetCdfError::Unsupported(format!("read of type {}", nc_type_name(nc_type)))
        })?;
        let start = offset as usize;
        let b = self
            .data
            .get(start..start + size)
            .ok_or(NetCdfError::Truncated {
                offset: start,
                needed: size,
            })?;
        let value = match nc_type {
            NC_BYTE => b[0] as i8 as f64,
            NC_CHAR => b[0] as f64,
            NC_SHORT => i16::from_be_bytes([b[0], b[1]]) as f64,
            NC_INT => i32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64,
            NC_FLOAT => f32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64,
            NC_DOUBLE => f64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
            _ => unreachable!("nc_type validated above"),
        };
        Ok(value)
    }

    /// Read one value of a 1-D variable, unpacked to physical units.
    pub fn read_value(&self, var: &Variable, index: u64) -> NetCdfResult<f64> {
        if var.dimension_ids.len() > 1 {
            return Err(NetCdfError::Unsupported(
                "reading multidimensional variables".to_string(),
            ));
        }
        let size = nc_type_size(var.nc_type).ok_or_else(|| {
            NetCdfError::Unsupported(format!("read of type {}", nc_type_name(var.nc_type)))
        })? as u64;
        let offset = if self.is_record_var(var) {
            var.begin + index * self.record_stride()
        } else {
            var.begin + index * size
        };
        Ok(var.unpack(self.read_raw(offset, var.nc_type)?))
    }

    /// Min and max of a 1-D coordinate variable.
    ///
    /// Prefers declared range attributes; falls back to reading the
    /// first and last stored values.
    pub fn coordinate_range(&self, var: &Variable) -> NetCdfResult<(f64, f64)> {
        let min_attr = var.attribute("valid_min").and_then(AttributeValue::first_f64);
        let max_attr = var.attribute("valid_max").and_then(AttributeValue::first_f64);
        if let (Some(min), Some(max)) = (min_attr, max_attr) {
            return Ok((var.unpack(min), var.unpack(max)));
        }
        if let Some(range) = var.attribute("actual_range") {
            let values = range.to_f64_vec();
            if values.len() >= 2 {
                let (a, b) = (var.unpack(values[0]), var.unpack(values[1]));
                return Ok((a.min(b), a.max(b)));
            }
        }

        let count = self.value_count(var);
        if count == 0 {
            return Err(NetCdfError::MissingData(format!(
                "variable '{}' has no values",
                var.name
            )));
        }
        let first = self.read_value(var, 0)?;
        let last = self.read_value(var, count - 1)?;
        Ok((first.min(last), first.max(last)))
    }

    pub fn longitude_variable(&self) -> Option<&Variable> {
        self.find_coordinate(&["lon", "longitude", "x"], "degrees_east")
    }

    pub fn latitude_variable(&self) -> Option<&Variable> {
        self.find_coordinate(&["lat", "latitude", "y"], "degrees_north")
    }

    fn find_coordinate(&self, names: &[&str], units: &str) -> Option<&Variable> {
        self.header
            .variables
            .iter()
            .find(|v| names.iter().any(|n| v.name.eq_ignore_ascii_case(n)))
            .or_else(|| {
                self.header
                    .variables
                    .iter()
                    .find(|v| v.units().map(|u| u.starts_with(units)).unwrap_or(false))
            })
    }

    /// Geographic bounds from the latitude/longitude coordinates.
    pub fn geographic_bounds(&self) -> NetCdfResult<BoundingBox> {
        let lon = self
            .longitude_variable()
            .ok_or_else(|| NetCdfError::MissingData("longitude coordinate".to_string()))?;
        let lat = self
            .latitude_variable()
            .ok_or_else(|| NetCdfError::MissingData("latitude coordinate".to_string()))?;
        let (min_x, max_x) = self.coordinate_range(lon)?;
        let (min_y, max_y) = self.coordinate_range(lat)?;
        Ok(BoundingBox::new(min_x, min_y, max_x, max_y))
    }

    /// The time coordinate: a variable named "time", or failing that
    /// any variable with CF "since"-style units.
    pub fn time_variable(&self) -> Option<&Variable> {
        self.variable("time").or_else(|| {
            self.header
                .variables
                .iter()
                .find(|v| v.units().map(|u| u.contains(" since ")).unwrap_or(false))
        })
    }

    /// First stored time value, decoded through CF units.
    ///
    /// Returns Ok(None) when the file has no decodable time coordinate;
    /// callers fall back to other time sources.
    pub fn first_time(&self) -> NetCdfResult<Option<DateTime<Utc>>> {
        let var = match self.time_variable() {
            Some(v) => v,
            None => return Ok(None),
        };
        let units = match var.units() {
            Some(u) => u.to_string(),
            None => return Ok(None),
        };
        let (unit_seconds, epoch) = match parse_cf_time_units(&units) {
            Some(parsed) => parsed,
            None => {
                debug!(units = %units, variable = %var.name, "unparseable time units");
                return Ok(None);
            }
        };
        if self.value_count(var) == 0 {
            return Ok(None);
        }
        let value = self.read_value(var, 0)?;
        let millis = (value * unit_seconds * 1000.0).round() as i64;
        Ok(Some(epoch + Duration::milliseconds(millis)))
    }
}

/// Parse a CF time units string like "hours since 1950-01-01 00:00:00".
///
/// Returns the unit length in seconds and the epoch.
pub fn parse_cf_time_units(units: &str) -> Option<(f64, DateTime<Utc>)> {
    let (unit, epoch) = units.split_once(" since ")?;
    let seconds = match unit.trim().to_ascii_lowercase().as_str() {
        "seconds" | "second" | "secs" | "sec" | "s" => 1.0,
        "minutes" | "minute" | "mins" | "min" => 60.0,
        "hours" | "hour" | "hrs" | "hr" | "h" => 3600.0,
        "days" | "day" | "d" => 86400.0,
        _ => return None,
    };
    // Epochs commonly separate date and time with a space.
    let normalized = epoch.trim().replacen(' ', "T", 1);
    let epoch_dt = AcquisitionTime::from_iso8601(&normalized).ok()?;
    Some((seconds, epoch_dt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Smallest valid file: magic, zero records, three ABSENT lists.
    fn empty_file() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"CDF\x01");
        data.extend_from_slice(&0u32.to_be_bytes());
        for _ in 0..3 {
            data.extend_from_slice(&0u32.to_be_bytes());
            data.extend_from_slice(&0u32.to_be_bytes());
        }
        data
    }

    #[test]
    fn test_parse_empty_file() {
        let data = empty_file();
        let file = NetCdfFile::parse(&data).unwrap();
        assert_eq!(file.header.version, 1);
        assert!(file.header.dimensions.is_empty());
        assert!(file.header.variables.is_empty());
        assert!(file.first_time().unwrap().is_none());
    }

    #[test]
    fn test_reject_bad_magic() {
        assert!(matches!(
            NetCdfFile::parse(b"NOPE\x00\x00\x00\x00"),
            Err(NetCdfError::InvalidMagic(_))
        ));
    }

    #[test]
    fn test_reject_hdf5() {
        let data = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1A, b'\n', 0, 0];
        assert!(matches!(
            NetCdfFile::parse(&data),
            Err(NetCdfError::Unsupported(_))
        ));
    }

    #[test]
    fn test_reject_cdf5() {
        let mut data = empty_file();
        data[3] = 5;
        assert!(matches!(
            NetCdfFile::parse(&data),
            Err(NetCdfError::Unsupported(_))
        ));
    }

    #[test]
    fn test_parse_cf_time_units() {
        let (unit, epoch) = parse_cf_time_units("hours since 1950-01-01 00:00:00").unwrap();
        assert_eq!(unit, 3600.0);
        assert_eq!(epoch, Utc.with_ymd_and_hms(1950, 1, 1, 0, 0, 0).unwrap());

        let (unit, epoch) = parse_cf_time_units("days since 1990-1-1").unwrap();
        assert_eq!(unit, 86400.0);
        assert_eq!(epoch.timestamp(), Utc.with_ymd_and_hms(1990, 1, 1, 0, 0, 0).unwrap().timestamp());

        let (unit, _) = parse_cf_time_units("seconds since 1970-01-01T00:00:00Z").unwrap();
        assert_eq!(unit, 1.0);

        assert!(parse_cf_time_units("fortnights since 1970-01-01").is_none());
        assert!(parse_cf_time_units("degrees_north").is_none());
    }

    #[test]
    fn test_attribute_helpers() {
        let var = Variable {
            name: "VHM0".to_string(),
            dimension_ids: vec![],
            nc_type: NC_SHORT,
            attributes: vec![
                Attribute {
                    name: "units".to_string(),
                    value: AttributeValue::Text("m".to_string()),
                },
                Attribute {
                    name: "scale_factor".to_string(),
                    value: AttributeValue::Floats(vec![0.01]),
                },
                Attribute {
                    name: "_FillValue".to_string(),
                    value: AttributeValue::Shorts(vec![-32767]),
                },
            ],
            vsize: 0,
            begin: 0,
        };
        assert_eq!(var.units(), Some("m"));
        assert!((var.unpack(150.0) - 1.5).abs() < 1e-4);
        let fill = var.fill_value().unwrap();
        assert!((fill - (-327.67)).abs() < 1e-4);
    }
}
