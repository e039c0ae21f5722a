//! Classic NetCDF test-file builder.
//!
//! Emits a complete CDF-1 or CDF-2 file: header plus data section, with
//! variable `begin` offsets computed for real so coordinate values can
//! be read back through the header. Values are supplied as f64 and
//! narrowed to the variable's external type on write.

const NC_BYTE: u32 = 1;
const NC_CHAR: u32 = 2;
const NC_SHORT: u32 = 3;
const NC_INT: u32 = 4;
const NC_FLOAT: u32 = 5;
const NC_DOUBLE: u32 = 6;

const TAG_DIMENSION: u32 = 0x0A;
const TAG_VARIABLE: u32 = 0x0B;
const TAG_ATTRIBUTE: u32 = 0x0C;

#[derive(Debug, Clone)]
enum AttrPayload {
    Text(String),
    Shorts(Vec<i16>),
    Ints(Vec<i32>),
    Floats(Vec<f32>),
    Doubles(Vec<f64>),
}

/// One variable under construction.
#[derive(Debug, Clone)]
pub struct VarBuilder {
    name: String,
    dims: Vec<String>,
    nc_type: u32,
    attributes: Vec<(String, AttrPayload)>,
    /// Values as f64, narrowed on write. None fills with zeros.
    values: Option<Vec<f64>>,
}

impl VarBuilder {
    /// `nc_type` uses the classic external type codes (1 byte, 2 char,
    /// 3 short, 4 int, 5 float, 6 double).
    pub fn new(name: &str, nc_type: u32) -> Self {
        Self {
            name: name.to_string(),
            dims: Vec::new(),
            nc_type,
            attributes: Vec::new(),
            values: None,
        }
    }

    pub fn doubles(name: &str) -> Self {
        Self::new(name, NC_DOUBLE)
    }

    pub fn floats(name: &str) -> Self {
        Self::new(name, NC_FLOAT)
    }

    pub fn shorts(name: &str) -> Self {
        Self::new(name, NC_SHORT)
    }

    pub fn with_dims(mut self, dims: &[&str]) -> Self {
        self.dims = dims.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn with_values(mut self, values: &[f64]) -> Self {
        self.values = Some(values.to_vec());
        self
    }

    pub fn with_text_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes
            .push((name.to_string(), AttrPayload::Text(value.to_string())));
        self
    }

    pub fn with_double_attr(mut self, name: &str, values: &[f64]) -> Self {
        self.attributes
            .push((name.to_string(), AttrPayload::Doubles(values.to_vec())));
        self
    }

    pub fn with_float_attr(mut self, name: &str, values: &[f32]) -> Self {
        self.attributes
            .push((name.to_string(), AttrPayload::Floats(values.to_vec())));
        self
    }

    pub fn with_short_attr(mut self, name: &str, values: &[i16]) -> Self {
        self.attributes
            .push((name.to_string(), AttrPayload::Shorts(values.to_vec())));
        self
    }

    pub fn with_int_attr(mut self, name: &str, values: &[i32]) -> Self {
        self.attributes
            .push((name.to_string(), AttrPayload::Ints(values.to_vec())));
        self
    }
}

/// Builder for synthetic classic NetCDF files.
#[derive(Debug, Clone, Default)]
pub struct NetCdfBuilder {
    cdf2: bool,
    dimensions: Vec<(String, u32)>,
    global_attributes: Vec<(String, AttrPayload)>,
    variables: Vec<VarBuilder>,
}

impl NetCdfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset: a lon/lat grid with double coordinate variables spanning
    /// the given bounds inclusively.
    pub fn grid(min_x: f64, min_y: f64, max_x: f64, max_y: f64, nlon: u32, nlat: u32) -> Self {
        Self::new()
            .with_dimension("lon", nlon)
            .with_dimension("lat", nlat)
            .with_variable(
                VarBuilder::doubles("lon")
                    .with_dims(&["lon"])
                    .with_values(&linspace(min_x, max_x, nlon))
                    .with_text_attr("units", "degrees_east"),
            )
            .with_variable(
                VarBuilder::doubles("lat")
                    .with_dims(&["lat"])
                    .with_values(&linspace(min_y, max_y, nlat))
                    .with_text_attr("units", "degrees_north"),
            )
    }

    /// Use the CDF-2 (64-bit offset) format.
    pub fn with_cdf2(mut self) -> Self {
        self.cdf2 = true;
        self
    }

    /// Declare a dimension. Size 0 marks the record dimension.
    pub fn with_dimension(mut self, name: &str, size: u32) -> Self {
        self.dimensions.push((name.to_string(), size));
        self
    }

    pub fn with_global_text(mut self, name: &str, value: &str) -> Self {
        self.global_attributes
            .push((name.to_string(), AttrPayload::Text(value.to_string())));
        self
    }

    pub fn with_variable(mut self, var: VarBuilder) -> Self {
        self.variables.push(var);
        self
    }

    /// Add a fixed-size time coordinate with CF units.
    pub fn with_time(self, units: &str, values: &[f64]) -> Self {
        self.with_dimension("time", values.len() as u32).with_variable(
            VarBuilder::doubles("time")
                .with_dims(&["time"])
                .with_values(values)
                .with_text_attr("units", units),
        )
    }

    /// Add a time coordinate along the record dimension.
    pub fn with_record_time(self, units: &str, values: &[f64]) -> Self {
        self.with_dimension("time", 0).with_variable(
            VarBuilder::doubles("time")
                .with_dims(&["time"])
                .with_values(values)
                .with_text_attr("units", units),
        )
    }

    /// Assemble the file bytes.
    ///
    /// Panics on inconsistent input (undeclared dimension names), which
    /// is fine for test code.
    pub fn build(&self) -> Vec<u8> {
        let dim_id = |name: &str| -> usize {
            self.dimensions
                .iter()
                .position(|d| d.0 == name)
                .unwrap_or_else(|| panic!("undeclared dimension '{}'", name))
        };

        // Per-variable layout facts.
        struct Layout {
            dim_ids: Vec<usize>,
            is_record: bool,
            /// Values in one slab (fixed: all values).
            per_slab: usize,
            type_size: usize,
        }
        let layouts: Vec<Layout> = self
            .variables
            .iter()
            .map(|v| {
                let dim_ids: Vec<usize> = v.dims.iter().map(|d| dim_id(d)).collect();
                let is_record = dim_ids
                    .first()
                    .map(|&id| self.dimensions[id].1 == 0)
                    .unwrap_or(false);
                let fixed_dims = if is_record { &dim_ids[1..] } else { &dim_ids[..] };
                let per_slab: usize = fixed_dims
                    .iter()
                    .map(|&id| self.dimensions[id].1 as usize)
                    .product();
                Layout {
                    dim_ids,
                    is_record,
                    per_slab,
                    type_size: type_size(v.nc_type),
                }
            })
            .collect();

        // Record count comes from the first record variable with values.
        let num_records: usize = self
            .variables
            .iter()
            .zip(layouts.iter())
            .filter(|(v, l)| l.is_record && v.values.is_some())
            .map(|(v, l)| v.values.as_ref().map(Vec::len).unwrap_or(0) / l.per_slab.max(1))
            .next()
            .unwrap_or(0);

        let record_var_count = layouts.iter().filter(|l| l.is_record).count();

        // Encode values (zero-filled where not supplied).
        let encoded: Vec<Vec<u8>> = self
            .variables
            .iter()
            .zip(layouts.iter())
            .map(|(v, l)| {
                let total = if l.is_record {
                    l.per_slab * num_records
                } else {
                    l.per_slab
                };
                let values = match &v.values {
                    Some(values) => values.clone(),
                    None => vec![0.0; total],
                };
                assert_eq!(values.len(), total, "value count mismatch for '{}'", v.name);
                encode_values(v.nc_type, &values)
            })
            .collect();

        // vsize and slab padding. With more than one record variable,
        // record slabs are padded to 4 bytes.
        let vsizes: Vec<usize> = layouts
            .iter()
            .map(|l| {
                let raw = l.per_slab * l.type_size;
                if l.is_record && record_var_count == 1 {
                    raw
                } else {
                    pad4(raw)
                }
            })
            .collect();

        // Pass 1: measure the header with placeholder begins.
        let header_len = self
            .assemble_header(&layouts.iter().map(|l| l.dim_ids.clone()).collect::<Vec<_>>(), &vsizes, &vec![0u64; self.variables.len()], num_records)
            .len();

        // Data layout: fixed variables first, then the record section.
        let mut begins = vec![0u64; self.variables.len()];
        let mut cursor = header_len;
        for (i, layout) in layouts.iter().enumerate() {
            if !layout.is_record {
                begins[i] = cursor as u64;
                cursor += pad4(encoded[i].len());
            }
        }
        let record_start = cursor;
        let mut slab_offset = 0usize;
        for (i, layout) in layouts.iter().enumerate() {
            if layout.is_record {
                begins[i] = (record_start + slab_offset) as u64;
                slab_offset += vsizes[i];
            }
        }
        let record_stride = slab_offset;

        // Pass 2: real header, then data.
        let mut out = self.assemble_header(
            &layouts.iter().map(|l| l.dim_ids.clone()).collect::<Vec<_>>(),
            &vsizes,
            &begins,
            num_records,
        );
        for (i, layout) in layouts.iter().enumerate() {
            if !layout.is_record {
                out.extend_from_slice(&encoded[i]);
                out.resize(pad4(out.len()), 0);
            }
        }
        for r in 0..num_records {
            for (i, layout) in layouts.iter().enumerate() {
                if !layout.is_record {
                    continue;
                }
                let slab_bytes = layout.per_slab * layout.type_size;
                let start = r * slab_bytes;
                out.extend_from_slice(&encoded[i][start..start + slab_bytes]);
                // Pad the slab up to its vsize.
                out.resize(out.len() + (vsizes[i] - slab_bytes), 0);
            }
        }
        debug_assert_eq!(
            out.len(),
            record_start + num_records * record_stride
        );
        out
    }

    fn assemble_header(
        &self,
        dim_ids: &[Vec<usize>],
        vsizes: &[usize],
        begins: &[u64],
        num_records: usize,
    ) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"CDF");
        out.push(if self.cdf2 { 2 } else { 1 });
        out.extend_from_slice(&(num_records as u32).to_be_bytes());

        // dim_list
        push_list_header(&mut out, TAG_DIMENSION, self.dimensions.len());
        for (name, size) in &self.dimensions {
            push_name(&mut out, name);
            out.extend_from_slice(&size.to_be_bytes());
        }

        // gatt_list
        push_attributes(&mut out, &self.global_attributes);

        // var_list
        push_list_header(&mut out, TAG_VARIABLE, self.variables.len());
        for (i, var) in self.variables.iter().enumerate() {
            push_name(&mut out, &var.name);
            out.extend_from_slice(&(dim_ids[i].len() as u32).to_be_bytes());
            for &id in &dim_ids[i] {
                out.extend_from_slice(&(id as u32).to_be_bytes());
            }
            push_attributes(&mut out, &var.attributes);
            out.extend_from_slice(&var.nc_type.to_be_bytes());
            out.extend_from_slice(&(vsizes[i] as u32).to_be_bytes());
            if self.cdf2 {
                out.extend_from_slice(&begins[i].to_be_bytes());
            } else {
                out.extend_from_slice(&(begins[i] as u32).to_be_bytes());
            }
        }
        out
    }
}

fn pad4(len: usize) -> usize {
    (len + 3) & !3
}

fn type_size(nc_type: u32) -> usize {
    match nc_type {
        NC_BYTE | NC_CHAR => 1,
        NC_SHORT => 2,
        NC_INT | NC_FLOAT => 4,
        NC_DOUBLE => 8,
        other => panic!("unknown nc_type {}", other),
    }
}

fn encode_values(nc_type: u32, values: &[f64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * type_size(nc_type));
    for &v in values {
        match nc_type {
            NC_BYTE | NC_CHAR => out.push(v as i8 as u8),
            NC_SHORT => out.extend_from_slice(&(v as i16).to_be_bytes()),
            NC_INT => out.extend_from_slice(&(v as i32).to_be_bytes()),
            NC_FLOAT => out.extend_from_slice(&(v as f32).to_be_bytes()),
            NC_DOUBLE => out.extend_from_slice(&v.to_be_bytes()),
            other => panic!("unknown nc_type {}", other),
        }
    }
    out
}

fn push_list_header(out: &mut Vec<u8>, tag: u32, count: usize) {
    if count == 0 {
        out.extend_from_slice(&[0; 8]);
    } else {
        out.extend_from_slice(&tag.to_be_bytes());
        out.extend_from_slice(&(count as u32).to_be_bytes());
    }
}

fn push_name(out: &mut Vec<u8>, name: &str) {
    out.extend_from_slice(&(name.len() as u32).to_be_bytes());
    out.extend_from_slice(name.as_bytes());
    out.resize(pad4(out.len()), 0);
}

fn push_attributes(out: &mut Vec<u8>, attrs: &[(String, AttrPayload)]) {
    push_list_header(out, TAG_ATTRIBUTE, attrs.len());
    for (name, payload) in attrs {
        push_name(out, name);
        match payload {
            AttrPayload::Text(s) => {
                out.extend_from_slice(&NC_CHAR.to_be_bytes());
                out.extend_from_slice(&(s.len() as u32).to_be_bytes());
                out.extend_from_slice(s.as_bytes());
            }
            AttrPayload::Shorts(v) => {
                out.extend_from_slice(&NC_SHORT.to_be_bytes());
                out.extend_from_slice(&(v.len() as u32).to_be_bytes());
                for &x in v {
                    out.extend_from_slice(&x.to_be_bytes());
                }
            }
            AttrPayload::Ints(v) => {
                out.extend_from_slice(&NC_INT.to_be_bytes());
                out.extend_from_slice(&(v.len() as u32).to_be_bytes());
                for &x in v {
                    out.extend_from_slice(&x.to_be_bytes());
                }
            }
            AttrPayload::Floats(v) => {
                out.extend_from_slice(&NC_FLOAT.to_be_bytes());
                out.extend_from_slice(&(v.len() as u32).to_be_bytes());
                for &x in v {
                    out.extend_from_slice(&x.to_be_bytes());
                }
            }
            AttrPayload::Doubles(v) => {
                out.extend_from_slice(&NC_DOUBLE.to_be_bytes());
                out.extend_from_slice(&(v.len() as u32).to_be_bytes());
                for &x in v {
                    out.extend_from_slice(&x.to_be_bytes());
                }
            }
        }
        out.resize(pad4(out.len()), 0);
    }
}

fn linspace(min: f64, max: f64, n: u32) -> Vec<f64> {
    if n <= 1 {
        return vec![min];
    }
    let step = (max - min) / (n - 1) as f64;
    (0..n).map(|i| min + i as f64 * step).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_and_version() {
        let v1 = NetCdfBuilder::grid(-10.0, 40.0, 5.0, 50.0, 4, 4).build();
        assert_eq!(&v1[0..4], b"CDF\x01");

        let v2 = NetCdfBuilder::grid(-10.0, 40.0, 5.0, 50.0, 4, 4)
            .with_cdf2()
            .build();
        assert_eq!(&v2[0..4], b"CDF\x02");
    }

    #[test]
    fn test_dimension_list_structure() {
        let data = NetCdfBuilder::grid(0.0, 0.0, 1.0, 1.0, 4, 3).build();
        // numrecs is zero without a record dimension
        assert_eq!(&data[4..8], &[0, 0, 0, 0]);
        // dim_list tag and count
        assert_eq!(&data[8..12], &0x0Au32.to_be_bytes());
        assert_eq!(&data[12..16], &2u32.to_be_bytes());
    }

    #[test]
    fn test_record_time_sets_numrecs() {
        let data = NetCdfBuilder::grid(0.0, 0.0, 1.0, 1.0, 4, 3)
            .with_record_time("hours since 2000-01-01 00:00:00", &[0.0, 6.0, 12.0])
            .build();
        assert_eq!(&data[4..8], &3u32.to_be_bytes());
    }

    #[test]
    fn test_linspace_endpoints() {
        let values = linspace(-10.0, 5.0, 16);
        assert_eq!(values.len(), 16);
        assert_eq!(values[0], -10.0);
        assert_eq!(values[15], 5.0);
        assert_eq!(linspace(7.0, 9.0, 1), vec![7.0]);
    }
}
