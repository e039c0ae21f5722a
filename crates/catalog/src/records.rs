//! Canonical record model shared by loaders, registrar, and stores.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use raster_common::{AcquisitionTime, BoundingBox, GeometryError};

/// One measurement within a product or dataset.
///
/// `nodata` round-trips through JSON as a number when finite and as the
/// string `"NaN"` otherwise, since JSON has no NaN literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    pub data_type: String,
    #[serde(with = "nodata_serde")]
    pub nodata: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_offset: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<BandSource>,
}

/// Where a band's samples live inside the raster file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandSource {
    /// One-based band index in a multi-band file.
    BandIndex(u32),
    /// Named variable or layer in a container format.
    Layer(String),
}

impl BandDescriptor {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nodata: f64) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            data_type: data_type.into(),
            nodata,
            units: None,
            scale_factor: None,
            add_offset: None,
            source: None,
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    /// Record linear packing (`physical = scale * stored + offset`).
    pub fn with_packing(mut self, scale_factor: f64, add_offset: f64) -> Self {
        self.scale_factor = Some(scale_factor);
        self.add_offset = Some(add_offset);
        self
    }

    pub fn with_band_index(mut self, index: u32) -> Self {
        self.source = Some(BandSource::BandIndex(index));
        self
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.source = Some(BandSource::Layer(layer.into()));
        self
    }

    /// Structural equality on the fields that define catalog compatibility.
    ///
    /// NaN nodata compares equal to NaN, unlike `==`.
    pub fn matches(&self, other: &BandDescriptor) -> bool {
        self.name == other.name
            && self.data_type == other.data_type
            && nodata_eq(self.nodata, other.nodata)
    }
}

fn nodata_eq(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a == b
}

mod nodata_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            "NaN".serialize(serializer)
        } else {
            value.serialize(serializer)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(n),
            Raw::Text(s) if s.eq_ignore_ascii_case("nan") => Ok(f64::NAN),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Named band schema shared by all datasets of one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDefinition {
    pub name: String,
    pub measurements: Vec<BandDescriptor>,
    /// Free-form classification document (platform, instrument, format).
    pub metadata: serde_json::Value,
}

impl ProductDefinition {
    pub fn new(name: impl Into<String>, measurements: Vec<BandDescriptor>) -> Self {
        Self {
            name: name.into(),
            measurements,
            metadata: serde_json::json!({}),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Look up a measurement by name or alias.
    pub fn measurement(&self, name: &str) -> Option<&BandDescriptor> {
        self.measurements
            .iter()
            .find(|m| m.name == name || m.aliases.iter().any(|a| a == name))
    }

    /// Whether an already-registered definition can stand in for this one.
    ///
    /// Measurement order is significant; names, data types, and nodata
    /// must agree position by position.
    pub fn compatible_with(&self, existing: &ProductDefinition) -> bool {
        self.name == existing.name
            && self.measurements.len() == existing.measurements.len()
            && self
                .measurements
                .iter()
                .zip(&existing.measurements)
                .all(|(a, b)| a.matches(b))
    }
}

/// One raster observation ready for registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub product_name: String,
    /// Location of the raster, as stored in the catalog.
    pub uri: String,
    /// CRS of `geometry`, e.g. "EPSG:4326".
    pub crs: String,
    pub geometry: BoundingBox,
    pub time: AcquisitionTime,
    pub bands: Vec<BandDescriptor>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_metadata: BTreeMap<String, String>,
}

impl CatalogRecord {
    /// Stable identity for duplicate detection.
    ///
    /// Deterministic over product name and uri, so re-running over an
    /// unchanged folder recomputes the same keys.
    pub fn identity(&self) -> Uuid {
        let key = format!("{}/{}", self.product_name, self.uri);
        Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes())
    }

    /// Digest over the record content, used to distinguish a true
    /// duplicate from a conflicting re-registration under one identity.
    ///
    /// Coordinates are quantized to 1e-6 degrees so float noise does not
    /// flip a duplicate into a conflict.
    pub fn content_digest(&self) -> Uuid {
        let mut parts = vec![
            self.product_name.clone(),
            self.uri.clone(),
            self.crs.clone(),
            format!(
                "{:.6},{:.6},{:.6},{:.6}",
                self.geometry.min_x, self.geometry.min_y, self.geometry.max_x, self.geometry.max_y
            ),
            format!(
                "{}/{}",
                self.time.start().to_rfc3339(),
                self.time.end().to_rfc3339()
            ),
        ];
        for band in &self.bands {
            parts.push(format!("{}:{}:{}", band.name, band.data_type, band.nodata));
        }
        for (key, value) in &self.extra_metadata {
            parts.push(format!("{}={}", key, value));
        }
        Uuid::new_v5(&Uuid::NAMESPACE_OID, parts.join("\n").as_bytes())
    }

    /// Reject malformed records before they reach a store.
    pub fn validate(&self) -> Result<(), RecordValidationError> {
        if self.product_name.is_empty() {
            return Err(RecordValidationError::EmptyProductName);
        }
        if self.uri.is_empty() {
            return Err(RecordValidationError::EmptyUri {
                product: self.product_name.clone(),
            });
        }
        if self.bands.is_empty() {
            return Err(RecordValidationError::NoBands {
                uri: self.uri.clone(),
            });
        }
        let geometry_check = if self.crs == "EPSG:4326" {
            self.geometry.validate_geographic()
        } else {
            self.geometry.validate_extent()
        };
        geometry_check.map_err(|source| RecordValidationError::InvalidGeometry {
            uri: self.uri.clone(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordValidationError {
    #[error("Record has empty product name")]
    EmptyProductName,

    #[error("Record for product '{product}' has empty uri")]
    EmptyUri { product: String },

    #[error("Record for '{uri}' has no bands")]
    NoBands { uri: String },

    #[error("Record for '{uri}' has invalid geometry: {source}")]
    InvalidGeometry {
        uri: String,
        #[source]
        source: GeometryError,
    },
}

/// Minimal handle to a record, kept after the record itself is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordRef {
    pub product_name: String,
    pub uri: String,
    pub dataset_id: Uuid,
}

impl RecordRef {
    pub fn of(record: &CatalogRecord) -> Self {
        Self {
            product_name: record.product_name.clone(),
            uri: record.uri.clone(),
            dataset_id: record.identity(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Inserted,
    SkippedDuplicate,
    Failed,
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RegistrationStatus::Inserted => "inserted",
            RegistrationStatus::SkippedDuplicate => "skipped_duplicate",
            RegistrationStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Per-record result of a registration attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationOutcome {
    pub record: RecordRef,
    pub status: RegistrationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl RegistrationOutcome {
    pub fn inserted(record: RecordRef) -> Self {
        Self {
            record,
            status: RegistrationStatus::Inserted,
            error_detail: None,
        }
    }

    pub fn skipped_duplicate(record: RecordRef) -> Self {
        Self {
            record,
            status: RegistrationStatus::SkippedDuplicate,
            error_detail: None,
        }
    }

    pub fn failed(record: RecordRef, detail: impl Into<String>) -> Self {
        Self {
            record,
            status: RegistrationStatus::Failed,
            error_detail: Some(detail.into()),
        }
    }
}
