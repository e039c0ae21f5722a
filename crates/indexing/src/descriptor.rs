//! Source descriptors and their environment configuration surface.
//!
//! Every source is switched on and parameterized through environment
//! variables: `<ID>_ENABLED` (default off), `<ID>_FOLDER` (subfolder
//! under the data root), `<ID>_PRODUCT_NAMES` (space-separated,
//! order-significant), plus `GLOBAL_RELIEF_URL` and
//! `GLOBAL_RELIEF_FILE_NAME` for the one source that can fetch its own
//! input. The data root itself is `BASE_FOLDER`/`DATA_FOLDER`.

use std::env;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Built-in sources in their fixed orchestration order.
pub const BUILTIN_SOURCE_IDS: [&str; 7] = [
    "anthroprotect",
    "scenes",
    "cmems_currents",
    "cmems_physics",
    "cmems_waves",
    "gfs",
    "global_relief",
];

pub const DEFAULT_RELIEF_FILE: &str = "ETOPO_2022_v1_30s_N90W180_bed.nc";

/// Static configuration for one data source.
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    pub source_id: String,
    pub enabled: bool,
    pub root_folder: PathBuf,
    /// Catalog product names in role order.
    pub product_names: Vec<String>,
    /// Remote origin for sources that materialize their own file.
    pub remote_url: Option<String>,
    /// Configured file name for single-file sources.
    pub file_name: Option<String>,
}

impl SourceDescriptor {
    pub fn new(
        source_id: impl Into<String>,
        root_folder: impl Into<PathBuf>,
        product_names: Vec<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            enabled: true,
            root_folder: root_folder.into(),
            product_names,
            remote_url: None,
            file_name: None,
        }
    }

    pub fn with_remote(mut self, url: Option<String>, file_name: Option<String>) -> Self {
        self.remote_url = url;
        self.file_name = file_name;
        self
    }

    /// Read one source's configuration from the environment.
    pub fn from_env(source_id: &str, data_root: &Path) -> Self {
        let defaults = defaults_for(source_id);
        let key = source_id.to_uppercase();

        let enabled = env_flag(&format!("{}_ENABLED", key));
        let folder = env::var(format!("{}_FOLDER", key))
            .unwrap_or_else(|_| defaults.folder.to_string());
        let product_names = env::var(format!("{}_PRODUCT_NAMES", key))
            .unwrap_or_else(|_| defaults.product_names.to_string())
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let (remote_url, file_name) = if source_id == "global_relief" {
            (
                env::var("GLOBAL_RELIEF_URL").ok(),
                Some(
                    env::var("GLOBAL_RELIEF_FILE_NAME")
                        .unwrap_or_else(|_| DEFAULT_RELIEF_FILE.to_string()),
                ),
            )
        } else {
            (None, None)
        };

        Self {
            source_id: source_id.to_string(),
            enabled,
            root_folder: data_root.join(folder),
            product_names,
            remote_url,
            file_name,
        }
    }

    /// Check the configured product-name count against what the loader
    /// family expects.
    pub fn expect_arity(&self, expected: usize) -> Result<(), ConfigError> {
        if self.product_names.len() != expected {
            return Err(ConfigError::ProductNameArity {
                source_id: self.source_id.clone(),
                expected,
                actual: self.product_names.len(),
            });
        }
        Ok(())
    }
}

struct SourceDefaults<'a> {
    folder: &'a str,
    product_names: &'a str,
}

fn defaults_for(source_id: &str) -> SourceDefaults<'_> {
    match source_id {
        "anthroprotect" => SourceDefaults {
            folder: "anthroprotect",
            product_names: "s2 s2_scl lcs",
        },
        "scenes" => SourceDefaults {
            folder: "scenes",
            product_names: "scenes",
        },
        "cmems_currents" => SourceDefaults {
            folder: "currents",
            product_names: "cmems_currents",
        },
        "cmems_physics" => SourceDefaults {
            folder: "physics",
            product_names: "cmems_physics",
        },
        "cmems_waves" => SourceDefaults {
            folder: "waves",
            product_names: "cmems_waves",
        },
        "gfs" => SourceDefaults {
            folder: "weather",
            product_names: "weather",
        },
        "global_relief" => SourceDefaults {
            folder: "global_relief",
            product_names: "global_relief",
        },
        other => SourceDefaults {
            folder: other,
            product_names: other,
        },
    }
}

/// Shared data root, `BASE_FOLDER` joined with `DATA_FOLDER`.
pub fn data_root() -> PathBuf {
    let base = env::var("BASE_FOLDER").unwrap_or_else(|_| "/odc".to_string());
    let data = env::var("DATA_FOLDER").unwrap_or_else(|_| "data".to_string());
    PathBuf::from(base).join(data)
}

/// Descriptors for all built-in sources, in orchestration order.
pub fn builtin_sources(data_root: &Path) -> Vec<SourceDescriptor> {
    BUILTIN_SOURCE_IDS
        .iter()
        .map(|id| SourceDescriptor::from_env(id, data_root))
        .collect()
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}
