//! Source loaders.
//!
//! Each loader owns one source family: it enumerates candidate files,
//! extracts per-file fields from the layout grammar, and hands parsed
//! rasters to the normalizer. Loaders never talk to the catalog; the
//! orchestrator does that with the records they produce.

mod grid;
mod relief;
mod scene;
mod tiled;

pub use grid::ForecastGridLoader;
pub use relief::StaticRasterLoader;
pub use scene::SingleSceneLoader;
pub use tiled::TiledCollectionLoader;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use catalog::{CatalogRecord, ProductDefinition};

use crate::descriptor::SourceDescriptor;
use crate::error::{ConfigError, ParseFailure, SourceResult};
use crate::header::RasterHeader;
use crate::normalize::{self, RecordParts};

/// Which layout grammar matched a discovered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    TiledImagery,
    TiledSceneClassification,
    TiledLandCover,
    Investigative,
    DatedScene,
    ForecastGrid,
    StaticRaster,
}

/// A file the discovery pass decided to process.
#[derive(Debug, Clone)]
pub struct RawFileMatch {
    pub file_path: PathBuf,
    pub pattern_kind: PatternKind,
    /// Fields the filename grammar yielded. Empty when the name did not
    /// parse; the parse step turns that into a recorded failure.
    pub extracted_fields: BTreeMap<String, String>,
}

/// One discovery result: either a file to process or one to ignore.
#[derive(Debug, Clone)]
pub enum Discovered {
    Match(RawFileMatch),
    Skipped(PathBuf),
}

/// Output of the parse step, ready for normalization.
#[derive(Debug)]
pub struct ParsedRaster {
    pub path: PathBuf,
    pub parts: RecordParts,
    pub header: RasterHeader,
}

#[async_trait]
pub trait Loader: Send + Sync {
    fn descriptor(&self) -> &SourceDescriptor;

    fn source_id(&self) -> &str {
        &self.descriptor().source_id
    }

    /// One-time setup before discovery, such as fetching a remote file.
    async fn prepare(&self) -> SourceResult<()> {
        Ok(())
    }

    /// The product definitions this source registers records under.
    async fn products(&self) -> SourceResult<Vec<ProductDefinition>>;

    /// Enumerate candidate files. The iterator is recreated on every
    /// call, so a re-run starts from scratch rather than resuming.
    fn discover(&self) -> SourceResult<Box<dyn Iterator<Item = Discovered> + Send>>;

    /// Read the file and extract everything a record needs.
    async fn parse(&self, matched: &RawFileMatch) -> Result<ParsedRaster, ParseFailure>;

    /// Resolve geometry and time and produce the final record.
    fn build_record(&self, parsed: ParsedRaster) -> Result<CatalogRecord, ParseFailure> {
        normalize::normalize(parsed.parts, &parsed.header)
            .map_err(|e| ParseFailure::new(parsed.path, e.to_string()))
    }
}

/// File modification time, the lowest-precedence time source.
async fn modification_time(path: &Path) -> Result<DateTime<Utc>, ParseFailure> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| ParseFailure::new(path, e.to_string()))?;
    let modified = metadata
        .modified()
        .map_err(|e| ParseFailure::new(path, e.to_string()))?;
    Ok(DateTime::<Utc>::from(modified))
}

type Constructor = fn(SourceDescriptor) -> Result<Box<dyn Loader>, ConfigError>;

const CONSTRUCTORS: &[(&str, Constructor)] = &[
    ("anthroprotect", TiledCollectionLoader::boxed),
    ("scenes", SingleSceneLoader::boxed),
    ("cmems_currents", ForecastGridLoader::boxed),
    ("cmems_physics", ForecastGridLoader::boxed),
    ("cmems_waves", ForecastGridLoader::boxed),
    ("gfs", ForecastGridLoader::boxed),
    ("global_relief", StaticRasterLoader::boxed),
];

/// Instantiate loaders for the enabled descriptors, in the order given.
pub fn build_loaders(
    descriptors: Vec<SourceDescriptor>,
) -> Result<Vec<Box<dyn Loader>>, ConfigError> {
    let mut loaders = Vec::new();
    for descriptor in descriptors {
        if !descriptor.enabled {
            debug!(source = %descriptor.source_id, "Source disabled, skipping");
            continue;
        }
        let constructor = CONSTRUCTORS
            .iter()
            .find(|(id, _)| *id == descriptor.source_id)
            .map(|(_, c)| *c)
            .ok_or_else(|| ConfigError::UnknownSource(descriptor.source_id.clone()))?;
        loaders.push(constructor(descriptor)?);
    }
    Ok(loaders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::builtin_sources;
    use std::path::Path;

    #[test]
    fn disabled_sources_are_skipped() {
        let mut descriptors = builtin_sources(Path::new("/data"));
        for d in &mut descriptors {
            d.enabled = d.source_id == "scenes";
        }
        let loaders = build_loaders(descriptors).unwrap();
        assert_eq!(loaders.len(), 1);
        assert_eq!(loaders[0].source_id(), "scenes");
    }

    #[test]
    fn all_builtin_sources_have_a_loader() {
        let mut descriptors = builtin_sources(Path::new("/data"));
        for d in &mut descriptors {
            d.enabled = true;
        }
        let loaders = build_loaders(descriptors).unwrap();
        assert_eq!(loaders.len(), 7);
    }

    #[test]
    fn loader_order_follows_descriptor_order() {
        let mut descriptors = builtin_sources(Path::new("/data"));
        for d in &mut descriptors {
            d.enabled = true;
        }
        let expected: Vec<String> = descriptors.iter().map(|d| d.source_id.clone()).collect();
        let loaders = build_loaders(descriptors).unwrap();
        let actual: Vec<&str> = loaders.iter().map(|l| l.source_id()).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn unknown_source_is_rejected() {
        let descriptor = SourceDescriptor::new(
            "mystery",
            Path::new("/data/mystery"),
            vec!["mystery".to_string()],
        );
        assert!(matches!(
            build_loaders(vec![descriptor]),
            Err(ConfigError::UnknownSource(_))
        ));
    }
}
