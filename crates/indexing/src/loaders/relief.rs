//! Single static raster, fetched on first run when configured.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use catalog::ProductDefinition;
use raster_common::AcquisitionTime;

use crate::descriptor::{SourceDescriptor, DEFAULT_RELIEF_FILE};
use crate::error::{ConfigError, ParseFailure, SourceError, SourceResult};
use crate::fetch::{HttpFetcher, RemoteFetcher};
use crate::header;
use crate::loaders::{
    modification_time, Discovered, Loader, ParsedRaster, PatternKind, RawFileMatch,
};
use crate::normalize::RecordParts;
use crate::products;

pub struct StaticRasterLoader {
    descriptor: SourceDescriptor,
    fetcher: Option<Arc<dyn RemoteFetcher>>,
}

impl StaticRasterLoader {
    pub fn boxed(descriptor: SourceDescriptor) -> Result<Box<dyn Loader>, ConfigError> {
        descriptor.expect_arity(1)?;
        Ok(Box::new(Self {
            descriptor,
            fetcher: None,
        }))
    }

    /// Same loader with the download step injected.
    pub fn with_fetcher(
        descriptor: SourceDescriptor,
        fetcher: Arc<dyn RemoteFetcher>,
    ) -> Result<Box<dyn Loader>, ConfigError> {
        descriptor.expect_arity(1)?;
        Ok(Box::new(Self {
            descriptor,
            fetcher: Some(fetcher),
        }))
    }

    fn target_path(&self) -> PathBuf {
        let file_name = self
            .descriptor
            .file_name
            .as_deref()
            .unwrap_or(DEFAULT_RELIEF_FILE);
        self.descriptor.root_folder.join(file_name)
    }
}

#[async_trait]
impl Loader for StaticRasterLoader {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn prepare(&self) -> SourceResult<()> {
        let target = self.target_path();
        if target.is_file() {
            return Ok(());
        }
        let Some(url) = self.descriptor.remote_url.as_deref() else {
            // Nothing to fetch from; discovery reports the missing file.
            return Ok(());
        };

        info!(source = %self.descriptor.source_id, url, target = %target.display(), "Fetching static raster");
        let result = match &self.fetcher {
            Some(fetcher) => fetcher.fetch(url, &target).await,
            None => match HttpFetcher::new() {
                Ok(fetcher) => fetcher.fetch(url, &target).await,
                Err(e) => Err(e),
            },
        };
        result.map_err(|e| SourceError::Fetch(e.to_string()))
    }

    async fn products(&self) -> SourceResult<Vec<ProductDefinition>> {
        Ok(vec![products::relief_product(
            &self.descriptor.product_names[0],
        )])
    }

    fn discover(&self) -> SourceResult<Box<dyn Iterator<Item = Discovered> + Send>> {
        let target = self.target_path();
        if !target.is_file() {
            return Err(SourceError::MissingFile(target));
        }
        let matched = RawFileMatch {
            file_path: target,
            pattern_kind: PatternKind::StaticRaster,
            extracted_fields: BTreeMap::new(),
        };
        Ok(Box::new(std::iter::once(Discovered::Match(matched))))
    }

    async fn parse(&self, matched: &RawFileMatch) -> Result<ParsedRaster, ParseFailure> {
        let path = &matched.file_path;
        let raster_header = header::read_raster_header(path)
            .await
            .map_err(|e| ParseFailure::new(path, e.to_string()))?;

        let product = products::relief_product(&self.descriptor.product_names[0]);
        let mut parts = RecordParts::new(
            product.name,
            path.display().to_string(),
            product.measurements,
        );
        parts.fallback_time = Some(AcquisitionTime::instant(modification_time(path).await?));

        Ok(ParsedRaster {
            path: path.clone(),
            parts,
            header: raster_header,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use std::path::Path;
    use test_utils::{NetCdfBuilder, VarBuilder};

    fn relief_bytes() -> Vec<u8> {
        NetCdfBuilder::grid(-180.0, -90.0, 180.0, 90.0, 8, 4)
            .with_variable(
                VarBuilder::floats("z")
                    .with_dims(&["lat", "lon"])
                    .with_values(&[-42.0; 32]),
            )
            .build()
    }

    fn descriptor(root: &Path) -> SourceDescriptor {
        SourceDescriptor::new("global_relief", root, vec!["global_relief".to_string()])
    }

    struct WritingFetcher;

    #[async_trait]
    impl RemoteFetcher for WritingFetcher {
        async fn fetch(&self, _url: &str, dest: &Path) -> Result<(), FetchError> {
            std::fs::write(dest, relief_bytes())?;
            Ok(())
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl RemoteFetcher for FailingFetcher {
        async fn fetch(&self, _url: &str, _dest: &Path) -> Result<(), FetchError> {
            Err(FetchError::Status(reqwest::StatusCode::BAD_GATEWAY))
        }
    }

    #[tokio::test]
    async fn prepare_skips_fetch_when_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("relief.nc");
        std::fs::write(&target, relief_bytes()).unwrap();

        let d = descriptor(dir.path()).with_remote(
            Some("http://example.test/relief.nc".to_string()),
            Some("relief.nc".to_string()),
        );
        // A fetcher that would fail proves prepare never calls it.
        let loader = StaticRasterLoader::with_fetcher(d, Arc::new(FailingFetcher)).unwrap();
        loader.prepare().await.unwrap();
    }

    #[tokio::test]
    async fn prepare_fetches_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let d = descriptor(dir.path()).with_remote(
            Some("http://example.test/relief.nc".to_string()),
            Some("relief.nc".to_string()),
        );
        let loader = StaticRasterLoader::with_fetcher(d, Arc::new(WritingFetcher)).unwrap();

        loader.prepare().await.unwrap();
        assert!(dir.path().join("relief.nc").is_file());

        let matches: Vec<Discovered> = loader.discover().unwrap().collect();
        assert_eq!(matches.len(), 1);
    }

    #[tokio::test]
    async fn failed_fetch_is_a_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let d = descriptor(dir.path()).with_remote(
            Some("http://example.test/relief.nc".to_string()),
            Some("relief.nc".to_string()),
        );
        let loader = StaticRasterLoader::with_fetcher(d, Arc::new(FailingFetcher)).unwrap();

        assert!(matches!(loader.prepare().await, Err(SourceError::Fetch(_))));
    }

    #[tokio::test]
    async fn missing_file_without_url_surfaces_at_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let loader = StaticRasterLoader::boxed(descriptor(dir.path())).unwrap();

        loader.prepare().await.unwrap();
        assert!(matches!(
            loader.discover(),
            Err(SourceError::MissingFile(_))
        ));
    }

    #[tokio::test]
    async fn parse_builds_a_relief_record() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join(DEFAULT_RELIEF_FILE);
        std::fs::write(&target, relief_bytes()).unwrap();

        let loader = StaticRasterLoader::boxed(descriptor(dir.path())).unwrap();
        let matched = loader
            .discover()
            .unwrap()
            .find_map(|d| match d {
                Discovered::Match(m) => Some(m),
                Discovered::Skipped(_) => None,
            })
            .unwrap();

        let parsed = loader.parse(&matched).await.unwrap();
        let record = loader.build_record(parsed).unwrap();
        assert_eq!(record.product_name, "global_relief");
        assert_eq!(record.bands[0].name, "z");
        assert_eq!(record.geometry.min_x, -180.0);
    }
}
