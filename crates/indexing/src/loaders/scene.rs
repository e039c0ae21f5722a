//! Flat folders of dated GeoTIFF scenes.
//!
//! Layout: `<root>/<name>_<YYYYMMDD>.tif`. Every file routes to the one
//! configured product; the product's band list is read from the first
//! scene that parses, since this source carries no fixed table.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use catalog::ProductDefinition;
use raster_common::AcquisitionTime;

use crate::descriptor::SourceDescriptor;
use crate::error::{ConfigError, ParseFailure, SourceError, SourceResult};
use crate::header;
use crate::loaders::{Discovered, Loader, ParsedRaster, PatternKind, RawFileMatch};
use crate::normalize::RecordParts;
use crate::products;

pub struct SingleSceneLoader {
    descriptor: SourceDescriptor,
}

impl SingleSceneLoader {
    pub fn boxed(descriptor: SourceDescriptor) -> Result<Box<dyn Loader>, ConfigError> {
        descriptor.expect_arity(1)?;
        Ok(Box::new(Self { descriptor }))
    }
}

/// Extract `name` and `date` from `<name>_<YYYYMMDD>.tif`.
fn scene_fields(name: &str) -> BTreeMap<String, String> {
    fn parse(name: &str) -> Option<BTreeMap<String, String>> {
        let stem = name.strip_suffix(".tif")?;
        let (scene, date) = stem.rsplit_once('_')?;
        if scene.is_empty() || date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), scene.to_string());
        fields.insert("date".to_string(), date.to_string());
        Some(fields)
    }
    parse(name).unwrap_or_default()
}

#[async_trait]
impl Loader for SingleSceneLoader {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn products(&self) -> SourceResult<Vec<ProductDefinition>> {
        for discovered in self.discover()? {
            let matched = match discovered {
                Discovered::Match(m) => m,
                Discovered::Skipped(_) => continue,
            };
            match header::read_raster_header(&matched.file_path).await {
                Ok(h) => {
                    return Ok(vec![products::scene_product(
                        &self.descriptor.product_names[0],
                        &h.band_types,
                        h.nodata.unwrap_or(0.0),
                    )]);
                }
                // Unreadable files surface as parse failures later.
                Err(_) => continue,
            }
        }
        Ok(Vec::new())
    }

    fn discover(&self) -> SourceResult<Box<dyn Iterator<Item = Discovered> + Send>> {
        let root = &self.descriptor.root_folder;
        if !root.is_dir() {
            return Err(SourceError::FolderMissing(root.clone()));
        }

        let mut results = Vec::new();
        for entry in walkdir::WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| SourceError::Walk(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path().to_path_buf();
            match entry.file_name().to_str() {
                Some(name) if name.ends_with(".tif") => {
                    results.push(Discovered::Match(RawFileMatch {
                        file_path: path,
                        pattern_kind: PatternKind::DatedScene,
                        extracted_fields: scene_fields(name),
                    }));
                }
                _ => results.push(Discovered::Skipped(path)),
            }
        }
        Ok(Box::new(results.into_iter()))
    }

    async fn parse(&self, matched: &RawFileMatch) -> Result<ParsedRaster, ParseFailure> {
        let path = &matched.file_path;
        let date_field = matched
            .extracted_fields
            .get("date")
            .ok_or_else(|| {
                ParseFailure::new(path, "Filename does not match <name>_<YYYYMMDD>.tif")
            })?;

        let date = AcquisitionTime::from_compact_date(date_field)
            .map_err(|e| ParseFailure::new(path, e.to_string()))?;
        let midday = Utc.from_utc_datetime(&date.and_hms_opt(12, 0, 0).unwrap());

        let raster_header = header::read_raster_header(path)
            .await
            .map_err(|e| ParseFailure::new(path, e.to_string()))?;

        let product = products::scene_product(
            &self.descriptor.product_names[0],
            &raster_header.band_types,
            raster_header.nodata.unwrap_or(0.0),
        );
        let mut parts = RecordParts::new(
            product.name,
            path.display().to_string(),
            product.measurements,
        );
        parts.filename_time = Some(AcquisitionTime::instant(midday));
        if let Some(scene) = matched.extracted_fields.get("name") {
            parts
                .extra_metadata
                .insert("scene".to_string(), scene.clone());
        }

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
    use std::path::Path;
    use test_utils::GeoTiffBuilder;

    fn descriptor(root: &Path) -> SourceDescriptor {
        SourceDescriptor::new("scenes", root, vec!["scenes".to_string()])
    }

    #[test]
    fn scene_grammar_extracts_name_and_date() {
        let fields = scene_fields("bremen_sealevel_20230401.tif");
        assert_eq!(fields.get("name").unwrap(), "bremen_sealevel");
        assert_eq!(fields.get("date").unwrap(), "20230401");
    }

    #[test]
    fn scene_grammar_rejects_malformed_names() {
        assert!(scene_fields("nodate.tif").is_empty());
        assert!(scene_fields("scene_2023.tif").is_empty());
        assert!(scene_fields("scene_2023040a.tif").is_empty());
        assert!(scene_fields("_20230401.tif").is_empty());
    }

    #[tokio::test]
    async fn parse_uses_midday_of_the_filename_date() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harbor_20230401.tif");
        std::fs::write(&path, GeoTiffBuilder::imagery_tile(8.8, 53.1).build()).unwrap();

        let loader = SingleSceneLoader::boxed(descriptor(dir.path())).unwrap();
        let matched = loader
            .discover()
            .unwrap()
            .find_map(|d| match d {
                Discovered::Match(m) => Some(m),
                Discovered::Skipped(_) => None,
            })
            .unwrap();

        let parsed = loader.parse(&matched).await.unwrap();
        let expected = Utc.with_ymd_and_hms(2023, 4, 1, 12, 0, 0).unwrap();
        assert_eq!(parsed.parts.filename_time.unwrap().start(), expected);
        assert_eq!(parsed.parts.extra_metadata.get("scene").unwrap(), "harbor");
    }

    #[tokio::test]
    async fn product_bands_come_from_the_first_scene_header() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("harbor_20230401.tif"),
            GeoTiffBuilder::imagery_tile(8.8, 53.1).build(),
        )
        .unwrap();

        let loader = SingleSceneLoader::boxed(descriptor(dir.path())).unwrap();
        let product = loader.products().await.unwrap().remove(0);
        assert_eq!(product.name, "scenes");
        assert!(!product.measurements.is_empty());
        assert!(product.measurements[0].name.starts_with("band_"));
    }

    #[tokio::test]
    async fn empty_folder_yields_no_products() {
        let dir = tempfile::tempdir().unwrap();
        let loader = SingleSceneLoader::boxed(descriptor(dir.path())).unwrap();
        assert!(loader.products().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn undated_tif_fails_at_parse() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("nodate.tif"),
            GeoTiffBuilder::imagery_tile(8.8, 53.1).build(),
        )
        .unwrap();

        let loader = SingleSceneLoader::boxed(descriptor(dir.path())).unwrap();
        let matched = loader
            .discover()
            .unwrap()
            .find_map(|d| match d {
                Discovered::Match(m) => Some(m),
                Discovered::Skipped(_) => None,
            })
            .unwrap();

        let err = loader.parse(&matched).await.unwrap_err();
        assert!(err.reason.contains("does not match"));
    }
}
