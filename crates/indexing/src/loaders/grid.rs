//! Flat folders of forecast-model NetCDF grids.
//!
//! One loader covers the ocean-model and weather-model sources; the
//! measurement table is fixed per source id. Geometry comes from the
//! coordinate ranges in the file header, time from the file's CF time
//! variable with modification time as the fallback.

use std::collections::BTreeMap;

use async_trait::async_trait;

use catalog::ProductDefinition;
use raster_common::AcquisitionTime;

use crate::descriptor::SourceDescriptor;
use crate::error::{ConfigError, ParseFailure, SourceError, SourceResult};
use crate::header;
use crate::loaders::{
    modification_time, Discovered, Loader, ParsedRaster, PatternKind, RawFileMatch,
};
use crate::normalize::RecordParts;
use crate::products;

pub struct ForecastGridLoader {
    descriptor: SourceDescriptor,
    product: ProductDefinition,
}

impl ForecastGridLoader {
    pub fn boxed(descriptor: SourceDescriptor) -> Result<Box<dyn Loader>, ConfigError> {
        descriptor.expect_arity(1)?;
        let product =
            products::forecast_product(&descriptor.source_id, &descriptor.product_names[0])
                .ok_or_else(|| ConfigError::UnknownSource(descriptor.source_id.clone()))?;
        Ok(Box::new(Self { descriptor, product }))
    }
}

#[async_trait]
impl Loader for ForecastGridLoader {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn products(&self) -> SourceResult<Vec<ProductDefinition>> {
        Ok(vec![self.product.clone()])
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
                Some(name) if name.ends_with(".nc") => {
                    results.push(Discovered::Match(RawFileMatch {
                        file_path: path,
                        pattern_kind: PatternKind::ForecastGrid,
                        extracted_fields: BTreeMap::new(),
                    }));
                }
                _ => results.push(Discovered::Skipped(path)),
            }
        }
        Ok(Box::new(results.into_iter()))
    }

    async fn parse(&self, matched: &RawFileMatch) -> Result<ParsedRaster, ParseFailure> {
        let path = &matched.file_path;
        let raster_header = header::read_raster_header(path)
            .await
            .map_err(|e| ParseFailure::new(path, e.to_string()))?;

        let mut parts = RecordParts::new(
            self.product.name.clone(),
            path.display().to_string(),
            self.product.measurements.clone(),
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
    use chrono::{DateTime, TimeZone, Utc};
    use std::path::Path;
    use test_utils::{NetCdfBuilder, VarBuilder};

    fn descriptor(source_id: &str, root: &Path, product: &str) -> SourceDescriptor {
        SourceDescriptor::new(source_id, root, vec![product.to_string()])
    }

    fn physics_grid() -> Vec<u8> {
        NetCdfBuilder::grid(-10.0, 40.0, 5.0, 55.0, 4, 4)
            .with_record_time("hours since 2023-04-01 00:00:00", &[6.0])
            .with_variable(
                VarBuilder::floats("thetao")
                    .with_dims(&["time", "lat", "lon"])
                    .with_values(&[12.5; 16]),
            )
            .build()
    }

    #[test]
    fn unknown_family_is_a_config_error() {
        let d = descriptor("cmems_tides", Path::new("/data/tides"), "tides");
        assert!(ForecastGridLoader::boxed(d).is_err());
    }

    #[tokio::test]
    async fn products_use_the_fixed_table() {
        let d = descriptor("cmems_physics", Path::new("/data/physics"), "physics");
        let loader = ForecastGridLoader::boxed(d).unwrap();
        let product = loader.products().await.unwrap().remove(0);
        assert_eq!(product.name, "physics");
        let names: Vec<&str> = product.measurements.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["thetao", "zos", "so"]);
    }

    #[tokio::test]
    async fn discovery_matches_only_netcdf_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.nc"), physics_grid()).unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"notes").unwrap();

        let d = descriptor("cmems_physics", dir.path(), "physics");
        let loader = ForecastGridLoader::boxed(d).unwrap();
        let discovered: Vec<Discovered> = loader.discover().unwrap().collect();

        let matched = discovered
            .iter()
            .filter(|d| matches!(d, Discovered::Match(_)))
            .count();
        assert_eq!(matched, 1);
        assert_eq!(discovered.len() - matched, 1);
    }

    #[tokio::test]
    async fn time_comes_from_the_file_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phys_20230401.nc");
        std::fs::write(&path, physics_grid()).unwrap();

        let d = descriptor("cmems_physics", dir.path(), "physics");
        let loader = ForecastGridLoader::boxed(d).unwrap();
        let matched = RawFileMatch {
            file_path: path,
            pattern_kind: PatternKind::ForecastGrid,
            extracted_fields: BTreeMap::new(),
        };

        let parsed = loader.parse(&matched).await.unwrap();
        let record = loader.build_record(parsed).unwrap();
        assert_eq!(
            record.time.start(),
            Utc.with_ymd_and_hms(2023, 4, 1, 6, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn missing_time_variable_falls_back_to_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notime.nc");
        let bytes = NetCdfBuilder::grid(-10.0, 40.0, 5.0, 55.0, 4, 4)
            .with_variable(
                VarBuilder::floats("thetao")
                    .with_dims(&["lat", "lon"])
                    .with_values(&[12.5; 16]),
            )
            .build();
        std::fs::write(&path, bytes).unwrap();

        let d = descriptor("cmems_physics", dir.path(), "physics");
        let loader = ForecastGridLoader::boxed(d).unwrap();
        let matched = RawFileMatch {
            file_path: path.clone(),
            pattern_kind: PatternKind::ForecastGrid,
            extracted_fields: BTreeMap::new(),
        };

        let parsed = loader.parse(&matched).await.unwrap();
        let expected = DateTime::<Utc>::from(std::fs::metadata(&path).unwrap().modified().unwrap());
        let record = loader.build_record(parsed).unwrap();
        assert_eq!(record.time.start(), expected);
    }
}
