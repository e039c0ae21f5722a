//! Tiled imagery collections with companion subfolders.
//!
//! Layout: `<root>/tiles/{s2,s2_scl,lcs}/*.tif` plus an optional
//! `<root>/investigative/*.tif`. The three subfolders carry the same
//! basenames; each subfolder position routes to the product name at the
//! same position in the descriptor.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

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

const TILE_SUBFOLDERS: [(&str, PatternKind); 3] = [
    ("s2", PatternKind::TiledImagery),
    ("s2_scl", PatternKind::TiledSceneClassification),
    ("lcs", PatternKind::TiledLandCover),
];

const CAMPAIGN_PROCESSING_DATE: &str = "2021-10-12T12:00:00Z";

pub struct TiledCollectionLoader {
    descriptor: SourceDescriptor,
}

impl TiledCollectionLoader {
    pub fn boxed(descriptor: SourceDescriptor) -> Result<Box<dyn Loader>, ConfigError> {
        descriptor.expect_arity(3)?;
        Ok(Box::new(Self { descriptor }))
    }

    /// The collection is a one-time snapshot; every record carries the
    /// same acquisition instant.
    fn campaign_time() -> AcquisitionTime {
        AcquisitionTime::instant(Utc.with_ymd_and_hms(2020, 8, 1, 12, 0, 0).unwrap())
    }

    fn role_for(kind: PatternKind) -> Option<usize> {
        match kind {
            PatternKind::TiledImagery | PatternKind::Investigative => Some(0),
            PatternKind::TiledSceneClassification => Some(1),
            PatternKind::TiledLandCover => Some(2),
            _ => None,
        }
    }

    fn list_tile_names(
        dir: &Path,
        skipped: &mut Vec<Discovered>,
    ) -> SourceResult<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        if !dir.is_dir() {
            // The companion check below turns every basename expected
            // here into a per-file failure.
            return Ok(names);
        }
        for entry in walkdir::WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| SourceError::Walk(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            match entry.file_name().to_str() {
                Some(name) if name.ends_with(".tif") => {
                    names.insert(name.to_string());
                }
                _ => skipped.push(Discovered::Skipped(entry.path().to_path_buf())),
            }
        }
        Ok(names)
    }
}

/// Extract `class`, `lon`, `lat` and `index` from
/// `<class>_<lon>-<lat>_<index>.tif`. Coordinates in this grammar are
/// non-negative; a name that does not fit yields no fields.
fn tile_fields(name: &str) -> BTreeMap<String, String> {
    fn parse(name: &str) -> Option<BTreeMap<String, String>> {
        let stem = name.strip_suffix(".tif")?;
        let (rest, index) = stem.rsplit_once('_')?;
        let (class, center) = rest.rsplit_once('_')?;
        let (lon, lat) = center.split_once('-')?;
        lon.parse::<f64>().ok()?;
        lat.parse::<f64>().ok()?;
        index.parse::<u32>().ok()?;

        let mut fields = BTreeMap::new();
        fields.insert("class".to_string(), class.to_string());
        fields.insert("lon".to_string(), lon.to_string());
        fields.insert("lat".to_string(), lat.to_string());
        fields.insert("index".to_string(), index.to_string());
        Some(fields)
    }
    parse(name).unwrap_or_default()
}

#[async_trait]
impl Loader for TiledCollectionLoader {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn products(&self) -> SourceResult<Vec<ProductDefinition>> {
        Ok(products::anthroprotect_products(
            &self.descriptor.product_names,
        ))
    }

    fn discover(&self) -> SourceResult<Box<dyn Iterator<Item = Discovered> + Send>> {
        let root = &self.descriptor.root_folder;
        if !root.is_dir() {
            return Err(SourceError::FolderMissing(root.clone()));
        }
        let tiles = root.join("tiles");
        if !tiles.is_dir() {
            return Err(SourceError::FolderMissing(tiles));
        }

        // The companion check needs every subfolder's basenames before
        // the first match goes out, so this source lists eagerly.
        let mut results = Vec::new();
        let mut union: BTreeSet<String> = BTreeSet::new();
        for (sub, _) in TILE_SUBFOLDERS {
            let names = Self::list_tile_names(&tiles.join(sub), &mut results)?;
            union.extend(names);
        }

        for (sub, kind) in TILE_SUBFOLDERS {
            for name in &union {
                results.push(Discovered::Match(RawFileMatch {
                    file_path: tiles.join(sub).join(name),
                    pattern_kind: kind,
                    extracted_fields: tile_fields(name),
                }));
            }
        }

        let investigative = root.join("investigative");
        if investigative.is_dir() {
            for entry in walkdir::WalkDir::new(&investigative)
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
                            pattern_kind: PatternKind::Investigative,
                            extracted_fields: tile_fields(name),
                        }));
                    }
                    _ => results.push(Discovered::Skipped(path)),
                }
            }
        }

        Ok(Box::new(results.into_iter()))
    }

    async fn parse(&self, matched: &RawFileMatch) -> Result<ParsedRaster, ParseFailure> {
        let path = &matched.file_path;
        let role = Self::role_for(matched.pattern_kind)
            .ok_or_else(|| ParseFailure::new(path, "Unexpected pattern for this source"))?;

        // Tile names must parse; investigative files may carry free-form
        // names, in which case geometry comes from the header alone.
        if matched.extracted_fields.is_empty()
            && matched.pattern_kind != PatternKind::Investigative
        {
            return Err(ParseFailure::new(
                path,
                "Filename does not match <class>_<lon>-<lat>_<index>.tif",
            ));
        }

        let raster_header = header::read_raster_header(path)
            .await
            .map_err(|e| ParseFailure::new(path, e.to_string()))?;

        let product = &products::anthroprotect_products(&self.descriptor.product_names)[role];
        let mut parts = RecordParts::new(
            product.name.clone(),
            path.display().to_string(),
            product.measurements.clone(),
        );
        parts.fallback_time = Some(Self::campaign_time());
        parts
            .extra_metadata
            .insert("processing_date".to_string(), CAMPAIGN_PROCESSING_DATE.to_string());

        if let (Some(lon), Some(lat)) = (
            matched.extracted_fields.get("lon"),
            matched.extracted_fields.get("lat"),
        ) {
            let lon = lon
                .parse::<f64>()
                .map_err(|e| ParseFailure::new(path, format!("Bad longitude field: {}", e)))?;
            let lat = lat
                .parse::<f64>()
                .map_err(|e| ParseFailure::new(path, format!("Bad latitude field: {}", e)))?;
            parts.filename_center = Some((lon, lat));
        }
        if let Some(class) = matched.extracted_fields.get("class") {
            parts
                .extra_metadata
                .insert("class".to_string(), class.clone());
        }
        if let Some(index) = matched.extracted_fields.get("index") {
            parts
                .extra_metadata
                .insert("tile_index".to_string(), index.clone());
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
    use std::path::PathBuf;

    fn descriptor(root: &Path) -> SourceDescriptor {
        SourceDescriptor::new(
            "anthroprotect",
            root,
            vec!["s2".to_string(), "s2_scl".to_string(), "lcs".to_string()],
        )
    }

    #[test]
    fn tile_grammar_extracts_all_fields() {
        let fields = tile_fields("anthropo_21.738-63.722_2.tif");
        assert_eq!(fields.get("class").unwrap(), "anthropo");
        assert_eq!(fields.get("lon").unwrap(), "21.738");
        assert_eq!(fields.get("lat").unwrap(), "63.722");
        assert_eq!(fields.get("index").unwrap(), "2");
    }

    #[test]
    fn tile_grammar_keeps_hyphenated_class_names() {
        let fields = tile_fields("wdpa-Ia_21.7-63.7_0.tif");
        assert_eq!(fields.get("class").unwrap(), "wdpa-Ia");
        assert_eq!(fields.get("lon").unwrap(), "21.7");
        assert_eq!(fields.get("lat").unwrap(), "63.7");
    }

    #[test]
    fn tile_grammar_rejects_malformed_names() {
        assert!(tile_fields("notatile.tif").is_empty());
        assert!(tile_fields("anthropo_21.7x63.7_0.tif").is_empty());
        assert!(tile_fields("anthropo_21.7-63.7_z.tif").is_empty());
        assert!(tile_fields("anthropo_21.7-63.7_0.nc").is_empty());
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let d = SourceDescriptor::new(
            "anthroprotect",
            Path::new("/data/anthroprotect"),
            vec!["s2".to_string()],
        );
        assert!(TiledCollectionLoader::boxed(d).is_err());
    }

    #[tokio::test]
    async fn discovery_unions_basenames_across_subfolders() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for sub in ["s2", "s2_scl", "lcs"] {
            std::fs::create_dir_all(root.join("tiles").join(sub)).unwrap();
        }
        for sub in ["s2", "s2_scl", "lcs"] {
            std::fs::write(
                root.join("tiles").join(sub).join("anthropo_21.7-63.7_0.tif"),
                b"stub",
            )
            .unwrap();
        }
        // Present in one subfolder only; companions must still be expected.
        std::fs::write(
            root.join("tiles").join("s2").join("anthropo_22.0-64.0_1.tif"),
            b"stub",
        )
        .unwrap();
        std::fs::write(root.join("tiles").join("s2").join("notes.yaml"), b"x").unwrap();

        let loader = TiledCollectionLoader::boxed(descriptor(root)).unwrap();
        let discovered: Vec<Discovered> = loader.discover().unwrap().collect();

        let matches: Vec<&RawFileMatch> = discovered
            .iter()
            .filter_map(|d| match d {
                Discovered::Match(m) => Some(m),
                Discovered::Skipped(_) => None,
            })
            .collect();
        // Two basenames in the union, expected in all three subfolders.
        assert_eq!(matches.len(), 6);
        let skipped = discovered.len() - matches.len();
        assert_eq!(skipped, 1);

        let scl_paths: Vec<&PathBuf> = matches
            .iter()
            .filter(|m| m.pattern_kind == PatternKind::TiledSceneClassification)
            .map(|m| &m.file_path)
            .collect();
        assert!(scl_paths
            .iter()
            .any(|p| p.ends_with("tiles/s2_scl/anthropo_22.0-64.0_1.tif")));
    }

    #[tokio::test]
    async fn missing_root_is_a_source_error() {
        let loader =
            TiledCollectionLoader::boxed(descriptor(Path::new("/no/such/folder"))).unwrap();
        assert!(matches!(
            loader.discover(),
            Err(SourceError::FolderMissing(_))
        ));
    }

    #[tokio::test]
    async fn investigative_files_route_to_first_product() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for sub in ["s2", "s2_scl", "lcs"] {
            std::fs::create_dir_all(root.join("tiles").join(sub)).unwrap();
        }
        std::fs::create_dir_all(root.join("investigative")).unwrap();
        std::fs::write(root.join("investigative").join("oulanka.tif"), b"stub").unwrap();

        let loader = TiledCollectionLoader::boxed(descriptor(root)).unwrap();
        let matches: Vec<RawFileMatch> = loader
            .discover()
            .unwrap()
            .filter_map(|d| match d {
                Discovered::Match(m) => Some(m),
                Discovered::Skipped(_) => None,
            })
            .collect();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].pattern_kind, PatternKind::Investigative);
        // Free-form investigative names carry no grammar fields.
        assert!(matches[0].extracted_fields.is_empty());
    }

    #[tokio::test]
    async fn bad_grammar_in_tiles_fails_at_parse() {
        let loader =
            TiledCollectionLoader::boxed(descriptor(Path::new("/data/anthroprotect"))).unwrap();
        let matched = RawFileMatch {
            file_path: PathBuf::from("/data/anthroprotect/tiles/s2/badname.tif"),
            pattern_kind: PatternKind::TiledImagery,
            extracted_fields: BTreeMap::new(),
        };
        let err = loader.parse(&matched).await.unwrap_err();
        assert!(err.reason.contains("does not match"));
    }
}
