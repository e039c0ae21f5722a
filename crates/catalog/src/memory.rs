//! In-memory catalog store backing the test suites.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::records::{CatalogRecord, ProductDefinition};
use crate::store::{CatalogResult, CatalogStore};

/// HashMap-backed store with the same append-only contract as the
/// PostgreSQL implementation.
#[derive(Default)]
pub struct MemoryCatalog {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    products: HashMap<String, ProductDefinition>,
    datasets: HashMap<Uuid, StoredDataset>,
}

struct StoredDataset {
    digest: Uuid,
    record: CatalogRecord,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn product_count(&self) -> usize {
        self.inner.lock().await.products.len()
    }

    pub async fn dataset_count(&self) -> usize {
        self.inner.lock().await.datasets.len()
    }

    /// Stored record under `identity`, if any.
    pub async fn dataset(&self, identity: Uuid) -> Option<CatalogRecord> {
        self.inner
            .lock()
            .await
            .datasets
            .get(&identity)
            .map(|d| d.record.clone())
    }

    pub async fn product(&self, name: &str) -> Option<ProductDefinition> {
        self.inner.lock().await.products.get(name).cloned()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn find_product(&self, name: &str) -> CatalogResult<Option<ProductDefinition>> {
        Ok(self.inner.lock().await.products.get(name).cloned())
    }

    async fn add_product(&self, definition: &ProductDefinition) -> CatalogResult<()> {
        self.inner
            .lock()
            .await
            .products
            .entry(definition.name.clone())
            .or_insert_with(|| definition.clone());
        Ok(())
    }

    async fn dataset_digest(&self, identity: Uuid) -> CatalogResult<Option<Uuid>> {
        Ok(self
            .inner
            .lock()
            .await
            .datasets
            .get(&identity)
            .map(|d| d.digest))
    }

    async fn add_dataset(&self, record: &CatalogRecord) -> CatalogResult<bool> {
        let mut inner = self.inner.lock().await;
        if inner.datasets.contains_key(&record.identity()) {
            return Ok(false);
        }
        inner.datasets.insert(
            record.identity(),
            StoredDataset {
                digest: record.content_digest(),
                record: record.clone(),
            },
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::BandDescriptor;
    use chrono::{TimeZone, Utc};
    use raster_common::{AcquisitionTime, BoundingBox};

    fn record(uri: &str) -> CatalogRecord {
        CatalogRecord {
            product_name: "scenes".to_string(),
            uri: uri.to_string(),
            crs: "EPSG:4326".to_string(),
            geometry: BoundingBox::new(10.0, 50.0, 11.0, 51.0),
            time: AcquisitionTime::instant(Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap()),
            bands: vec![BandDescriptor::new("band_1", "uint16", 0.0)],
            extra_metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn add_dataset_is_first_writer_wins() {
        let store = MemoryCatalog::new();
        let first = record("/data/scenes/alps_20210601.tif");
        let mut second = first.clone();
        second.geometry = BoundingBox::new(12.0, 50.0, 13.0, 51.0);

        assert!(store.add_dataset(&first).await.unwrap());
        assert!(!store.add_dataset(&second).await.unwrap());

        let kept = store.dataset(first.identity()).await.unwrap();
        assert_eq!(kept.geometry, first.geometry);
        assert_eq!(store.dataset_count().await, 1);
    }

    #[tokio::test]
    async fn add_product_keeps_existing_definition() {
        let store = MemoryCatalog::new();
        let original = ProductDefinition::new(
            "scenes",
            vec![BandDescriptor::new("band_1", "uint16", 0.0)],
        );
        let replacement = ProductDefinition::new(
            "scenes",
            vec![BandDescriptor::new("band_1", "float32", -999.0)],
        );

        store.add_product(&original).await.unwrap();
        store.add_product(&replacement).await.unwrap();

        let stored = store.find_product("scenes").await.unwrap().unwrap();
        assert_eq!(stored.measurements[0].data_type, "uint16");
    }

    #[tokio::test]
    async fn dataset_digest_reports_stored_content() {
        let store = MemoryCatalog::new();
        let rec = record("/data/scenes/alps_20210601.tif");

        assert!(store.dataset_digest(rec.identity()).await.unwrap().is_none());
        store.add_dataset(&rec).await.unwrap();
        assert_eq!(
            store.dataset_digest(rec.identity()).await.unwrap(),
            Some(rec.content_digest())
        );
    }
}
