//! Idempotent registration of records against the catalog.

use tracing::{debug, info};

use catalog::{CatalogRecord, CatalogStore, ProductDefinition, RecordRef, RegistrationOutcome};

use crate::error::{SourceError, SourceResult};

pub struct Registrar<'a> {
    store: &'a dyn CatalogStore,
}

impl<'a> Registrar<'a> {
    pub fn new(store: &'a dyn CatalogStore) -> Self {
        Self { store }
    }

    /// Create the product if absent, verify compatibility if present.
    ///
    /// An existing definition is never modified. A definition that
    /// disagrees on band names or types aborts the source, since every
    /// record it would register is suspect.
    pub async fn ensure_product(&self, product: &ProductDefinition) -> SourceResult<()> {
        match self.store.find_product(&product.name).await? {
            Some(existing) => {
                if existing.compatible_with(product) {
                    debug!(product = %product.name, "Product already registered");
                    Ok(())
                } else {
                    Err(SourceError::IncompatibleProduct {
                        name: product.name.clone(),
                    })
                }
            }
            None => {
                self.store.add_product(product).await?;
                info!(product = %product.name, "Registered product");
                Ok(())
            }
        }
    }

    /// Register one record, at most once.
    ///
    /// The record's identity is derived from its product name and URI,
    /// so re-running over the same files converges instead of piling up
    /// duplicates. A record whose identity exists with different content
    /// is reported as failed and the stored row is left untouched.
    pub async fn register(&self, record: &CatalogRecord) -> RegistrationOutcome {
        let handle = RecordRef::of(record);
        let digest = record.content_digest();

        match self.store.dataset_digest(handle.dataset_id).await {
            Ok(Some(stored)) if stored == digest => {
                return RegistrationOutcome::skipped_duplicate(handle);
            }
            Ok(Some(stored)) => {
                return RegistrationOutcome::failed(
                    handle,
                    format!(
                        "Record already registered with different content (stored digest {}, computed {})",
                        stored, digest
                    ),
                );
            }
            Ok(None) => {}
            Err(e) => return RegistrationOutcome::failed(handle, e.to_string()),
        }

        match self.store.add_dataset(record).await {
            Ok(true) => RegistrationOutcome::inserted(handle),
            Ok(false) => {
                // Lost a race with another writer. Whether that counts as
                // a duplicate depends on what actually landed.
                match self.store.dataset_digest(handle.dataset_id).await {
                    Ok(Some(stored)) if stored == digest => {
                        RegistrationOutcome::skipped_duplicate(handle)
                    }
                    Ok(Some(_)) => RegistrationOutcome::failed(
                        handle,
                        "Concurrent insert registered different content for this identity".to_string(),
                    ),
                    Ok(None) => RegistrationOutcome::failed(
                        handle,
                        "Insert did not take effect".to_string(),
                    ),
                    Err(e) => RegistrationOutcome::failed(handle, e.to_string()),
                }
            }
            Err(e) => RegistrationOutcome::failed(handle, e.to_string()),
        }
    }
}
