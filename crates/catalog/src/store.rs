//! Store interface the registrar writes through.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::records::{CatalogRecord, ProductDefinition};

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Append-only catalog operations.
///
/// The pipeline never updates or deletes existing rows; `add_dataset`
/// must leave a pre-existing row under the same id untouched so that
/// duplicate detection stays race-free even if callers overlap.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Fetch the stored definition for `name`, if the product exists.
    async fn find_product(&self, name: &str) -> CatalogResult<Option<ProductDefinition>>;

    /// Store a product definition. A pre-existing product with the same
    /// name is left as is.
    async fn add_product(&self, definition: &ProductDefinition) -> CatalogResult<()>;

    /// Content digest stored under `identity`, or None when absent.
    async fn dataset_digest(&self, identity: Uuid) -> CatalogResult<Option<Uuid>>;

    /// Insert one dataset row keyed by the record's identity.
    ///
    /// Returns false when a row with that identity already exists; the
    /// stored row wins and the argument is discarded.
    async fn add_dataset(&self, record: &CatalogRecord) -> CatalogResult<bool>;
}
