//! Catalog data model and store backends.
//!
//! Defines the canonical record shapes the ingestion pipeline produces
//! (products, dataset records, registration outcomes) and the
//! [`CatalogStore`] trait they are written through, with a PostgreSQL
//! implementation for deployments and an in-memory one for tests.

pub mod memory;
pub mod postgres;
pub mod records;
pub mod store;

pub use memory::MemoryCatalog;
pub use postgres::PgCatalog;
pub use records::{
    BandDescriptor, BandSource, CatalogRecord, ProductDefinition, RecordRef,
    RecordValidationError, RegistrationOutcome, RegistrationStatus,
};
pub use store::{CatalogError, CatalogResult, CatalogStore};
