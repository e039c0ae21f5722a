//! Raster ingestion pipeline.
//!
//! Discovers raster files from independently structured sources,
//! normalizes each into a catalog record, and registers the result
//! idempotently against the spatial catalog.
//!
//! # Architecture
//!
//! One [`loaders::Loader`] per source family turns that family's folder
//! layout and filename grammar into parsed rasters; the normalizer
//! resolves geometry and time into validated records; the registrar
//! writes them at most once per identity; the orchestrator sweeps every
//! enabled source in a fixed order and reports per-source outcomes.

pub mod descriptor;
pub mod error;
pub mod fetch;
pub mod header;
pub mod loaders;
pub mod normalize;
pub mod orchestrator;
pub mod products;
pub mod registrar;

// Re-exports
pub use descriptor::{builtin_sources, data_root, SourceDescriptor, BUILTIN_SOURCE_IDS};
pub use error::{ConfigError, ParseFailure, SourceError, SourceResult};
pub use fetch::{FetchError, HttpFetcher, RemoteFetcher};
pub use header::RasterHeader;
pub use loaders::{build_loaders, Discovered, Loader, PatternKind, RawFileMatch};
pub use normalize::{normalize, NormalizeError, RecordParts, GEOMETRY_TOLERANCE_DEGREES};
pub use orchestrator::{Orchestrator, RunReport, SourceState, SourceSummary};
pub use registrar::Registrar;
