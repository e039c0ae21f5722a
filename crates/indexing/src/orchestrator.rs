//! Sequential sweep over the configured sources.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use catalog::{CatalogStore, RegistrationStatus};

use crate::loaders::{Discovered, Loader};
use crate::registrar::Registrar;

const FAILURE_SAMPLE_LIMIT: usize = 5;

/// Per-source lifecycle. Transitions only move forward; a source that
/// fails at any step jumps straight to `Summarized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Pending,
    Discovering,
    Processing,
    Summarized,
}

#[derive(Debug, Clone)]
pub struct SourceSummary {
    pub source_id: String,
    pub state: SourceState,
    pub inserted: usize,
    pub skipped_duplicate: usize,
    pub failed: usize,
    pub parse_failures: usize,
    pub skipped_files: usize,
    pub source_error: Option<String>,
    pub failure_samples: Vec<String>,
}

impl SourceSummary {
    fn new(source_id: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            state: SourceState::Pending,
            inserted: 0,
            skipped_duplicate: 0,
            failed: 0,
            parse_failures: 0,
            skipped_files: 0,
            source_error: None,
            failure_samples: Vec::new(),
        }
    }

    fn sample(&mut self, reason: String) {
        if self.failure_samples.len() < FAILURE_SAMPLE_LIMIT {
            self.failure_samples.push(reason);
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub sources: Vec<SourceSummary>,
}

impl RunReport {
    /// Write the final per-source report to the log.
    pub fn log(&self) {
        for summary in &self.sources {
            info!(
                source = %summary.source_id,
                inserted = summary.inserted,
                skipped_duplicate = summary.skipped_duplicate,
                failed = summary.failed,
                parse_failures = summary.parse_failures,
                skipped_files = summary.skipped_files,
                source_error = summary.source_error.as_deref().unwrap_or("none"),
                "Source summary"
            );
            for sample in &summary.failure_samples {
                warn!(source = %summary.source_id, "Failure sample: {}", sample);
            }
        }
    }
}

pub struct Orchestrator {
    loaders: Vec<Box<dyn Loader>>,
    store: Arc<dyn CatalogStore>,
}

impl Orchestrator {
    pub fn new(loaders: Vec<Box<dyn Loader>>, store: Arc<dyn CatalogStore>) -> Self {
        Self { loaders, store }
    }

    /// Run every source once, in order. A failing source never stops
    /// the ones after it.
    pub async fn run(&self) -> RunReport {
        let mut sources = Vec::with_capacity(self.loaders.len());
        for loader in &self.loaders {
            sources.push(self.run_source(loader.as_ref()).await);
        }
        RunReport { sources }
    }

    async fn run_source(&self, loader: &dyn Loader) -> SourceSummary {
        let mut summary = SourceSummary::new(loader.source_id());
        info!(source = %summary.source_id, "Processing source");
        let registrar = Registrar::new(self.store.as_ref());

        if let Err(e) = loader.prepare().await {
            return fail_source(summary, e.to_string());
        }

        let products = match loader.products().await {
            Ok(products) => products,
            Err(e) => return fail_source(summary, e.to_string()),
        };
        for product in &products {
            if let Err(e) = registrar.ensure_product(product).await {
                return fail_source(summary, e.to_string());
            }
        }

        summary.state = SourceState::Discovering;
        let discovered = match loader.discover() {
            Ok(discovered) => discovered,
            Err(e) => return fail_source(summary, e.to_string()),
        };

        summary.state = SourceState::Processing;
        for item in discovered {
            match item {
                Discovered::Skipped(path) => {
                    debug!(path = %path.display(), "Skipping unrecognized file");
                    summary.skipped_files += 1;
                }
                Discovered::Match(matched) => {
                    let built = match loader.parse(&matched).await {
                        Ok(parsed) => loader.build_record(parsed),
                        Err(failure) => Err(failure),
                    };
                    let record = match built {
                        Ok(record) => record,
                        Err(failure) => {
                            warn!(
                                path = %failure.path.display(),
                                reason = %failure.reason,
                                "Parse failure"
                            );
                            summary.parse_failures += 1;
                            summary.sample(failure.to_string());
                            continue;
                        }
                    };

                    let outcome = registrar.register(&record).await;
                    match outcome.status {
                        RegistrationStatus::Inserted => {
                            info!(uri = %outcome.record.uri, product = %outcome.record.product_name, "Registered dataset");
                            summary.inserted += 1;
                        }
                        RegistrationStatus::SkippedDuplicate => {
                            debug!(uri = %outcome.record.uri, "Already registered");
                            summary.skipped_duplicate += 1;
                        }
                        RegistrationStatus::Failed => {
                            let detail = outcome.error_detail.as_deref().unwrap_or("unknown");
                            warn!(uri = %outcome.record.uri, error = %detail, "Registration failed");
                            summary.failed += 1;
                            summary.sample(format!("{}: {}", outcome.record.uri, detail));
                        }
                    }
                }
            }
        }

        summary.state = SourceState::Summarized;
        info!(
            source = %summary.source_id,
            inserted = summary.inserted,
            skipped_duplicate = summary.skipped_duplicate,
            failed = summary.failed,
            parse_failures = summary.parse_failures,
            "Source complete"
        );
        summary
    }
}

fn fail_source(mut summary: SourceSummary, detail: String) -> SourceSummary {
    error!(source = %summary.source_id, error = %detail, "Source failed");
    summary.source_error = Some(detail);
    summary.state = SourceState::Summarized;
    summary
}
