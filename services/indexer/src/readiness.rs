//! Startup gate for the catalog database.
//!
//! Probes reachability with a bounded retry budget so the service fails
//! fast when the database never comes up instead of hammering a dead
//! host forever.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use catalog::PgCatalog;

#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("Catalog unreachable after {attempts} attempt(s)")]
    Exhausted { attempts: u32 },
}

/// Injected delay so tests can run the retry loop on an instant clock.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// One reachability attempt against the catalog.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn attempt(&self) -> bool;
}

/// Probes the catalog in three stages: an optional ICMP ping, a plain
/// TCP connect, then an authenticated database connection.
pub struct DatabaseProbe {
    host: String,
    port: u16,
    database_url: String,
    ping: bool,
}

impl DatabaseProbe {
    pub fn new(host: &str, port: u16, database_url: &str, ping: bool) -> Self {
        Self {
            host: host.to_string(),
            port,
            database_url: database_url.to_string(),
            ping,
        }
    }

    async fn ping_host(&self) -> bool {
        match tokio::process::Command::new("ping")
            .args(["-c", "1", &self.host])
            .output()
            .await
        {
            Ok(output) => output.status.success(),
            // No ping binary on this system; the TCP stage still runs.
            Err(e) => {
                debug!(error = %e, "ping unavailable, skipping");
                true
            }
        }
    }
}

#[async_trait]
impl Probe for DatabaseProbe {
    async fn attempt(&self) -> bool {
        if self.ping && !self.ping_host().await {
            debug!(host = %self.host, "Host does not answer ping");
            return false;
        }
        if let Err(e) = TcpStream::connect((self.host.as_str(), self.port)).await {
            debug!(host = %self.host, port = self.port, error = %e, "TCP connect failed");
            return false;
        }
        match PgCatalog::connect(&self.database_url).await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Database connection failed");
                false
            }
        }
    }
}

/// Retry `probe` until it succeeds or the budget runs out.
///
/// Returns the number of attempts made, for the startup log.
pub async fn wait_until_ready(
    probe: &dyn Probe,
    max_attempts: u32,
    delay: Duration,
    sleeper: &dyn Sleeper,
) -> Result<u32, ReadinessError> {
    for attempt in 1..=max_attempts {
        if probe.attempt().await {
            return Ok(attempt);
        }
        if attempt < max_attempts {
            warn!(
                attempt,
                max_attempts,
                delay_secs = delay.as_secs(),
                "Catalog not ready, retrying"
            );
            sleeper.sleep(delay).await;
        }
    }
    Err(ReadinessError::Exhausted {
        attempts: max_attempts,
    })
}
