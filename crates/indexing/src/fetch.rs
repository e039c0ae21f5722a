//! Remote retrieval for sources that fetch their raster on first run.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::info;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Downloads a file to a local destination. Injection point for tests.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), FetchError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(600))
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        // Stream into a partial file and rename only once the write is
        // complete, so an interrupted download never looks like a raster.
        let file_name = dest.file_name().and_then(|s| s.to_str()).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "Destination has no file name")
        })?;
        let partial = dest.with_file_name(format!("{}.partial", file_name));

        let mut file = File::create(&partial).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&partial, dest).await?;
        info!(url, dest = %dest.display(), "Download complete");
        Ok(())
    }
}
