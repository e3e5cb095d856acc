//! Document download and page extraction
//!
//! Failures here are file-scoped: a document that cannot be downloaded or
//! parsed becomes a file without pages and the work is still stored.

use crate::errors::IngestionError;
use crate::pdf::extract_pages;
use crate::rate_limit::RequestPacer;
use async_trait::async_trait;
use repoharvest_common::catalog::Page;
use repoharvest_common::metrics::DownloadTimer;
use tracing::{debug, instrument, warn};

/// Turns a document URL into its pages
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Pages in document order; empty when the document is unavailable
    async fn extract(&self, url: &str) -> Vec<Page>;
}

/// HTTP downloader backed by the PDF page extractor
pub struct ContentExtractor {
    client: reqwest::Client,
    pacer: RequestPacer,
}

impl ContentExtractor {
    pub fn new(client: reqwest::Client, pacer: RequestPacer) -> Self {
        Self { client, pacer }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, IngestionError> {
        self.pacer.acquire().await;

        let timer = DownloadTimer::start();
        let result = async {
            let bytes = self
                .client
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?;
            Ok::<_, reqwest::Error>(bytes.to_vec())
        }
        .await;
        timer.finish(result.is_ok());

        result.map_err(|e| IngestionError::DownloadError {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    async fn try_extract(&self, url: &str) -> Result<Vec<Page>, IngestionError> {
        if url.is_empty() {
            return Err(IngestionError::DownloadError {
                url: String::new(),
                message: "file has no download URL".into(),
            });
        }

        let bytes = self.download(url).await?;
        debug!(size = bytes.len(), "Document downloaded");

        // Parsing is CPU bound
        let parsed = tokio::task::spawn_blocking(move || extract_pages(&bytes))
            .await
            .map_err(|e| IngestionError::PdfParseError {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        parsed.map_err(|e| IngestionError::PdfParseError {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ContentSource for ContentExtractor {
    #[instrument(skip(self))]
    async fn extract(&self, url: &str) -> Vec<Page> {
        match self.try_extract(url).await {
            Ok(pages) => {
                debug!(pages = pages.len(), "Document extracted");
                pages
            }
            Err(e) => {
                warn!(error = %e, "Document unavailable, storing file without pages");
                Vec::new()
            }
        }
    }
}
