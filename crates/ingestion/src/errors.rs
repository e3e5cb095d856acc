//! Harvester error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Search page {page} for source {source_id} failed: {message}")]
    FetchError {
        source_id: String,
        page: u32,
        message: String,
    },

    #[error("Download of {url} failed: {message}")]
    DownloadError { url: String, message: String },

    #[error("PDF parse error for {url}: {message}")]
    PdfParseError { url: String, message: String },

    #[error("Database error: {0}")]
    DatabaseError(#[from] repoharvest_common::errors::AppError),
}

impl IngestionError {
    /// Only store failures that the common layer classifies as fatal stop
    /// the whole run
    pub fn is_fatal(&self) -> bool {
        match self {
            IngestionError::DatabaseError(e) => e.is_fatal(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repoharvest_common::errors::AppError;

    #[test]
    fn test_fatal_only_for_unavailable_store() {
        let err = IngestionError::DatabaseError(AppError::DatabaseConnection {
            message: "refused".into(),
        });
        assert!(err.is_fatal());

        let err = IngestionError::DownloadError {
            url: "https://repo.example/a.pdf".into(),
            message: "timeout".into(),
        };
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("a.pdf"));
    }
}
