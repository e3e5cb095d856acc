//! repoharvest Common Library
//!
//! Shared code for the harvester including:
//! - Canonical catalog types (works, files, pages, persons, organizations)
//! - Database models, schema bootstrap and the repository
//! - Error types and handling
//! - Configuration management
//! - Metrics

pub mod catalog;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, Repository, TableCounts};
pub use errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
