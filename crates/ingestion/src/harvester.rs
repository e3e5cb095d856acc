//! Per-source harvest state machine
//!
//! A run walks the search results for one source id page by page, in
//! upstream order (newest first). In incremental mode it stops at the first
//! work already in the catalog; a full resync processes everything and
//! relies on idempotent writes. Each work is written in one transaction, so
//! an interrupted run can simply be started again.

use crate::errors::IngestionError;
use crate::extractor::ContentSource;
use crate::normalize::normalize;
use crate::pager::{MetadataSource, RawRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use repoharvest_common::catalog::{Page, Work};
use repoharvest_common::db::Repository;
use repoharvest_common::errors::AppError;
use repoharvest_common::metrics;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HarvestState {
    /// Requesting the given search page
    Fetching(u32),
    ProcessingItem,
    /// Hit a work that is already stored (incremental mode only)
    EarlyStopped,
    /// The last search page has been processed
    Exhausted,
    /// A search page could not be fetched after all retries
    Failed,
}

impl HarvestState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HarvestState::EarlyStopped | HarvestState::Exhausted | HarvestState::Failed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HarvestMode {
    /// Stop at the first already-stored work
    Incremental,
    /// Process every work regardless of what is stored
    FullResync,
}

/// Summary of one run over one source id
#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    pub run_id: Uuid,
    pub source_id: String,
    pub mode: HarvestMode,
    pub state: HarvestState,
    pub pages_fetched: u32,
    pub last_page: Option<u32>,
    pub works_stored: u64,
    pub works_failed: u64,
    pub files_without_pages: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl HarvestReport {
    fn new(source_id: &str, mode: HarvestMode, start_page: u32) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            source_id: source_id.to_string(),
            mode,
            state: HarvestState::Fetching(start_page),
            pages_fetched: 0,
            last_page: None,
            works_stored: 0,
            works_failed: 0,
            files_without_pages: 0,
            started_at: now,
            finished_at: now,
        }
    }
}

/// Catalog operations the harvester depends on
#[async_trait]
pub trait WorkStore: Send + Sync {
    async fn work_exists(&self, id: i64) -> Result<bool, AppError>;

    /// Write the whole work graph atomically; existing rows are left alone
    async fn store_work(&self, work: &Work) -> Result<(), AppError>;
}

#[async_trait]
impl WorkStore for Repository {
    async fn work_exists(&self, id: i64) -> Result<bool, AppError> {
        Repository::work_exists(self, id).await
    }

    async fn store_work(&self, work: &Work) -> Result<(), AppError> {
        Repository::store_work(self, work).await
    }
}

enum ItemOutcome {
    AlreadyStored,
    Stored { pages: usize, empty_files: usize },
}

pub struct Harvester {
    source: Arc<dyn MetadataSource>,
    content: Arc<dyn ContentSource>,
    store: Arc<dyn WorkStore>,
    file_concurrency: usize,
}

impl Harvester {
    pub fn new(
        source: Arc<dyn MetadataSource>,
        content: Arc<dyn ContentSource>,
        store: Arc<dyn WorkStore>,
    ) -> Self {
        Self {
            source,
            content,
            store,
            file_concurrency: 1,
        }
    }

    /// Extract up to `n` files of one work at a time
    pub fn with_file_concurrency(mut self, n: usize) -> Self {
        self.file_concurrency = n.max(1);
        self
    }

    /// Harvest one source id starting at `start_page` (1-based).
    ///
    /// Fetch failures end the run in [`HarvestState::Failed`]; only a fatal
    /// store error is returned as `Err`.
    #[instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run(
        &self,
        source_id: &str,
        mode: HarvestMode,
        start_page: u32,
    ) -> Result<HarvestReport, IngestionError> {
        let start_page = start_page.max(1);
        let mut report = HarvestReport::new(source_id, mode, start_page);
        tracing::Span::current().record("run_id", tracing::field::display(report.run_id));

        info!("Harvest started");

        while let HarvestState::Fetching(page) = report.state {
            let search = match self.source.fetch_page(source_id, page).await {
                Ok(search) => search,
                Err(e) => {
                    error!(page, error = %e, "Search page unavailable, stopping source");
                    report.state = HarvestState::Failed;
                    break;
                }
            };

            report.pages_fetched += 1;
            report.last_page = Some(page);
            report.state = HarvestState::ProcessingItem;

            debug!(page, items = search.items.len(), total_pages = search.total_pages, "Processing page");

            let mut early_stopped = false;

            for record in &search.items {
                match self.process_item(record, mode).await {
                    Ok(ItemOutcome::AlreadyStored) => {
                        info!(page, work_id = record.id, "Reached stored work, stopping");
                        metrics::record_early_stop(source_id);
                        early_stopped = true;
                        break;
                    }
                    Ok(ItemOutcome::Stored { pages, empty_files }) => {
                        report.works_stored += 1;
                        report.files_without_pages += empty_files as u64;
                        metrics::record_work(source_id, true, pages, empty_files);
                    }
                    Err(e) if e.is_fatal() => {
                        error!(work_id = record.id, error = %e, "Store unavailable, aborting run");
                        return Err(e);
                    }
                    Err(e) => {
                        warn!(work_id = record.id, error = %e, "Work not stored");
                        report.works_failed += 1;
                        metrics::record_work(source_id, false, 0, 0);
                    }
                }
            }

            report.state = if early_stopped {
                HarvestState::EarlyStopped
            } else if search.has_more {
                HarvestState::Fetching(page + 1)
            } else {
                HarvestState::Exhausted
            };
        }

        report.finished_at = Utc::now();

        info!(
            state = ?report.state,
            pages_fetched = report.pages_fetched,
            works_stored = report.works_stored,
            works_failed = report.works_failed,
            files_without_pages = report.files_without_pages,
            "Harvest finished"
        );

        Ok(report)
    }

    async fn process_item(
        &self,
        record: &RawRecord,
        mode: HarvestMode,
    ) -> Result<ItemOutcome, IngestionError> {
        if mode == HarvestMode::Incremental && self.store.work_exists(record.id).await? {
            return Ok(ItemOutcome::AlreadyStored);
        }

        let mut work = normalize(record);
        self.extract_files(&mut work).await;

        let pages = work.page_count();
        let empty_files = work.files.iter().filter(|f| f.pages.is_empty()).count();

        self.store.store_work(&work).await?;
        debug!(work_id = work.id, pages, "Work stored");

        Ok(ItemOutcome::Stored { pages, empty_files })
    }

    /// Fill in the pages of every file, keeping file order
    async fn extract_files(&self, work: &mut Work) {
        let content = &self.content;

        let extracted: Vec<Vec<Page>> = stream::iter(work.files.iter().map(|f| f.url.clone()))
            .map(move |url| async move { content.extract(&url).await })
            .buffered(self.file_concurrency)
            .collect()
            .await;

        for (file, pages) in work.files.iter_mut().zip(extracted) {
            file.pages = pages;
        }
    }
}
