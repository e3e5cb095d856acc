//! repoharvest ingestion library
//!
//! Paginated metadata crawl of an institutional repository, PDF page
//! extraction and idempotent catalog persistence, driven per source id by
//! the [`harvester::Harvester`] state machine.

pub mod errors;
pub mod extractor;
pub mod harvester;
pub mod normalize;
pub mod page_labels;
pub mod pager;
pub mod pdf;
pub mod rate_limit;

pub use errors::IngestionError;
pub use harvester::{HarvestMode, HarvestReport, HarvestState, Harvester};
