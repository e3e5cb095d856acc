//! repoharvest harvester
//!
//! Crawls the repository search for each requested source id and stores
//! works, files and per-page text in the catalog:
//! 1. Connects to the catalog and creates the schema if needed
//! 2. Pages through search results newest first
//! 3. Downloads each document and splits it into pages
//! 4. Stores every work in its own transaction

use anyhow::Context;
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use repoharvest_common::{config::AppConfig, db::DbPool, metrics, Repository, VERSION};
use repoharvest_ingestion::extractor::ContentExtractor;
use repoharvest_ingestion::pager::SearchPager;
use repoharvest_ingestion::rate_limit::RequestPacer;
use repoharvest_ingestion::{HarvestMode, HarvestState, Harvester};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "harvester", version, about = "Harvest repository works into the catalog")]
struct Cli {
    /// Configuration file to use instead of the `config/` directory
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Harvest one or more source ids
    Scrape {
        /// Comma-separated source ids, e.g. `25,11`
        #[arg(value_delimiter = ',', required = true)]
        sources: Vec<String>,

        /// Full resync: do not stop at the first work already stored
        #[arg(short = 'a', long = "all")]
        all: bool,

        /// First search page to request
        #[arg(long, default_value_t = 1)]
        start_page: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::load(),
    }
    .context("Failed to load configuration")?;

    init_tracing(&config);

    info!("Starting repoharvest harvester v{}", VERSION);

    if config.observability.metrics_port != 0 {
        install_metrics_exporter(config.observability.metrics_port)?;
    }
    metrics::register_metrics();

    // The catalog must be usable before anything goes out on the network
    info!("Connecting to database...");
    let pool = DbPool::new(&config.database).await?;
    pool.ensure_schema().await?;
    let repository = Repository::new(pool);

    let Command::Scrape { sources, all, start_page } = cli.command;
    let sources = source_ids(&sources);
    if sources.is_empty() {
        anyhow::bail!("no source ids given");
    }
    let mode = if all { HarvestMode::FullResync } else { HarvestMode::Incremental };

    let client = reqwest::Client::builder()
        .timeout(config.harvest.request_timeout())
        .user_agent(config.harvest.user_agent.as_str())
        .build()?;
    let pacer = RequestPacer::new(config.harvest.request_delay());
    info!(
        delay_ms = pacer.delay().as_millis() as u64,
        sources = ?sources,
        ?mode,
        "Harvest configured"
    );

    let harvester = Harvester::new(
        Arc::new(SearchPager::new(client.clone(), pacer.clone(), &config.harvest)),
        Arc::new(ContentExtractor::new(client, pacer)),
        Arc::new(repository.clone()),
    )
    .with_file_concurrency(config.harvest.file_concurrency);

    let mut failed = Vec::new();

    for source_id in &sources {
        let report = harvester.run(source_id, mode, start_page).await?;

        info!(
            source_id = %report.source_id,
            summary = %serde_json::to_string(&report)?,
            "Source finished"
        );

        if report.state == HarvestState::Failed {
            failed.push(source_id.clone());
        }
    }

    let counts = repository.table_counts().await?;
    info!(
        works = counts.works,
        files = counts.files,
        pages = counts.pages,
        persons = counts.persons,
        organizations = counts.organizations,
        "Catalog totals"
    );

    if failed.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        error!(sources = ?failed, "Some sources could not be harvested completely");
        Ok(ExitCode::FAILURE)
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn install_metrics_exporter(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("download_duration_seconds".to_string()),
            metrics::DOWNLOAD_BUCKETS,
        )?
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!(%addr, "Prometheus exporter listening");
    Ok(())
}

/// Trimmed, non-empty and unique, in the order given
fn source_ids(raw: &[String]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in raw.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scrape() {
        let cli = Cli::try_parse_from(["harvester", "scrape", "25,11", "--all", "--start-page", "4"]).unwrap();
        let Command::Scrape { sources, all, start_page } = cli.command;
        assert_eq!(sources, vec!["25", "11"]);
        assert!(all);
        assert_eq!(start_page, 4);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_config_path() {
        let cli = Cli::try_parse_from(["harvester", "scrape", "25", "--config", "harvest.toml"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("harvest.toml"));
    }

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["harvester", "scrape", "25", "-a"]).unwrap();
        let Command::Scrape { all, start_page, .. } = cli.command;
        assert!(all);
        assert_eq!(start_page, 1);

        let cli = Cli::try_parse_from(["harvester", "scrape", "25"]).unwrap();
        let Command::Scrape { all, .. } = cli.command;
        assert!(!all);
    }

    #[test]
    fn test_scrape_requires_sources() {
        assert!(Cli::try_parse_from(["harvester", "scrape"]).is_err());
    }

    #[test]
    fn test_source_ids_cleaned() {
        let raw = vec![" 25".to_string(), "".to_string(), "11".to_string(), "25".to_string()];
        assert_eq!(source_ids(&raw), vec!["25", "11"]);
    }
}
