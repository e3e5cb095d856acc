//! Metrics for harvest runs
//!
//! Counters and histograms follow the `repoharvest_*` naming scheme. They
//! are no-ops until a recorder (e.g. the Prometheus exporter in the
//! harvester binary) is installed.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all repoharvest metrics
pub const METRICS_PREFIX: &str = "repoharvest";

/// Buckets for upstream request latency (in seconds); document downloads
/// can take a while for large theses
pub const DOWNLOAD_BUCKETS: &[f64] = &[
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 60s
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_search_pages_fetched_total", METRICS_PREFIX),
        Unit::Count,
        "Metadata search pages fetched"
    );

    describe_counter!(
        format!("{}_search_fetch_retries_total", METRICS_PREFIX),
        Unit::Count,
        "Failed metadata fetch attempts that were retried"
    );

    describe_counter!(
        format!("{}_works_stored_total", METRICS_PREFIX),
        Unit::Count,
        "Works committed to the catalog"
    );

    describe_counter!(
        format!("{}_works_failed_total", METRICS_PREFIX),
        Unit::Count,
        "Works whose transaction was rolled back"
    );

    describe_counter!(
        format!("{}_early_stops_total", METRICS_PREFIX),
        Unit::Count,
        "Incremental runs stopped at an already stored work"
    );

    describe_counter!(
        format!("{}_pages_extracted_total", METRICS_PREFIX),
        Unit::Count,
        "Document pages extracted"
    );

    describe_counter!(
        format!("{}_files_without_pages_total", METRICS_PREFIX),
        Unit::Count,
        "Files stored with zero pages after a download or parse failure"
    );

    describe_histogram!(
        format!("{}_download_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Document download latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Times one document download
pub struct DownloadTimer {
    start: Instant,
}

impl DownloadTimer {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    pub fn finish(self, success: bool) {
        let status = if success { "success" } else { "error" };

        histogram!(
            format!("{}_download_duration_seconds", METRICS_PREFIX),
            "status" => status
        )
        .record(self.start.elapsed().as_secs_f64());
    }
}

pub fn record_page_fetched(source_id: &str) {
    counter!(
        format!("{}_search_pages_fetched_total", METRICS_PREFIX),
        "source" => source_id.to_string()
    )
    .increment(1);
}

pub fn record_fetch_retry(source_id: &str) {
    counter!(
        format!("{}_search_fetch_retries_total", METRICS_PREFIX),
        "source" => source_id.to_string()
    )
    .increment(1);
}

pub fn record_early_stop(source_id: &str) {
    counter!(
        format!("{}_early_stops_total", METRICS_PREFIX),
        "source" => source_id.to_string()
    )
    .increment(1);
}

/// Helper to record the outcome of one work
pub fn record_work(source_id: &str, stored: bool, pages: usize, empty_files: usize) {
    if !stored {
        counter!(
            format!("{}_works_failed_total", METRICS_PREFIX),
            "source" => source_id.to_string()
        )
        .increment(1);
        return;
    }

    counter!(
        format!("{}_works_stored_total", METRICS_PREFIX),
        "source" => source_id.to_string()
    )
    .increment(1);

    counter!(
        format!("{}_pages_extracted_total", METRICS_PREFIX),
        "source" => source_id.to_string()
    )
    .increment(pages as u64);

    if empty_files > 0 {
        counter!(
            format!("{}_files_without_pages_total", METRICS_PREFIX),
            "source" => source_id.to_string()
        )
        .increment(empty_files as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in DOWNLOAD_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_recording_without_recorder() {
        let timer = DownloadTimer::start();
        timer.finish(true);
        record_work("25", true, 12, 1);
        record_work("25", false, 0, 0);
        // Just verify it runs without panic
    }
}
