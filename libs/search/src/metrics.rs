//! Prometheus metrics for search execution
//!
//! Metrics are registered in the default Prometheus registry. Hosts expose them
//! with [`gather_text`] or by gathering the default registry themselves.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};
use std::time::Duration;

lazy_static! {
    /// Executed searches by domain and outcome (`ok`, `client_error`, `error`)
    pub static ref SEARCH_EXECUTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "booru_search_executions_total",
        "Total number of search executions",
        &["domain", "outcome"]
    )
    .expect("Failed to register SEARCH_EXECUTIONS_TOTAL");

    /// Result cache lookups by domain and result (`hit`, `miss`)
    pub static ref SEARCH_CACHE_TOTAL: IntCounterVec = register_int_counter_vec!(
        "booru_search_cache_total",
        "Total number of result cache lookups",
        &["domain", "result"]
    )
    .expect("Failed to register SEARCH_CACHE_TOTAL");

    /// Time spent computing uncached searches
    pub static ref SEARCH_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "booru_search_duration_seconds",
        "Duration of uncached search executions in seconds",
        &["domain"],
        vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register SEARCH_DURATION_SECONDS");
}

pub fn record_cache_lookup(domain: &str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    SEARCH_CACHE_TOTAL
        .with_label_values(&[domain, result])
        .inc();
}

pub fn record_execution(domain: &str, outcome: &str, duration: Duration) {
    SEARCH_EXECUTIONS_TOTAL
        .with_label_values(&[domain, outcome])
        .inc();
    SEARCH_DURATION_SECONDS
        .with_label_values(&[domain])
        .observe(duration.as_secs_f64());
}

/// Render the default registry in the Prometheus text format.
pub fn gather_text() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
