/// Metrics for identity resolution
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - Cache hit/miss rates per key namespace
/// - DID and handle resolutions by outcome
/// - Resolver latencies

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};
use tracing::warn;

lazy_static! {
    // ========== Cache Metrics ==========

    /// Cache hits by namespace
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "beacon_cache_hits_total",
        "Total number of identity cache hits",
        &["category"]
    )
    .unwrap();

    /// Cache misses by namespace
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "beacon_cache_misses_total",
        "Total number of identity cache misses",
        &["category"]
    )
    .unwrap();

    // ========== Resolution Metrics ==========

    /// Resolver calls by kind (did, handle) and outcome
    pub static ref RESOLUTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "beacon_resolutions_total",
        "Total number of resolver calls",
        &["kind", "outcome"]
    )
    .unwrap();

    /// Resolver call duration in seconds
    pub static ref RESOLUTION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "beacon_resolution_duration_seconds",
        "Resolver call latencies in seconds",
        &["kind"],
        vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record a cache access
pub fn record_cache_access(category: &str, hit: bool) {
    if hit {
        CACHE_HITS_TOTAL.with_label_values(&[category]).inc();
    } else {
        CACHE_MISSES_TOTAL.with_label_values(&[category]).inc();
    }
}

/// Record a resolver call
pub fn record_resolution(kind: &str, success: bool, duration: f64) {
    RESOLUTIONS_TOTAL
        .with_label_values(&[kind, if success { "success" } else { "failure" }])
        .inc();
    RESOLUTION_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration);
}
