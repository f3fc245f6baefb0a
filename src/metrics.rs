//! Prometheus metrics & middleware helper.

use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use once_cell::sync::Lazy;
use prometheus::IntGauge;

/// Global Prometheus handle reused in tests.
pub static METRICS: Lazy<PrometheusMetrics> = Lazy::new(|| {
    PrometheusMetricsBuilder::new("api")
        .endpoint("/metrics") // exposed URL
        .build()
        .expect("metrics builder")
});

/// Battles currently resident in memory.
pub static BATTLES_LIVE: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new("battles_live", "battles currently resident in memory")
        .expect("gauge");
    METRICS
        .registry
        .register(Box::new(gauge.clone()))
        .expect("register gauge");
    gauge
});
