//! Metrics for the record pipeline.
//!
//! Metrics go through the `metrics` facade. Without an installed recorder
//! every call is a no-op, so library code records unconditionally.

pub mod submission;

pub use submission::SubmissionMetrics;

use crate::constants::ENV_METRICS_ADDR;
use std::net::SocketAddr;
use std::sync::Once;
use tracing::{debug, info, warn};

static INIT: Once = Once::new();

/// Install a Prometheus exporter when `EPROCESSOR_METRICS_ADDR` is set.
///
/// Idempotent; does nothing if the variable is unset or unparseable.
pub fn init_metrics() {
    INIT.call_once(|| {
        let addr_str = match std::env::var(ENV_METRICS_ADDR) {
            Ok(v) if !v.trim().is_empty() => v,
            _ => return,
        };
        let addr: SocketAddr = match addr_str.parse() {
            Ok(a) => a,
            Err(e) => {
                warn!("Invalid metrics addr '{}': {}", addr_str, e);
                return;
            }
        };

        match metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
        {
            Ok(()) => {
                describe_phase::<SubmissionMetrics>();
                info!("Prometheus HTTP exporter started at http://{}/metrics", addr);
            }
            Err(e) => warn!("Failed to install Prometheus exporter: {}", e),
        }
    });
}

/// Register a phase's metrics and attach their help text.
pub fn describe_phase<P: PhaseMetrics>() {
    P::register_metrics();
    let docs = P::metrics_documentation();
    for doc in &docs {
        match doc.metric_type {
            MetricType::Counter => ::metrics::describe_counter!(doc.name, doc.help),
            MetricType::Histogram => ::metrics::describe_histogram!(doc.name, doc.help),
            MetricType::Gauge => ::metrics::describe_gauge!(doc.name, doc.help),
        }
    }
    debug!(phase = P::phase_name(), metrics = docs.len(), "metrics described");
}

/// Per-phase metric set.
pub trait PhaseMetrics {
    /// Pre-register every metric so it shows up before first use.
    fn register_metrics();

    fn phase_name() -> &'static str;

    fn metrics_documentation() -> Vec<MetricDoc>;
}

#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
    Gauge,
}

/// Naming convention: eprocessor_{phase}_{metric_name}[_total]
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("eprocessor_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("eprocessor_", $phase, "_", $name)
    };
    (gauge, $phase:literal, $name:literal) => {
        concat!("eprocessor_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;
