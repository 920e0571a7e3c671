//! Record pipeline metrics: ingestion counts, job dispatch and outcomes.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct SubmissionMetrics;

impl SubmissionMetrics {
    /// Rows read and unique records left after deduplication.
    pub fn record_rows(initial: usize, unique: usize) {
        ::metrics::counter!(phase_metric!(counter, "pipeline", "rows_ingested"))
            .increment(initial as u64);
        ::metrics::counter!(phase_metric!(counter, "pipeline", "duplicates_removed"))
            .increment(initial.saturating_sub(unique) as u64);
    }

    pub fn record_workers(workers: usize) {
        ::metrics::gauge!(phase_metric!(gauge, "submission", "workers")).set(workers as f64);
    }

    pub fn record_job_dispatched() {
        ::metrics::counter!(phase_metric!(counter, "submission", "jobs_dispatched")).increment(1);
    }

    pub fn record_encode_failure() {
        ::metrics::counter!(phase_metric!(counter, "submission", "encode_failures")).increment(1);
    }

    pub fn record_outcome(accepted: bool) {
        if accepted {
            ::metrics::counter!(phase_metric!(counter, "submission", "records_success"))
                .increment(1);
        } else {
            ::metrics::counter!(phase_metric!(counter, "submission", "records_failure"))
                .increment(1);
        }
    }

    pub fn record_request_duration(duration_secs: f64) {
        ::metrics::histogram!(phase_metric!(histogram, "submission", "request_duration_seconds"))
            .record(duration_secs);
    }
}

impl PhaseMetrics for SubmissionMetrics {
    fn register_metrics() {
        use ::metrics::{counter, gauge, histogram};

        let _ = counter!(phase_metric!(counter, "pipeline", "rows_ingested"));
        let _ = counter!(phase_metric!(counter, "pipeline", "duplicates_removed"));
        let _ = counter!(phase_metric!(counter, "submission", "jobs_dispatched"));
        let _ = counter!(phase_metric!(counter, "submission", "encode_failures"));
        let _ = counter!(phase_metric!(counter, "submission", "records_success"));
        let _ = counter!(phase_metric!(counter, "submission", "records_failure"));
        let _ = gauge!(phase_metric!(gauge, "submission", "workers"));
        let _ = histogram!(phase_metric!(histogram, "submission", "request_duration_seconds"));
    }

    fn phase_name() -> &'static str {
        "submission"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "pipeline", "rows_ingested"),
                metric_type: MetricType::Counter,
                help: "Data rows read from the source table",
            },
            MetricDoc {
                name: phase_metric!(counter, "pipeline", "duplicates_removed"),
                metric_type: MetricType::Counter,
                help: "Rows collapsed into an identical record",
            },
            MetricDoc {
                name: phase_metric!(counter, "submission", "jobs_dispatched"),
                metric_type: MetricType::Counter,
                help: "Jobs placed on the worker queue",
            },
            MetricDoc {
                name: phase_metric!(counter, "submission", "encode_failures"),
                metric_type: MetricType::Counter,
                help: "Records skipped because their payload failed to serialize",
            },
            MetricDoc {
                name: phase_metric!(counter, "submission", "records_success"),
                metric_type: MetricType::Counter,
                help: "Records accepted by the API",
            },
            MetricDoc {
                name: phase_metric!(counter, "submission", "records_failure"),
                metric_type: MetricType::Counter,
                help: "Records rejected by the API or lost in transport",
            },
            MetricDoc {
                name: phase_metric!(gauge, "submission", "workers"),
                metric_type: MetricType::Gauge,
                help: "Worker pool size of the current run",
            },
            MetricDoc {
                name: phase_metric!(histogram, "submission", "request_duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Duration of one POST to the API in seconds",
            },
        ]
    }
}
