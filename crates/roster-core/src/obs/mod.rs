//! Observability: runtime counters and the sink boundary.
//!
//! Coordinator logic MUST NOT touch `obs::metrics` directly; all
//! instrumentation flows through [`MetricsEvent`] and [`MetricsSink`].

pub(crate) mod metrics;
pub(crate) mod sink;

pub use metrics::MetricsReport;
pub use sink::{MetricsEvent, MetricsSink, metrics_report, metrics_reset_all, with_metrics_sink};
