//! Metrics module
//!
//! Exposes group statistics in the Prometheus text format.

mod exporter;

pub use exporter::{render_stats, MetricsExporter, NAMESPACE};
