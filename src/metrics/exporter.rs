//! Prometheus exporter for group statistics.
//!
//! Stats live in each group's atomics; the exporter builds a fresh
//! `prometheus::Registry` per scrape and copies the current snapshot into it.

use std::sync::Arc;

use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::error::{Error, Result};
use crate::group::{CacheStats, GroupRegistry};

/// Metric name prefix
pub const NAMESPACE: &str = "peercache";

/// Renders every registered group's stats in the Prometheus text format
#[derive(Debug, Clone)]
pub struct MetricsExporter {
    groups: Arc<GroupRegistry>,
}

impl MetricsExporter {
    pub fn new(groups: Arc<GroupRegistry>) -> Self {
        Self { groups }
    }

    /// Content type of [`render`](Self::render)'s output
    pub fn format_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }

    /// Encode a scrape
    pub fn render(&self) -> Result<String> {
        let stats: Vec<CacheStats> = self.groups.groups().iter().map(|g| g.stats()).collect();
        render_stats(&stats)
    }
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounterVec> {
    let counter = IntCounterVec::new(Opts::new(name, help).namespace(NAMESPACE), &["group"])
        .map_err(metrics_error)?;
    registry
        .register(Box::new(counter.clone()))
        .map_err(metrics_error)?;
    Ok(counter)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGaugeVec> {
    let gauge = IntGaugeVec::new(Opts::new(name, help).namespace(NAMESPACE), &["group"])
        .map_err(metrics_error)?;
    registry
        .register(Box::new(gauge.clone()))
        .map_err(metrics_error)?;
    Ok(gauge)
}

fn metrics_error(e: prometheus::Error) -> Error {
    Error::Internal(format!("metrics: {}", e))
}

/// Encode a set of snapshots. Counters are labelled by group name.
pub fn render_stats(stats: &[CacheStats]) -> Result<String> {
    let registry = Registry::new();

    let counters: [(&str, &str, fn(&CacheStats) -> u64); 14] = [
        ("gets_total", "Lookups received", |s| s.gets),
        ("cache_hits_total", "Lookups answered from the local cache", |s| s.cache_hits),
        ("peer_loads_total", "Values fetched from remote peers", |s| s.peer_loads),
        ("peer_errors_total", "Failed peer fetches", |s| s.peer_errors),
        ("loads_total", "Misses dispatched to the loader path", |s| s.loads),
        ("loads_deduped_total", "Misses that joined an in-flight load", |s| s.loads_deduped),
        ("local_loads_total", "Successful loader calls", |s| s.local_loads),
        ("local_load_errors_total", "Failed loader calls", |s| s.local_load_errs),
        ("server_requests_total", "Requests served to peers", |s| s.server_requests),
        ("local_cache_hits_total", "Local cache hits", |s| s.cache.hits),
        ("local_cache_misses_total", "Local cache misses", |s| s.cache.misses),
        (
            "local_cache_evictions_total",
            "Entries evicted from the local cache",
            |s| s.cache.evictions,
        ),
        ("local_cache_bytes", "Bytes held by the local cache", |s| s.cache.bytes),
        ("local_cache_items", "Entries held by the local cache", |s| s.cache.items),
    ];

    for (name, help, value) in counters {
        if name.ends_with("_total") {
            let vec = counter(&registry, name, help)?;
            for s in stats {
                vec.with_label_values(&[s.group.as_str()]).inc_by(value(s));
            }
        } else {
            let vec = gauge(&registry, name, help)?;
            for s in stats {
                vec.with_label_values(&[s.group.as_str()])
                    .set(i64::try_from(value(s)).unwrap_or(i64::MAX));
            }
        }
    }

    let capacity = gauge(
        &registry,
        "local_cache_capacity_bytes",
        "Local cache byte limit (0 = unbounded)",
    )?;
    for s in stats {
        capacity
            .with_label_values(&[s.group.as_str()])
            .set(i64::try_from(s.cache.capacity).unwrap_or(i64::MAX));
    }

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .map_err(metrics_error)?;
    String::from_utf8(buffer).map_err(|e| Error::Internal(format!("metrics: {}", e)))
}
