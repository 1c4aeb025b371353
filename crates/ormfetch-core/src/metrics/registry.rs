//! Fetch engine metrics.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use super::histogram::Histogram;

/// Counters for everything the fetch engine does.
///
/// Counters are atomics so one registry can be shared across threads even
/// though each fetch runs on a single thread.
pub struct FetchMetrics {
    started_at: Instant,

    // Queries
    query_count: AtomicU64,
    query_latency: Histogram,
    queries_by_model: RwLock<HashMap<String, AtomicU64>>,

    // Materialization
    rows_materialized: AtomicU64,
    identity_hits: AtomicU64,

    // Windows
    window_fills: AtomicU64,
    window_fill_rows: Histogram,
    unfulfilled_slots: AtomicU64,

    // Prefetch
    prefetch_passes: AtomicU64,
    relations_skipped: AtomicU64,
}

impl FetchMetrics {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            query_count: AtomicU64::new(0),
            query_latency: Histogram::latency(),
            queries_by_model: RwLock::new(HashMap::new()),
            rows_materialized: AtomicU64::new(0),
            identity_hits: AtomicU64::new(0),
            window_fills: AtomicU64::new(0),
            window_fill_rows: Histogram::row_counts(),
            unfulfilled_slots: AtomicU64::new(0),
            prefetch_passes: AtomicU64::new(0),
            relations_skipped: AtomicU64::new(0),
        }
    }

    /// Record a query against `model` that took `duration_us`.
    pub fn record_query(&self, model: &str, duration_us: u64) {
        self.query_count.fetch_add(1, Ordering::Relaxed);
        self.query_latency.observe(duration_us);

        if let Ok(mut map) = self.queries_by_model.write() {
            map.entry(model.to_string())
                .or_insert_with(|| AtomicU64::new(0))
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record rows turned into entities (including identity hits).
    pub fn record_rows(&self, rows: u64) {
        self.rows_materialized.fetch_add(rows, Ordering::Relaxed);
    }

    /// Record rows that resolved to an already cached entity.
    pub fn record_identity_hits(&self, hits: u64) {
        self.identity_hits.fetch_add(hits, Ordering::Relaxed);
    }

    /// Record a window fill that requested `rows` keys.
    pub fn record_window_fill(&self, rows: u64) {
        self.window_fills.fetch_add(1, Ordering::Relaxed);
        self.window_fill_rows.observe(rows);
    }

    /// Record a slot that stayed empty after its window fill.
    pub fn record_unfulfilled(&self) {
        self.unfulfilled_slots.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one relation prefetched over a page.
    pub fn record_prefetch(&self) {
        self.prefetch_passes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a relation descriptor that was skipped.
    pub fn record_relation_skipped(&self) {
        self.relations_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Seconds since creation.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Total queries issued.
    pub fn query_count(&self) -> u64 {
        self.query_count.load(Ordering::Relaxed)
    }

    /// Mean query latency in microseconds.
    pub fn avg_query_latency_us(&self) -> u64 {
        self.query_latency.avg()
    }

    /// P99 query latency in microseconds.
    pub fn p99_query_latency_us(&self) -> u64 {
        self.query_latency.p99()
    }

    /// Queries issued per model.
    pub fn queries_by_model(&self) -> HashMap<String, u64> {
        match self.queries_by_model.read() {
            Ok(map) => map
                .iter()
                .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
                .collect(),
            Err(_) => HashMap::new(),
        }
    }

    /// Rows materialized.
    pub fn rows_materialized(&self) -> u64 {
        self.rows_materialized.load(Ordering::Relaxed)
    }

    /// Identity map hits.
    pub fn identity_hits(&self) -> u64 {
        self.identity_hits.load(Ordering::Relaxed)
    }

    /// Window fills.
    pub fn window_fills(&self) -> u64 {
        self.window_fills.load(Ordering::Relaxed)
    }

    /// Mean keys requested per window fill.
    pub fn avg_window_fill_rows(&self) -> u64 {
        self.window_fill_rows.avg()
    }

    /// Slots left empty after their fill.
    pub fn unfulfilled_slots(&self) -> u64 {
        self.unfulfilled_slots.load(Ordering::Relaxed)
    }

    /// Relations prefetched.
    pub fn prefetch_passes(&self) -> u64 {
        self.prefetch_passes.load(Ordering::Relaxed)
    }

    /// Relation descriptors skipped.
    pub fn relations_skipped(&self) -> u64 {
        self.relations_skipped.load(Ordering::Relaxed)
    }

    /// Export in Prometheus text format.
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();

        let mut metric = |name: &str, kind: &str, help: &str, value: String| {
            let _ = writeln!(out, "# HELP ormfetch_{} {}", name, help);
            let _ = writeln!(out, "# TYPE ormfetch_{} {}", name, kind);
            let _ = writeln!(out, "ormfetch_{} {}\n", name, value);
        };

        metric("uptime_seconds", "gauge", "Seconds since the registry was created", self.uptime_secs().to_string());
        metric("queries_total", "counter", "Queries issued", self.query_count().to_string());
        metric("query_duration_us_avg", "gauge", "Mean query duration in microseconds", self.avg_query_latency_us().to_string());
        metric("query_duration_us_p99", "gauge", "P99 query duration in microseconds", self.p99_query_latency_us().to_string());
        metric("rows_materialized_total", "counter", "Rows turned into entities", self.rows_materialized().to_string());
        metric("identity_hits_total", "counter", "Rows resolved to a cached entity", self.identity_hits().to_string());
        metric("window_fills_total", "counter", "Window fills", self.window_fills().to_string());
        metric("window_fill_rows_avg", "gauge", "Mean keys requested per window fill", self.avg_window_fill_rows().to_string());
        metric("unfulfilled_slots_total", "counter", "Slots left empty after their window fill", self.unfulfilled_slots().to_string());
        metric("prefetch_passes_total", "counter", "Relations prefetched over a page", self.prefetch_passes().to_string());
        metric("relations_skipped_total", "counter", "Relation descriptors skipped", self.relations_skipped().to_string());

        out
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.query_count.store(0, Ordering::Relaxed);
        self.query_latency.reset();
        if let Ok(mut map) = self.queries_by_model.write() {
            map.clear();
        }
        self.rows_materialized.store(0, Ordering::Relaxed);
        self.identity_hits.store(0, Ordering::Relaxed);
        self.window_fills.store(0, Ordering::Relaxed);
        self.window_fill_rows.reset();
        self.unfulfilled_slots.store(0, Ordering::Relaxed);
        self.prefetch_passes.store(0, Ordering::Relaxed);
        self.relations_skipped.store(0, Ordering::Relaxed);
    }
}

impl Default for FetchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics handle.
pub type SharedFetchMetrics = Arc<FetchMetrics>;

/// Create a new shared metrics registry.
pub fn new_shared_metrics() -> SharedFetchMetrics {
    Arc::new(FetchMetrics::new())
}
