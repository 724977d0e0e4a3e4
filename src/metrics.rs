//! Prometheus metrics for stoacache

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};

/// Per-facade metrics instance
pub struct Metrics {
    pub registry: Registry,

    // Operation counters
    pub cmd_get: IntCounter,
    pub cmd_get_many: IntCounter,
    pub cmd_set: IntCounter,
    pub cmd_add: IntCounter,
    pub cmd_replace: IntCounter,
    pub cmd_append: IntCounter,
    pub cmd_prepend: IntCounter,
    pub cmd_cas: IntCounter,
    pub cmd_delete: IntCounter,
    pub cmd_incr: IntCounter,
    pub cmd_decr: IntCounter,
    pub cmd_touch: IntCounter,
    pub cmd_flush: IntCounter,

    // Hit/miss counters
    pub get_hits: IntCounter,
    pub get_misses: IntCounter,

    // Error counters
    pub backend_errors: IntCounter,
    pub suppressed_errors: IntCounter,

    // Latency histogram
    pub op_latency: Histogram,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        let registry = Registry::new();

        let cmd_get = IntCounter::new("stoacache_cmd_get_total", "Total get operations").unwrap();
        let cmd_get_many =
            IntCounter::new("stoacache_cmd_get_many_total", "Total bulk get operations").unwrap();
        let cmd_set = IntCounter::new("stoacache_cmd_set_total", "Total set operations").unwrap();
        let cmd_add = IntCounter::new("stoacache_cmd_add_total", "Total add operations").unwrap();
        let cmd_replace =
            IntCounter::new("stoacache_cmd_replace_total", "Total replace operations").unwrap();
        let cmd_append =
            IntCounter::new("stoacache_cmd_append_total", "Total append operations").unwrap();
        let cmd_prepend =
            IntCounter::new("stoacache_cmd_prepend_total", "Total prepend operations").unwrap();
        let cmd_cas = IntCounter::new(
            "stoacache_cmd_cas_total",
            "Total compare-and-swap operations",
        )
        .unwrap();
        let cmd_delete =
            IntCounter::new("stoacache_cmd_delete_total", "Total delete operations").unwrap();
        let cmd_incr =
            IntCounter::new("stoacache_cmd_incr_total", "Total increment operations").unwrap();
        let cmd_decr =
            IntCounter::new("stoacache_cmd_decr_total", "Total decrement operations").unwrap();
        let cmd_touch =
            IntCounter::new("stoacache_cmd_touch_total", "Total touch operations").unwrap();
        let cmd_flush =
            IntCounter::new("stoacache_cmd_flush_total", "Total flush operations").unwrap();

        let get_hits = IntCounter::new("stoacache_get_hits_total", "Total get hits").unwrap();
        let get_misses = IntCounter::new("stoacache_get_misses_total", "Total get misses").unwrap();

        let backend_errors = IntCounter::new(
            "stoacache_backend_errors_total",
            "Total errors raised by the wrapped client",
        )
        .unwrap();
        let suppressed_errors = IntCounter::new(
            "stoacache_suppressed_errors_total",
            "Total backend errors swallowed by the interception policy",
        )
        .unwrap();

        let op_latency = Histogram::with_opts(
            HistogramOpts::new(
                "stoacache_op_latency_seconds",
                "Operation latency in seconds",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.002, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
        )
        .unwrap();

        // Register all metrics
        registry.register(Box::new(cmd_get.clone())).unwrap();
        registry.register(Box::new(cmd_get_many.clone())).unwrap();
        registry.register(Box::new(cmd_set.clone())).unwrap();
        registry.register(Box::new(cmd_add.clone())).unwrap();
        registry.register(Box::new(cmd_replace.clone())).unwrap();
        registry.register(Box::new(cmd_append.clone())).unwrap();
        registry.register(Box::new(cmd_prepend.clone())).unwrap();
        registry.register(Box::new(cmd_cas.clone())).unwrap();
        registry.register(Box::new(cmd_delete.clone())).unwrap();
        registry.register(Box::new(cmd_incr.clone())).unwrap();
        registry.register(Box::new(cmd_decr.clone())).unwrap();
        registry.register(Box::new(cmd_touch.clone())).unwrap();
        registry.register(Box::new(cmd_flush.clone())).unwrap();
        registry.register(Box::new(get_hits.clone())).unwrap();
        registry.register(Box::new(get_misses.clone())).unwrap();
        registry
            .register(Box::new(backend_errors.clone()))
            .unwrap();
        registry
            .register(Box::new(suppressed_errors.clone()))
            .unwrap();
        registry.register(Box::new(op_latency.clone())).unwrap();

        Self {
            registry,
            cmd_get,
            cmd_get_many,
            cmd_set,
            cmd_add,
            cmd_replace,
            cmd_append,
            cmd_prepend,
            cmd_cas,
            cmd_delete,
            cmd_incr,
            cmd_decr,
            cmd_touch,
            cmd_flush,
            get_hits,
            get_misses,
            backend_errors,
            suppressed_errors,
            op_latency,
        }
    }

    /// Get Prometheus formatted metrics
    pub fn gather(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
