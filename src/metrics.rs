use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Resolver-wide counters; clones share the same counters
#[derive(Debug, Clone)]
pub struct ResolverMetrics {
    // Lookup path
    pub cache_hits: Arc<AtomicU64>,
    pub cache_misses: Arc<AtomicU64>,
    pub root_shortcuts: Arc<AtomicU64>,

    // Catalog traffic
    pub replica_queries: Arc<AtomicU64>,
    pub dir_listings: Arc<AtomicU64>,
    pub catalog_not_found: Arc<AtomicU64>,
    pub catalog_errors: Arc<AtomicU64>,
    pub probe_passes: Arc<AtomicU64>,

    // Outcomes
    pub resolved: Arc<AtomicU64>,
    pub not_found: Arc<AtomicU64>,
}

impl ResolverMetrics {
    pub fn new() -> Self {
        ResolverMetrics {
            cache_hits: Arc::new(AtomicU64::new(0)),
            cache_misses: Arc::new(AtomicU64::new(0)),
            root_shortcuts: Arc::new(AtomicU64::new(0)),

            replica_queries: Arc::new(AtomicU64::new(0)),
            dir_listings: Arc::new(AtomicU64::new(0)),
            catalog_not_found: Arc::new(AtomicU64::new(0)),
            catalog_errors: Arc::new(AtomicU64::new(0)),
            probe_passes: Arc::new(AtomicU64::new(0)),

            resolved: Arc::new(AtomicU64::new(0)),
            not_found: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_root_shortcut(&self) {
        self.root_shortcuts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_replica_query(&self) {
        self.replica_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dir_listing(&self) {
        self.dir_listings.fetch_add(1, Ordering::Relaxed);
    }

    /// Lookup or listing answered with "no such entry"
    pub fn record_catalog_not_found(&self) {
        self.catalog_not_found.fetch_add(1, Ordering::Relaxed);
    }

    /// Lookup or listing that failed for any other reason
    pub fn record_catalog_error(&self) {
        self.catalog_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_probe_pass(&self) {
        self.probe_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resolved(&self) {
        self.resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            root_shortcuts: self.root_shortcuts.load(Ordering::Relaxed),
            replica_queries: self.replica_queries.load(Ordering::Relaxed),
            dir_listings: self.dir_listings.load(Ordering::Relaxed),
            catalog_not_found: self.catalog_not_found.load(Ordering::Relaxed),
            catalog_errors: self.catalog_errors.load(Ordering::Relaxed),
            probe_passes: self.probe_passes.load(Ordering::Relaxed),
            resolved: self.resolved.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
        }
    }
}

impl Default for ResolverMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub root_shortcuts: u64,
    pub replica_queries: u64,
    pub dir_listings: u64,
    pub catalog_not_found: u64,
    pub catalog_errors: u64,
    pub probe_passes: u64,
    pub resolved: u64,
    pub not_found: u64,
}

impl MetricsSnapshot {
    /// Catalog calls of either kind
    pub fn catalog_calls(&self) -> u64 {
        self.replica_queries + self.dir_listings
    }

    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            100.0 * self.cache_hits as f64 / total as f64
        }
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            r#"Resolver Metrics:
  Cache:
    Hits:   {} (hit rate: {:.1}%)
    Misses: {}
  Catalog:
    Replica queries:   {}
    Directory listings: {}
    No such entry:     {}
    Errors:            {}
    Probe passes:      {}
  Outcomes:
    Root shortcuts: {}
    Resolved:       {}
    Not found:      {}
"#,
            self.cache_hits,
            self.cache_hit_rate(),
            self.cache_misses,
            self.replica_queries,
            self.dir_listings,
            self.catalog_not_found,
            self.catalog_errors,
            self.probe_passes,
            self.root_shortcuts,
            self.resolved,
            self.not_found,
        )
    }
}
