//! Logical to physical name resolution.
//!
//! ```text
//! lfn ──> cache ──hit──────────────────────────────────────────> pfn
//!           │miss
//!           ├─ lfn contains root ─────────────────────────────> lfn
//!           ├─ lfn == /atlas ─────────────────────────────────> root
//!           └─ rewrite ──> candidates
//!                 ├─ replica query + filter, per candidate ───> pfn
//!                 └─ directory probe, per candidate
//!                       └─ replica query + filter, per match ─> pfn
//!                                                 nothing ────> NotFound
//! ```
//!
//! Every successful resolution after a cache miss is inserted in the cache.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

use crate::cache::{CacheStats, ResolutionCache};
use crate::catalog::{CatalogClient, CatalogQuery, CatalogSession};
use crate::config::ResolverConfig;
use crate::error::ResolveError;
use crate::filter::ReplicaFilter;
use crate::logging::{CatalogEvent, EventLog};
use crate::metrics::{MetricsSnapshot, ResolverMetrics};
use crate::probe::DirectoryProbe;
use crate::rewrite;

/// The only logical name translated straight to the storage root
pub const DOMAIN_ROOT_LFN: &str = "/atlas";

/// Client identifier used when the caller has none
pub const UNKNOWN_CLIENT: &str = "unknown";

const MAX_EVENTS: usize = 1000;

/// Which step of the resolution produced the physical name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Cache,
    RootShortcut,
    DomainShortcut,
    Catalog,
    DirectoryProbe,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub pfn: String,
    pub source: ResolutionSource,
}

/// Resolver service: one catalog session and one cache for the process.
pub struct Resolver {
    config: ResolverConfig,
    catalog: CatalogClient,
    filter: ReplicaFilter,
    cache: ResolutionCache,
    metrics: ResolverMetrics,
    events: Arc<Mutex<EventLog>>,
}

impl Resolver {
    /// Build a resolver on an already opened catalog session.
    pub fn new(config: ResolverConfig, session: Box<dyn CatalogSession>) -> Self {
        let metrics = ResolverMetrics::new();
        let events = Arc::new(Mutex::new(EventLog::new(MAX_EVENTS)));
        let catalog = CatalogClient::new(session, metrics.clone(), events.clone());
        let filter = ReplicaFilter::new(config.filter.clone(), config.root.clone());
        let cache = ResolutionCache::new(config.cache_ttl(), config.cache_max_size);

        log::info!(
            "resolver ready: root={:?} match={:?} nomatch={:?} cache_ttl={}s cache_maxsize={}",
            config.root,
            config.filter.required,
            config.filter.forbidden,
            config.cache_ttl_secs,
            config.cache_max_size
        );

        Resolver {
            config,
            catalog,
            filter,
            cache,
            metrics,
            events,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    pub fn catalog(&self) -> &CatalogClient {
        &self.catalog
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Most recent catalog failures, oldest first
    pub fn recent_events(&self, n: usize) -> Vec<CatalogEvent> {
        self.events.lock().recent(n)
    }

    /// Every retained catalog failure as JSON lines
    pub fn export_events(&self) -> String {
        self.events.lock().export_jsonl()
    }

    pub fn resolve(&self, lfn: &str) -> Result<Resolution, ResolveError> {
        self.resolve_as(lfn, UNKNOWN_CLIENT)
    }

    /// Resolve `lfn`; `client` only tags the log lines.
    pub fn resolve_as(&self, lfn: &str, client: &str) -> Result<Resolution, ResolveError> {
        if let Some(pfn) = self.cache.get_entry(lfn) {
            self.metrics.record_cache_hit();
            log::info!("{} cache hit for lfn={} -> pfn={}", client, lfn, pfn);
            return Ok(Resolution {
                pfn,
                source: ResolutionSource::Cache,
            });
        }

        self.metrics.record_cache_miss();
        log::debug!("{} cache miss for lfn={}", client, lfn);

        let resolution = self.resolve_uncached(lfn, client);
        match &resolution {
            Some(resolution) => {
                self.metrics.record_resolved();
                self.cache.insert(lfn, &resolution.pfn);
            }
            None => {
                self.metrics.record_not_found();
                log::info!("{} no valid replica for lfn={}", client, lfn);
            }
        }

        resolution.ok_or_else(|| ResolveError::NotFound(lfn.to_string()))
    }

    /// Everything after the cache lookup. The directory fallback only runs
    /// on path candidates; GUID candidates have no directory to list.
    fn resolve_uncached(&self, lfn: &str, client: &str) -> Option<Resolution> {
        if self.config.has_root() && lfn.contains(self.config.root.as_str()) {
            self.metrics.record_root_shortcut();
            log::info!("{} no catalog lookup needed, lfn contains storage root", client);
            return Some(Resolution {
                pfn: lfn.to_string(),
                source: ResolutionSource::RootShortcut,
            });
        }

        if lfn == DOMAIN_ROOT_LFN {
            log::info!("{} {} maps to the storage root", client, DOMAIN_ROOT_LFN);
            return self.config.has_root().then(|| Resolution {
                pfn: self.config.root.clone(),
                source: ResolutionSource::DomainShortcut,
            });
        }

        let candidates: Vec<CatalogQuery> = rewrite::rewrite(lfn)
            .iter()
            .map(|c| CatalogQuery::from_candidate(c))
            .collect();

        for candidate in &candidates {
            log::debug!("{} rewrite lfn={} as new_lfn={}", client, lfn, candidate);
            if let Some(pfn) = self.query(candidate, client) {
                return Some(Resolution {
                    pfn,
                    source: ResolutionSource::Catalog,
                });
            }
        }

        self.metrics.record_probe_pass();
        let probe = DirectoryProbe::new(&self.catalog);
        for path in candidates.iter().filter_map(CatalogQuery::as_path) {
            for secondary in probe.probe(path, client) {
                let query = CatalogQuery::Path(secondary);
                if let Some(pfn) = self.query(&query, client) {
                    return Some(Resolution {
                        pfn,
                        source: ResolutionSource::DirectoryProbe,
                    });
                }
            }
        }

        None
    }

    fn query(&self, query: &CatalogQuery, client: &str) -> Option<String> {
        let replicas = self.catalog.replicas(query, client);
        let pfn = self.filter.accept(&replicas, client)?;
        log::info!("{} found match for rewritten lfn={} -> pfn={}", client, query, pfn);
        Some(pfn)
    }
}
