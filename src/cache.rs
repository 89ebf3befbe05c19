//! Resolution cache.
//!
//! Maps logical names to the physical names they resolved to. Entries are
//! bounded two ways: by age (TTL) and by count. Both evictions take from
//! the head of one insertion-ordered aging queue, so eviction order is
//! pure FIFO, independent of how often an entry is read.
//!
//! ```text
//!   head (oldest)                              tail (newest)
//!   ┌──────────┬──────────┬─────┬──────────┐
//!   │ lfn, t0  │ lfn, t1  │ ... │ lfn, tn  │   aging queue
//!   └──────────┴──────────┴─────┴──────────┘
//!        │  TTL sweep, then capacity sweep pop from here
//! ```
//!
//! Stale entries are only removed by the sweep that runs inside
//! [`ResolutionCache::insert`]; lookups skip them but leave them in place.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

struct CacheEntry {
    pfn: String,
    inserted_at: Instant,
}

/// Map and aging queue, always locked together
#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    aging: VecDeque<(String, Instant)>,
}

impl CacheState {
    fn pop_oldest(&mut self) {
        if let Some((lfn, _)) = self.aging.pop_front() {
            if self.entries.remove(&lfn).is_none() {
                log::warn!("entry {} found in aging queue but not in map", lfn);
            }
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    duplicate_inserts: AtomicU64,
    ttl_evictions: AtomicU64,
    capacity_evictions: AtomicU64,
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub duplicate_inserts: u64,
    pub ttl_evictions: u64,
    pub capacity_evictions: u64,
    pub entry_count: usize,
}

impl CacheStats {
    /// Cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// TTL- and size-bounded LFN → PFN cache.
///
/// Lookups take a shared lock, inserts an exclusive one. TTL and maximum
/// size are fixed at construction.
pub struct ResolutionCache {
    state: RwLock<CacheState>,
    ttl: Duration,
    max_size: usize,
    counters: Counters,
}

impl ResolutionCache {
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        ResolutionCache {
            state: RwLock::new(CacheState::default()),
            ttl,
            max_size,
            counters: Counters::default(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Size the capacity sweep shrinks the cache down to
    pub fn low_watermark(&self) -> usize {
        (0.9 * self.max_size as f64) as usize
    }

    pub fn get_entry(&self, lfn: &str) -> Option<String> {
        self.get_entry_at(lfn, Instant::now())
    }

    /// Lookup as of `now`. Entries whose age reached the TTL are reported
    /// missing.
    pub fn get_entry_at(&self, lfn: &str, now: Instant) -> Option<String> {
        let state = self.state.read();
        let found = state
            .entries
            .get(lfn)
            .filter(|entry| now.saturating_duration_since(entry.inserted_at) < self.ttl)
            .map(|entry| entry.pfn.clone());

        let counter = if found.is_some() {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn insert(&self, lfn: &str, pfn: &str) {
        let mut state = self.state.write();
        // read the clock under the lock so the aging queue stays in time order
        let now = Instant::now();
        self.insert_locked(&mut state, lfn, pfn, now);
    }

    /// Insert as of `now`: sweep expired entries, make room if the cache is
    /// full, then add the entry unless the name is already cached. An
    /// existing entry keeps its first timestamp. A `now` earlier than the
    /// newest entry is taken as that entry's timestamp.
    pub fn insert_at(&self, lfn: &str, pfn: &str, now: Instant) {
        let mut state = self.state.write();
        self.insert_locked(&mut state, lfn, pfn, now);
    }

    fn insert_locked(&self, state: &mut CacheState, lfn: &str, pfn: &str, now: Instant) {
        // the aging queue must stay in time order
        let now = state.aging.back().map_or(now, |(_, newest)| now.max(*newest));

        // expired prefix of the aging queue
        let mut expired = 0;
        while let Some((_, inserted_at)) = state.aging.front() {
            if now.saturating_duration_since(*inserted_at) < self.ttl {
                break;
            }
            state.pop_oldest();
            expired += 1;
        }

        // batch eviction down to 90% once at capacity
        let mut evicted = 0;
        if state.aging.len() >= self.max_size {
            let low_watermark = self.low_watermark();
            while state.aging.len() > low_watermark && !state.aging.is_empty() {
                state.pop_oldest();
                evicted += 1;
            }
        }

        if expired > 0 || evicted > 0 {
            log::debug!(
                "cache sweep removed {} expired and {} overflow entries, {} left",
                expired,
                evicted,
                state.aging.len()
            );
        }
        self.counters.ttl_evictions.fetch_add(expired, Ordering::Relaxed);
        self.counters.capacity_evictions.fetch_add(evicted, Ordering::Relaxed);

        if state.entries.contains_key(lfn) {
            self.counters.duplicate_inserts.fetch_add(1, Ordering::Relaxed);
            return;
        }

        state.aging.push_back((lfn.to_string(), now));
        state.entries.insert(
            lfn.to_string(),
            CacheEntry {
                pfn: pfn.to_string(),
                inserted_at: now,
            },
        );
        self.counters.insertions.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of cached entries, stale ones included
    pub fn len(&self) -> usize {
        self.state.read().aging.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            insertions: self.counters.insertions.load(Ordering::Relaxed),
            duplicate_inserts: self.counters.duplicate_inserts.load(Ordering::Relaxed),
            ttl_evictions: self.counters.ttl_evictions.load(Ordering::Relaxed),
            capacity_evictions: self.counters.capacity_evictions.load(Ordering::Relaxed),
            entry_count: self.len(),
        }
    }

    /// Whether the map and the aging queue hold exactly the same names,
    /// once each, with matching timestamps and the queue in time order.
    pub fn is_consistent(&self) -> bool {
        let state = self.state.read();
        if state.entries.len() != state.aging.len() {
            return false;
        }

        let ordered = state
            .aging
            .iter()
            .zip(state.aging.iter().skip(1))
            .all(|((_, a), (_, b))| a <= b);

        ordered
            && state.aging.iter().all(|(lfn, inserted_at)| {
                state
                    .entries
                    .get(lfn)
                    .map_or(false, |entry| entry.inserted_at == *inserted_at)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn test_get_within_ttl() {
        let cache = ResolutionCache::new(secs(1.0), 100);
        let t0 = Instant::now();
        cache.insert_at("/a", "/p/a", t0);

        assert_eq!(cache.get_entry_at("/a", t0 + secs(0.5)), Some("/p/a".to_string()));
        assert_eq!(cache.get_entry_at("/a", t0 + secs(1.5)), None);
        assert_eq!(cache.get_entry_at("/b", t0), None);
    }

    #[test]
    fn test_ttl_boundary_is_expired() {
        let cache = ResolutionCache::new(secs(10.0), 100);
        let t0 = Instant::now();
        cache.insert_at("/a", "/p/a", t0);
        assert!(cache.get_entry_at("/a", t0 + secs(9.999)).is_some());
        assert!(cache.get_entry_at("/a", t0 + secs(10.0)).is_none());
    }

    #[test]
    fn test_stale_entry_survives_reads() {
        let cache = ResolutionCache::new(secs(1.0), 100);
        let t0 = Instant::now();
        cache.insert_at("/a", "/p/a", t0);

        for _ in 0..3 {
            assert!(cache.get_entry_at("/a", t0 + secs(5.0)).is_none());
        }
        assert_eq!(cache.len(), 1);

        cache.insert_at("/b", "/p/b", t0 + secs(5.0));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().ttl_evictions, 1);
        assert!(cache.is_consistent());
    }

    #[test]
    fn test_ttl_sweep_stops_at_first_live_entry() {
        let cache = ResolutionCache::new(secs(10.0), 100);
        let t0 = Instant::now();
        cache.insert_at("/a", "1", t0);
        cache.insert_at("/b", "2", t0 + secs(1.0));
        cache.insert_at("/c", "3", t0 + secs(8.0));

        cache.insert_at("/d", "4", t0 + secs(11.5));
        assert_eq!(cache.len(), 2);
        assert!(cache.get_entry_at("/c", t0 + secs(11.5)).is_some());
        assert!(cache.get_entry_at("/d", t0 + secs(11.5)).is_some());
        assert!(cache.is_consistent());
    }

    #[test]
    fn test_capacity_sweep_to_ninety_percent() {
        let cache = ResolutionCache::new(secs(3600.0), 10);
        let t0 = Instant::now();
        for i in 0..10 {
            cache.insert_at(&format!("/f{}", i), "p", t0 + secs(i as f64));
        }
        assert_eq!(cache.len(), 10);

        cache.insert_at("/f10", "p", t0 + secs(10.0));
        assert_eq!(cache.len(), 10);
        assert_eq!(cache.stats().capacity_evictions, 1);

        let now = t0 + secs(10.0);
        assert!(cache.get_entry_at("/f0", now).is_none());
        assert!(cache.get_entry_at("/f1", now).is_some());
        assert!(cache.get_entry_at("/f10", now).is_some());
        assert!(cache.is_consistent());
    }

    #[test]
    fn test_capacity_batch_eviction() {
        let cache = ResolutionCache::new(secs(3600.0), 100);
        let t0 = Instant::now();
        for i in 0..100 {
            cache.insert_at(&format!("/f{}", i), "p", t0);
        }

        cache.insert_at("/new", "p", t0);
        // down to 90, then the new entry
        assert_eq!(cache.len(), 91);
        assert_eq!(cache.stats().capacity_evictions, 10);
        for i in 0..10 {
            assert!(cache.get_entry_at(&format!("/f{}", i), t0).is_none());
        }
        assert!(cache.get_entry_at("/f10", t0).is_some());

        // below capacity again: no eviction for the next few inserts
        for i in 0..9 {
            cache.insert_at(&format!("/g{}", i), "p", t0);
        }
        assert_eq!(cache.len(), 100);
        assert_eq!(cache.stats().capacity_evictions, 10);
    }

    #[test]
    fn test_size_never_exceeds_max() {
        let cache = ResolutionCache::new(secs(3600.0), 7);
        let t0 = Instant::now();
        for i in 0..200 {
            cache.insert_at(&format!("/f{}", i), "p", t0 + secs(i as f64 * 0.001));
            assert!(cache.len() <= 7);
        }
        assert!(cache.is_consistent());
    }

    #[test]
    fn test_duplicate_insert_keeps_timestamp() {
        let cache = ResolutionCache::new(secs(10.0), 100);
        let t0 = Instant::now();
        cache.insert_at("/a", "/p/a", t0);
        cache.insert_at("/a", "/p/other", t0 + secs(5.0));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_entry_at("/a", t0 + secs(6.0)), Some("/p/a".to_string()));
        // still expires relative to the first insert
        assert_eq!(cache.get_entry_at("/a", t0 + secs(10.5)), None);
        assert_eq!(cache.stats().duplicate_inserts, 1);
    }

    #[test]
    fn test_expired_duplicate_is_replaced() {
        let cache = ResolutionCache::new(secs(10.0), 100);
        let t0 = Instant::now();
        cache.insert_at("/a", "/p/a", t0);
        cache.insert_at("/a", "/p/new", t0 + secs(20.0));
        assert_eq!(cache.get_entry_at("/a", t0 + secs(21.0)), Some("/p/new".to_string()));
        assert!(cache.is_consistent());
    }

    #[test]
    fn test_out_of_order_timestamp_clamped() {
        let cache = ResolutionCache::new(secs(10.0), 100);
        let t0 = Instant::now();
        cache.insert_at("/a", "1", t0 + secs(5.0));
        cache.insert_at("/b", "2", t0);
        assert!(cache.is_consistent());

        // /b ages from t0 + 5s, not from t0
        assert!(cache.get_entry_at("/b", t0 + secs(12.0)).is_some());
        assert!(cache.get_entry_at("/b", t0 + secs(15.0)).is_none());

        // the sweep still reaches both once they are stale
        cache.insert_at("/c", "3", t0 + secs(16.0));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().ttl_evictions, 2);
    }

    #[test]
    fn test_stats() {
        let cache = ResolutionCache::new(secs(10.0), 100);
        cache.get_entry("/a");
        cache.insert("/a", "/p/a");
        cache.get_entry("/a");
        cache.get_entry("/a");

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.insertions, 1);
        assert_eq!(stats.entry_count, 1);
        assert!(stats.hit_rate() > 0.6);
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        use std::sync::Arc;
        use std::thread;

        let cache = Arc::new(ResolutionCache::new(secs(3600.0), 50));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..200 {
                        let lfn = format!("/t{}/f{}", t, i % 40);
                        if cache.get_entry(&lfn).is_none() {
                            cache.insert(&lfn, "p");
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(cache.len() <= 50);
        assert!(cache.is_consistent());
    }
}
