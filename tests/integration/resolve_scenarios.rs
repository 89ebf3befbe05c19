use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use lfcredir::{
    CatalogError, CatalogQuery, CatalogSession, LocateAdapter, MemoryCatalog, RedirectKind,
    ReplicaRecord, ResolutionCache, ResolutionSource, ResolveError, Resolver, ResolverConfig,
    ResolverConfigBuilder,
};

fn config(root: &str) -> ResolverConfigBuilder {
    ResolverConfigBuilder::new()
        .root(root)
        .redirect("eos.cern.ch", 1094)
        .upstream("uplink.cern.ch", 1094)
}

#[test]
fn scenario_a_root_in_lfn_needs_no_catalog() {
    let catalog = MemoryCatalog::new();
    let calls = catalog.call_log();
    let resolver = Resolver::new(config("/data/eos").build().unwrap(), Box::new(catalog));

    let resolution = resolver.resolve("/data/eos/x/y").unwrap();
    assert_eq!(resolution.pfn, "/data/eos/x/y");
    assert!(calls.is_empty());
    assert_eq!(resolver.metrics().catalog_calls(), 0);
}

#[test]
fn scenario_a_holds_for_any_position_of_root() {
    let catalog = MemoryCatalog::new();
    let calls = catalog.call_log();
    let resolver = Resolver::new(config("/eos/").build().unwrap(), Box::new(catalog));

    for lfn in ["/eos/a", "srm://se.cern.ch/eos/b", "/x/eos/c/d"] {
        assert_eq!(resolver.resolve(lfn).unwrap().pfn, lfn);
    }
    assert!(calls.is_empty());
}

#[test]
fn scenario_b_ttl() {
    let cache = ResolutionCache::new(Duration::from_secs(1), 100);
    let t0 = Instant::now();
    cache.insert_at("/a", "/p/a", t0);

    assert_eq!(
        cache.get_entry_at("/a", t0 + Duration::from_millis(500)),
        Some("/p/a".to_string())
    );
    assert_eq!(cache.get_entry_at("/a", t0 + Duration::from_millis(1500)), None);
    // not swept by the read
    assert_eq!(cache.len(), 1);
}

#[test]
fn scenario_c_capacity() {
    let cache = ResolutionCache::new(Duration::from_secs(3600), 10);
    let t0 = Instant::now();
    for i in 0..11 {
        cache.insert_at(&format!("/lfn/{}", i), "/pfn", t0 + Duration::from_millis(i));
        assert!(cache.len() <= 10);
    }

    assert_eq!(cache.len(), 10);
    let now = t0 + Duration::from_secs(1);
    assert_eq!(cache.get_entry_at("/lfn/0", now), None);
    for i in 1..11 {
        assert!(cache.get_entry_at(&format!("/lfn/{}", i), now).is_some());
    }
    assert!(cache.is_consistent());
}

#[test]
fn scenario_d_replica_filtering() {
    let catalog = MemoryCatalog::new().with_replicas("/lfn/f", &["", "/x/forbidden/y", "/x/good/y"]);
    let resolver = Resolver::new(
        config("/x")
            .forbidden(vec!["forbidden".to_string()])
            .build()
            .unwrap(),
        Box::new(catalog),
    );

    let resolution = resolver.resolve("/lfn/f").unwrap();
    assert_eq!(resolution.pfn, "/x/good/y");
    assert_eq!(resolution.source, ResolutionSource::Catalog);
}

#[test]
fn scenario_e_directory_probe() {
    let catalog = MemoryCatalog::new()
        .with_replicas("/a/b", &["/store/a/b"])
        .with_directory("/a", &["other", "b_v2"])
        .with_replicas("/a/b_v2/c", &["/store/a/b_v2/c"]);
    let calls = catalog.call_log();
    let resolver = Resolver::new(config("/store").build().unwrap(), Box::new(catalog));

    let resolution = resolver.resolve("/a/b/c").unwrap();
    assert_eq!(resolution.pfn, "/store/a/b_v2/c");
    assert_eq!(resolution.source, ResolutionSource::DirectoryProbe);

    let entries = calls.entries();
    let first_listing = entries.iter().position(|c| c.starts_with("list:")).unwrap();
    // both direct candidates were tried before any listing
    assert!(entries[..first_listing].contains(&"replicas:/a/b/c".to_string()));
    assert!(entries[..first_listing].contains(&"replicas:/grid/a/b/c".to_string()));
    assert_eq!(entries.last().unwrap(), "replicas:/a/b_v2/c");

    // cached afterwards
    assert_eq!(resolver.resolve("/a/b/c").unwrap().source, ResolutionSource::Cache);
}

#[test]
fn required_substrings_never_violated() {
    let catalog = MemoryCatalog::new()
        .with_replicas("/f1", &["/eos/bnl/f1"])
        .with_replicas("/f2", &["/eos/bnl/f2", "/eos/cern/f2"]);
    let resolver = Resolver::new(
        config("/eos")
            .required(vec!["cern".to_string()])
            .build()
            .unwrap(),
        Box::new(catalog),
    );

    assert!(matches!(resolver.resolve("/f1"), Err(ResolveError::NotFound(_))));
    assert_eq!(resolver.resolve("/f2").unwrap().pfn, "/eos/cern/f2");
}

#[test]
fn not_found_redirects_upstream_and_is_not_cached() {
    let catalog = MemoryCatalog::new();
    let calls = catalog.call_log();
    let adapter = LocateAdapter::with_session(
        config("/eos").upstream("meta.cern.ch", 1095).build().unwrap(),
        Box::new(catalog),
    );

    let target = adapter.locate("/atlas/mc/f", "t");
    assert_eq!(target.kind, RedirectKind::Upstream);
    assert_eq!((target.host.as_str(), target.port), ("meta.cern.ch", 1095));

    let first = calls.len();
    adapter.locate("/atlas/mc/f", "t");
    assert_eq!(calls.len(), 2 * first);
    assert!(adapter.resolver().cache().is_empty());
}

#[test]
fn config_from_parameter_string_drives_resolution() {
    let config = ResolverConfig::parse(
        "root=/eos/atlas rdrhost=eos-atlas.cern.ch rdrport=1094 nomatch=tape cache_ttl=60",
        Some("atlas-xrd.cern.ch"),
        None,
    )
    .unwrap();
    let catalog = MemoryCatalog::new().with_replicas(
        "/grid/atlas/dq2/data11/f",
        &["srm://srm-eos.cern.ch/tape/eos/atlas/data11/f", "srm://srm-eos.cern.ch/eos/atlas/data11/f"],
    );
    let adapter = LocateAdapter::with_session(config, Box::new(catalog));

    let target = adapter.locate("/atlas/data11/f", "t");
    assert_eq!(target.kind, RedirectKind::Storage);
    assert_eq!(
        target.to_string(),
        "eos-atlas.cern.ch:1094?eos.lfn=/eos/atlas/data11/f&eos.app=lfc"
    );
}

/// Session that fails the test if two calls ever overlap
struct SerialCheckSession {
    in_call: Arc<AtomicBool>,
    overlaps: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl SerialCheckSession {
    fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.in_call.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        thread::sleep(Duration::from_micros(200));
        self.in_call.store(false, Ordering::SeqCst);
    }
}

impl CatalogSession for SerialCheckSession {
    fn get_replicas(&mut self, query: &CatalogQuery) -> Result<Vec<ReplicaRecord>, CatalogError> {
        self.enter();
        match query.as_path() {
            Some(path) if path.starts_with("/grid/") => {
                Ok(vec![ReplicaRecord::new(format!("/eos{}", path))])
            }
            _ => Err(CatalogError::Call {
                op: "getreplica",
                target: query.to_string(),
                code: 2,
                message: "no such file".to_string(),
            }),
        }
    }

    fn list_dir(&mut self, _path: &str) -> Result<Vec<String>, CatalogError> {
        self.enter();
        Ok(Vec::new())
    }
}

#[test]
fn concurrent_resolution_serializes_catalog_calls() {
    let overlaps = Arc::new(AtomicUsize::new(0));
    let calls = Arc::new(AtomicUsize::new(0));
    let session = SerialCheckSession {
        in_call: Arc::new(AtomicBool::new(false)),
        overlaps: overlaps.clone(),
        calls: calls.clone(),
    };
    let adapter = Arc::new(LocateAdapter::with_session(
        config("/eos").build().unwrap(),
        Box::new(session),
    ));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let adapter = Arc::clone(&adapter);
            thread::spawn(move || {
                for i in 0..10 {
                    let lfn = format!("/cms/t{}/f{}", t % 4, i);
                    let target = adapter.locate(&lfn, &format!("worker{}", t));
                    assert_eq!(target.kind, RedirectKind::Storage);
                    assert_eq!(
                        target.opaque.unwrap(),
                        format!("eos.lfn=/eos/grid{}&eos.app=lfc", lfn)
                    );
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    assert!(calls.load(Ordering::SeqCst) > 0);

    let cache = adapter.resolver().cache();
    assert_eq!(cache.len(), 40);
    assert!(cache.is_consistent());
}
