//! Replica catalog client.
//!
//! The catalog is reached through a single stateful session. Legacy
//! catalog client libraries are not safe for concurrent calls on one
//! session, so [`CatalogClient`] owns the session behind one mutex and
//! every remote call holds it for its whole duration.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::CatalogError;
use crate::logging::{CatalogEvent, EventLog};
use crate::metrics::ResolverMetrics;

/// Marker embedded in a logical name that carries a global identifier
pub const GUID_MARKER: &str = "!GUID=";

/// Error code reported for names the catalog does not know
pub const ENOENT: i32 = 2;

/// One replica returned by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaRecord {
    /// Storage file name of the replica; may be empty
    pub sfn: String,
}

impl ReplicaRecord {
    pub fn new(sfn: impl Into<String>) -> Self {
        ReplicaRecord { sfn: sfn.into() }
    }
}

/// What a replica lookup is keyed on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CatalogQuery {
    Path(String),
    Guid(String),
}

impl CatalogQuery {
    /// Classify a candidate string. Everything after the first
    /// [`GUID_MARKER`] is the identifier.
    pub fn from_candidate(candidate: &str) -> Self {
        match candidate.find(GUID_MARKER) {
            Some(pos) => CatalogQuery::Guid(candidate[pos + GUID_MARKER.len()..].to_string()),
            None => CatalogQuery::Path(candidate.to_string()),
        }
    }

    pub fn as_path(&self) -> Option<&str> {
        match self {
            CatalogQuery::Path(path) => Some(path),
            CatalogQuery::Guid(_) => None,
        }
    }
}

impl fmt::Display for CatalogQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogQuery::Path(path) => write!(f, "{}", path),
            CatalogQuery::Guid(guid) => write!(f, "{}{}", GUID_MARKER, guid),
        }
    }
}

/// An open catalog session.
///
/// Implementations only need to be usable from one thread at a time;
/// [`CatalogClient`] provides the exclusion. The session ends when the
/// value is dropped.
pub trait CatalogSession: Send {
    fn get_replicas(&mut self, query: &CatalogQuery) -> Result<Vec<ReplicaRecord>, CatalogError>;

    /// Names of the direct children of `path`.
    fn list_dir(&mut self, path: &str) -> Result<Vec<String>, CatalogError>;
}

/// Serialized access to the catalog session.
///
/// Call failures are folded into empty results for the resolution flow.
/// A "no such entry" answer only bumps [`ResolverMetrics::catalog_not_found`];
/// any other failure is counted in [`ResolverMetrics::catalog_errors`] and
/// recorded in the shared [`EventLog`] with its error code, so an outage
/// stands out from ordinary misses.
pub struct CatalogClient {
    session: Mutex<Box<dyn CatalogSession>>,
    metrics: ResolverMetrics,
    events: Arc<Mutex<EventLog>>,
}

impl CatalogClient {
    pub fn new(
        session: Box<dyn CatalogSession>,
        metrics: ResolverMetrics,
        events: Arc<Mutex<EventLog>>,
    ) -> Self {
        CatalogClient {
            session: Mutex::new(session),
            metrics,
            events,
        }
    }

    /// Replica lookup that surfaces the call failure.
    pub fn try_replicas(&self, query: &CatalogQuery) -> Result<Vec<ReplicaRecord>, CatalogError> {
        self.metrics.record_replica_query();
        let mut session = self.session.lock();
        session.get_replicas(query)
    }

    /// Directory listing that surfaces the call failure.
    pub fn try_list_dir(&self, path: &str) -> Result<Vec<String>, CatalogError> {
        self.metrics.record_dir_listing();
        let mut session = self.session.lock();
        session.list_dir(path)
    }

    /// Replica lookup on behalf of `client`; a failed call counts as
    /// "no replicas".
    pub fn replicas(&self, query: &CatalogQuery, client: &str) -> Vec<ReplicaRecord> {
        self.try_replicas(query).unwrap_or_else(|e| {
            self.report_failure(&e, client);
            Vec::new()
        })
    }

    /// Directory listing on behalf of `client`; a failed call counts as an
    /// empty directory.
    pub fn list_dir(&self, path: &str, client: &str) -> Vec<String> {
        self.try_list_dir(path).unwrap_or_else(|e| {
            self.report_failure(&e, client);
            Vec::new()
        })
    }

    fn report_failure(&self, error: &CatalogError, client: &str) {
        if error.is_no_such_entry() {
            self.metrics.record_catalog_not_found();
            log::trace!("{} {}", client, error);
            return;
        }

        self.metrics.record_catalog_error();
        log::warn!("{} {}", client, error);
        self.events.lock().record(CatalogEvent::from_error(client, error));
    }
}

impl Drop for CatalogClient {
    fn drop(&mut self) {
        log::debug!("ending catalog session");
    }
}

/// Shared record of the calls a [`MemoryCatalog`] served
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn push(&self, entry: String) {
        self.0.lock().push(entry);
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls in order, as `replicas:<path>`, `guid:<id>` or `list:<dir>`
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// In-process catalog session backed by lookup tables.
///
/// Used for tests and for driving the resolver from a JSON snapshot:
///
/// ```json
/// {
///   "replicas":    { "/grid/atlas/f": ["srm://se.cern.ch/data/eos/atlas/f"] },
///   "guids":       { "8f2e-...": ["srm://se.cern.ch/data/eos/atlas/g"] },
///   "directories": { "/grid/atlas/dq2/data11": ["NTUP_v2"] }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryCatalog {
    #[serde(default)]
    replicas: HashMap<String, Vec<String>>,
    #[serde(default)]
    guids: HashMap<String, Vec<String>>,
    #[serde(default)]
    directories: HashMap<String, Vec<String>>,
    #[serde(skip)]
    failures: HashMap<String, i32>,
    #[serde(skip)]
    calls: CallLog,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        serde_json::from_str(json)
            .map_err(|e| CatalogError::Session(format!("invalid catalog snapshot: {}", e)))
    }

    /// Open a session on a snapshot file.
    pub fn open_snapshot(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::Session(format!("{}: {}", path.display(), e)))?;
        let catalog = Self::from_json(&json)?;
        log::info!(
            "opened catalog snapshot {} ({} paths, {} guids, {} directories)",
            path.display(),
            catalog.replicas.len(),
            catalog.guids.len(),
            catalog.directories.len()
        );
        Ok(catalog)
    }

    pub fn with_replicas(mut self, path: &str, sfns: &[&str]) -> Self {
        self.replicas
            .insert(path.to_string(), sfns.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_guid(mut self, guid: &str, sfns: &[&str]) -> Self {
        self.guids
            .insert(guid.to_string(), sfns.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_directory(mut self, path: &str, children: &[&str]) -> Self {
        self.directories
            .insert(path.to_string(), children.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Make every call on `target` (path, guid or directory) fail with `code`.
    pub fn fail_on(mut self, target: &str, code: i32) -> Self {
        self.failures.insert(target.to_string(), code);
        self
    }

    /// Handle on the call log; stays valid after the catalog is boxed.
    pub fn call_log(&self) -> CallLog {
        self.calls.clone()
    }

    fn check_failure(&self, op: &'static str, target: &str) -> Result<(), CatalogError> {
        match self.failures.get(target) {
            Some(&code) => Err(CatalogError::Call {
                op,
                target: target.to_string(),
                code,
                message: "injected failure".to_string(),
            }),
            None => Ok(()),
        }
    }
}

fn not_found(op: &'static str, target: &str) -> CatalogError {
    CatalogError::Call {
        op,
        target: target.to_string(),
        code: ENOENT,
        message: "no such file or directory".to_string(),
    }
}

impl CatalogSession for MemoryCatalog {
    fn get_replicas(&mut self, query: &CatalogQuery) -> Result<Vec<ReplicaRecord>, CatalogError> {
        let (table, key, entry) = match query {
            CatalogQuery::Path(path) => (&self.replicas, path, format!("replicas:{}", path)),
            CatalogQuery::Guid(guid) => (&self.guids, guid, format!("guid:{}", guid)),
        };
        self.calls.push(entry);
        self.check_failure("getreplica", key)?;

        table
            .get(key)
            .map(|sfns| sfns.iter().map(ReplicaRecord::new).collect())
            .ok_or_else(|| not_found("getreplica", key))
    }

    fn list_dir(&mut self, path: &str) -> Result<Vec<String>, CatalogError> {
        self.calls.push(format!("list:{}", path));
        self.check_failure("opendir", path)?;

        self.directories
            .get(path)
            .cloned()
            .ok_or_else(|| not_found("opendir", path))
    }
}
