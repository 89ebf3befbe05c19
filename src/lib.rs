//! Logical file name → physical file name resolution for a storage
//! redirector, backed by a session-based replica catalog and a bounded
//! resolution cache.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod filter;
pub mod json_output;
pub mod locate;
pub mod logging;
pub mod metrics;
pub mod probe;
pub mod resolver;
pub mod rewrite;

pub use crate::cache::ResolutionCache;
pub use crate::catalog::{CatalogClient, CatalogQuery, CatalogSession, MemoryCatalog, ReplicaRecord};
pub use crate::config::{FilterConfig, ResolverConfig, ResolverConfigBuilder};
pub use crate::error::{CatalogError, ConfigError, ResolveError};
pub use crate::locate::{LocateAdapter, RedirectKind, RedirectTarget, StatOutcome};
pub use crate::resolver::{Resolution, ResolutionSource, Resolver};
