//! Redirect decisions for the host redirector.
//!
//! This plugin never serves data. Every locate request is answered with a
//! redirect: to the storage instance when the name resolved, otherwise to
//! the upstream name authority, which gets the next chance to resolve it.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::catalog::CatalogSession;
use crate::config::ResolverConfig;
use crate::resolver::{Resolution, Resolver};

/// Opaque key carrying the resolved name to the next hop
pub const OPAQUE_LFN_KEY: &str = "eos.lfn";
/// Opaque key tagging the redirect as coming from this plugin
pub const OPAQUE_APP: &str = "eos.app=lfc";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectKind {
    /// Resolved: go to the storage instance
    Storage,
    /// Unresolved: cascade to the upstream authority
    Upstream,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectTarget {
    pub kind: RedirectKind,
    pub host: String,
    pub port: u16,
    /// Query string for the next hop, without the leading `?`
    pub opaque: Option<String>,
}

impl fmt::Display for RedirectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)?;
        if let Some(opaque) = &self.opaque {
            write!(f, "?{}", opaque)?;
        }
        Ok(())
    }
}

/// File metadata handed back on a successful stat
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatInfo {
    pub size: u64,
    pub mode: u32,
    pub mtime: i64,
}

impl StatInfo {
    /// Stand-in record for a file known only from the catalog
    pub fn placeholder() -> Self {
        StatInfo {
            size: 0,
            mode: 0o100644,
            mtime: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatOutcome {
    NotFound,
    Exists(StatInfo),
}

/// Entry point of the plugin: owns the resolver and answers locate and
/// stat requests. Share it between request threads with an [`Arc`].
pub struct LocateAdapter {
    resolver: Arc<Resolver>,
}

impl LocateAdapter {
    pub fn new(resolver: Arc<Resolver>) -> Self {
        LocateAdapter { resolver }
    }

    /// Build the resolver and adapter on an opened catalog session.
    pub fn with_session(config: ResolverConfig, session: Box<dyn CatalogSession>) -> Self {
        Self::new(Arc::new(Resolver::new(config, session)))
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn locate(&self, lfn: &str, client: &str) -> RedirectTarget {
        match self.resolver.resolve_as(lfn, client) {
            Ok(resolution) => self.storage_target(&resolution),
            Err(e) => {
                let config = self.resolver.config();
                log::info!(
                    "{} {}, redirect to upstream {}:{}",
                    client,
                    e,
                    config.upstream_host,
                    config.upstream_port
                );
                RedirectTarget {
                    kind: RedirectKind::Upstream,
                    host: config.upstream_host.clone(),
                    port: config.upstream_port,
                    opaque: None,
                }
            }
        }
    }

    fn storage_target(&self, resolution: &Resolution) -> RedirectTarget {
        let config = self.resolver.config();
        let opaque = resolution
            .pfn
            .find(config.root.as_str())
            .map(|pos| format!("{}={}&{}", OPAQUE_LFN_KEY, &resolution.pfn[pos..], OPAQUE_APP));

        RedirectTarget {
            kind: RedirectKind::Storage,
            host: config.redirect_host.clone(),
            port: config.redirect_port,
            opaque,
        }
    }

    /// Metadata request from a legacy client that cannot follow a redirect
    /// at this call site. An upstream redirect becomes "not found"; a
    /// redirect to storage becomes a placeholder record so the client goes
    /// on to open the file under the resolved name.
    pub fn stat(&self, lfn: &str, client: &str) -> StatOutcome {
        let target = self.locate(lfn, client);
        match target.kind {
            RedirectKind::Upstream => StatOutcome::NotFound,
            RedirectKind::Storage => {
                log::warn!(
                    "{} got redirection to {} for stat of {}, answering OK as the client cannot follow it",
                    client,
                    target,
                    lfn
                );
                StatOutcome::Exists(StatInfo::placeholder())
            }
        }
    }
}
