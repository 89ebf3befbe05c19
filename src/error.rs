use thiserror::Error;

/// Problems found while building a [`crate::config::ResolverConfig`].
///
/// All of these are fatal at startup: the resolver is never activated
/// with a partial configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid parameter token: {0:?}")]
    InvalidToken(String),

    #[error("unknown parameter: {0}")]
    UnknownKey(String),

    #[error("invalid numeric value for {key}: {value:?}")]
    InvalidNumber { key: String, value: String },

    #[error("rdrhost is mandatory")]
    MissingRedirectHost,

    #[error("no upstream host configured, set N2N_UPLINK_HOST")]
    MissingUpstreamHost,

    #[error("cache_maxsize must be greater than zero")]
    ZeroCacheSize,
}

/// Catalog failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// The session could not be opened; fatal at startup.
    #[error("unable to open catalog session: {0}")]
    Session(String),

    /// A lookup or listing call returned a non-zero status.
    #[error("catalog {op} failed for {target} (code {code}): {message}")]
    Call {
        op: &'static str,
        target: String,
        code: i32,
        message: String,
    },
}

impl CatalogError {
    pub fn code(&self) -> Option<i32> {
        match self {
            CatalogError::Session(_) => None,
            CatalogError::Call { code, .. } => Some(*code),
        }
    }

    /// The catalog answered, and the name is not registered. This is an
    /// ordinary miss, not a catalog failure.
    pub fn is_no_such_entry(&self) -> bool {
        self.code() == Some(crate::catalog::ENOENT)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no valid replica for lfn={0}")]
    NotFound(String),
}
