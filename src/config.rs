use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

/// Default port for both the redirect target and the upstream authority
pub const DEFAULT_PORT: u16 = 1094;
/// Default time an entry stays valid in the resolution cache (2 hours)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 2 * 3600;
/// Default maximum number of cached entries
pub const DEFAULT_CACHE_MAX_SIZE: usize = 500_000;

pub const ENV_UPSTREAM_HOST: &str = "N2N_UPLINK_HOST";
pub const ENV_UPSTREAM_PORT: &str = "N2N_UPLINK_PORT";

/// Substring rules applied to catalog replicas
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// A replica must contain at least one of these (if any are set)
    pub required: Vec<String>,
    /// A replica containing any of these is rejected
    pub forbidden: Vec<String>,
}

/// Resolver configuration, fixed for the lifetime of the resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Local storage root; empty when not configured
    pub root: String,
    pub redirect_host: String,
    pub redirect_port: u16,
    /// Name authority that gets the request when resolution fails
    pub upstream_host: String,
    pub upstream_port: u16,
    pub filter: FilterConfig,
    pub cache_ttl_secs: u64,
    pub cache_max_size: usize,
}

impl ResolverConfig {
    /// Build a configuration from the plugin parameter string and the
    /// upstream authority coming from the environment.
    ///
    /// Parameters are whitespace separated `key=value` tokens. Recognised
    /// keys are `root`, `rdrhost`, `rdrport`, `match`, `nomatch`,
    /// `cache_ttl` and `cache_maxsize`; anything else is rejected.
    pub fn parse(
        params: &str,
        upstream_host: Option<&str>,
        upstream_port: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ResolverConfigBuilder::new();

        for token in params.split([' ', '\t']).filter(|t| !t.is_empty()) {
            let keyval: Vec<&str> = token.split('=').filter(|s| !s.is_empty()).collect();
            if keyval.len() != 2 {
                log::error!("invalid parameter: {}", token);
                return Err(ConfigError::InvalidToken(token.to_string()));
            }

            let (key, val) = (keyval[0], keyval[1]);
            builder = match key {
                "root" => builder.root(val),
                "rdrhost" => builder.redirect_host(val),
                "rdrport" => builder.redirect_port(parse_number(key, val)?),
                "match" => builder.required(split_list(val)),
                "nomatch" => builder.forbidden(split_list(val)),
                "cache_ttl" => builder.cache_ttl_secs(parse_number(key, val)?),
                "cache_maxsize" => builder.cache_max_size(parse_number(key, val)?),
                _ => {
                    log::error!("invalid parameter: {}", key);
                    return Err(ConfigError::UnknownKey(key.to_string()));
                }
            };
        }

        if let Some(host) = upstream_host {
            builder = builder.upstream_host(host);
        }
        if let Some(port) = upstream_port {
            builder = builder.upstream_port(parse_number(ENV_UPSTREAM_PORT, port)?);
        }

        builder.build()
    }

    /// Same as [`ResolverConfig::parse`], reading the upstream authority
    /// from `N2N_UPLINK_HOST` / `N2N_UPLINK_PORT`.
    pub fn from_env(params: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(params, |key| std::env::var(key).ok())
    }

    /// [`ResolverConfig::from_env`] with the variable lookup supplied by
    /// the caller.
    pub fn from_lookup<F>(params: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup(ENV_UPSTREAM_HOST);
        let port = lookup(ENV_UPSTREAM_PORT);

        match &host {
            Some(h) => log::info!("{}={}", ENV_UPSTREAM_HOST, h),
            None => log::error!("no uplink host is configured, set {}", ENV_UPSTREAM_HOST),
        }
        if port.is_none() {
            log::info!("using the default uplink port number: {}", DEFAULT_PORT);
        }

        Self::parse(params, host.as_deref(), port.as_deref())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn has_root(&self) -> bool {
        !self.root.is_empty()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.redirect_host.is_empty() {
            return Err(ConfigError::MissingRedirectHost);
        }
        if self.upstream_host.is_empty() {
            return Err(ConfigError::MissingUpstreamHost);
        }
        if self.cache_max_size == 0 {
            return Err(ConfigError::ZeroCacheSize);
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, val: &str) -> Result<T, ConfigError> {
    val.parse().map_err(|_| {
        log::error!("invalid numeric {}: {}", key, val);
        ConfigError::InvalidNumber {
            key: key.to_string(),
            value: val.to_string(),
        }
    })
}

fn split_list(val: &str) -> Vec<String> {
    val.split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration builder for fluent API
pub struct ResolverConfigBuilder {
    config: ResolverConfig,
}

impl ResolverConfigBuilder {
    pub fn new() -> Self {
        ResolverConfigBuilder {
            config: ResolverConfig {
                root: String::new(),
                redirect_host: String::new(),
                redirect_port: DEFAULT_PORT,
                upstream_host: String::new(),
                upstream_port: DEFAULT_PORT,
                filter: FilterConfig::default(),
                cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
                cache_max_size: DEFAULT_CACHE_MAX_SIZE,
            },
        }
    }

    pub fn root(mut self, root: impl Into<String>) -> Self {
        self.config.root = root.into();
        self
    }

    pub fn redirect(self, host: impl Into<String>, port: u16) -> Self {
        self.redirect_host(host).redirect_port(port)
    }

    pub fn redirect_host(mut self, host: impl Into<String>) -> Self {
        self.config.redirect_host = host.into();
        self
    }

    pub fn redirect_port(mut self, port: u16) -> Self {
        self.config.redirect_port = port;
        self
    }

    pub fn upstream(self, host: impl Into<String>, port: u16) -> Self {
        self.upstream_host(host).upstream_port(port)
    }

    pub fn upstream_host(mut self, host: impl Into<String>) -> Self {
        self.config.upstream_host = host.into();
        self
    }

    pub fn upstream_port(mut self, port: u16) -> Self {
        self.config.upstream_port = port;
        self
    }

    pub fn required(mut self, required: Vec<String>) -> Self {
        self.config.filter.required = required;
        self
    }

    pub fn forbidden(mut self, forbidden: Vec<String>) -> Self {
        self.config.filter.forbidden = forbidden;
        self
    }

    pub fn cache_ttl_secs(mut self, secs: u64) -> Self {
        self.config.cache_ttl_secs = secs;
        self
    }

    pub fn cache_max_size(mut self, size: usize) -> Self {
        self.config.cache_max_size = size;
        self
    }

    pub fn build(self) -> Result<ResolverConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ResolverConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
