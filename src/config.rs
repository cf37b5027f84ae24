/// Configuration management for Beacon
use crate::{
    cache::CacheSettings,
    error::{BeaconError, BeaconResult},
};
use serde::{Deserialize, Serialize};
use std::{env, str::FromStr, time::Duration};

pub const DEFAULT_PLC_DIRECTORY: &str = "https://plc.directory";
pub const DEFAULT_PDS_ENDPOINT: &str = "https://bsky.social";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_TTL_SECS: u64 = 3600;
pub const DEFAULT_KEY_PREFIX: &str = "beacon:";

/// Resolver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeaconConfig {
    /// PLC directory used for did:plc resolution
    pub plc_directory: String,
    /// PDS used for handle resolution
    pub pds_endpoint: String,
    /// Per-request HTTP timeout in seconds
    pub timeout: u64,
    /// User-Agent header for HTTP requests
    pub user_agent: String,
    pub cache: CacheConfig,
}

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable caching globally
    pub enabled: bool,
    /// DID document TTL in seconds
    pub did_ttl: u64,
    /// Handle -> DID TTL in seconds
    pub handle_ttl: u64,
    /// PDS endpoint TTL in seconds
    pub pds_ttl: u64,
    /// Redis connection URL; the in-memory store is used when unset
    pub redis_url: Option<String>,
    /// Key prefix for Redis entries
    pub key_prefix: String,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            plc_directory: DEFAULT_PLC_DIRECTORY.to_string(),
            pds_endpoint: DEFAULT_PDS_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT_SECS,
            user_agent: default_user_agent(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            did_ttl: DEFAULT_TTL_SECS,
            handle_ttl: DEFAULT_TTL_SECS,
            pds_ttl: DEFAULT_TTL_SECS,
            redis_url: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl CacheConfig {
    /// Resolved values handed to the orchestrator
    pub fn settings(&self) -> CacheSettings {
        CacheSettings {
            enabled: self.enabled,
            did_ttl: self.did_ttl,
            handle_ttl: self.handle_ttl,
            pds_ttl: self.pds_ttl,
        }
    }
}

impl BeaconConfig {
    /// Load configuration from environment variables (and `.env`, if present)
    pub fn from_env() -> BeaconResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> BeaconResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = CacheConfig::default();

        let config = BeaconConfig {
            plc_directory: lookup("BEACON_PLC_DIRECTORY")
                .unwrap_or_else(|| DEFAULT_PLC_DIRECTORY.to_string()),
            pds_endpoint: lookup("BEACON_PDS_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_PDS_ENDPOINT.to_string()),
            timeout: parse_var(&lookup, "BEACON_TIMEOUT", DEFAULT_TIMEOUT_SECS)?,
            user_agent: lookup("BEACON_USER_AGENT").unwrap_or_else(default_user_agent),
            cache: CacheConfig {
                enabled: parse_var(&lookup, "BEACON_CACHE_ENABLED", defaults.enabled)?,
                did_ttl: parse_var(&lookup, "BEACON_CACHE_DID_TTL", defaults.did_ttl)?,
                handle_ttl: parse_var(&lookup, "BEACON_CACHE_HANDLE_TTL", defaults.handle_ttl)?,
                pds_ttl: parse_var(&lookup, "BEACON_CACHE_PDS_TTL", defaults.pds_ttl)?,
                redis_url: lookup("BEACON_REDIS_URL").filter(|url| !url.trim().is_empty()),
                key_prefix: lookup("BEACON_CACHE_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> BeaconResult<()> {
        validate_url("plc_directory", &self.plc_directory)?;
        validate_url("pds_endpoint", &self.pds_endpoint)?;

        if self.timeout == 0 {
            return Err(BeaconError::Config("timeout must be greater than zero".to_string()));
        }

        // Redis flushes by prefix; an empty one would match the whole database
        if self.cache.redis_url.is_some() && self.cache.key_prefix.trim().is_empty() {
            return Err(BeaconError::Config(
                "key_prefix cannot be empty when redis_url is set".to_string(),
            ));
        }

        Ok(())
    }

    /// HTTP timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

fn default_user_agent() -> String {
    format!("Beacon/{}", env!("CARGO_PKG_VERSION"))
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> BeaconResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| BeaconError::Config(format!("Invalid value for {}: {:?}", key, raw))),
        None => Ok(default),
    }
}

fn validate_url(name: &str, url: &str) -> BeaconResult<()> {
    if url.is_empty() {
        return Err(BeaconError::Config(format!("{} cannot be empty", name)));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(BeaconError::Config(format!("{} must be an http(s) URL: {}", name, url)));
    }
    Ok(())
}
