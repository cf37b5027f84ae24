/// Caching layer for resolved identities
///
/// Provides the cache store abstraction used by the resolver, with:
/// - an in-memory store (default, also used in tests)
/// - a Redis store for sharing results across processes

pub mod memory;
pub mod redis_store;

pub use self::memory::MemoryCacheStore;
pub use self::redis_store::RedisCacheStore;

use crate::{config::CacheConfig, error::BeaconResult, identity::DidDocument};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Key/value store with per-entry TTL
///
/// Stores never fail from the caller's point of view: backend errors are
/// logged and reported as a miss.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Whether a live entry exists for the key
    async fn has(&self, key: &str) -> bool;

    /// Fetch a live entry
    async fn get(&self, key: &str) -> Option<CacheValue>;

    /// Store an entry for `ttl_secs` seconds, replacing any previous value
    async fn put(&self, key: &str, value: CacheValue, ttl_secs: u64);

    /// Remove an entry; absent keys are ignored
    async fn forget(&self, key: &str);

    /// Remove every entry
    async fn flush(&self);
}

/// Value stored in the cache
///
/// The variant survives serialization, so a stored document is never
/// confused with a stored DID or URL string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CacheValue {
    Document(DidDocument),
    Text(String),
}

impl CacheValue {
    pub fn into_document(self) -> Option<DidDocument> {
        match self {
            CacheValue::Document(doc) => Some(doc),
            CacheValue::Text(_) => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            CacheValue::Text(text) => Some(text),
            CacheValue::Document(_) => None,
        }
    }
}

impl From<DidDocument> for CacheValue {
    fn from(doc: DidDocument) -> Self {
        CacheValue::Document(doc)
    }
}

impl From<String> for CacheValue {
    fn from(text: String) -> Self {
        CacheValue::Text(text)
    }
}

/// Resolved cache settings consumed by the resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub enabled: bool,
    /// DID document TTL in seconds
    pub did_ttl: u64,
    /// Handle -> DID TTL in seconds
    pub handle_ttl: u64,
    /// PDS endpoint TTL in seconds
    pub pds_ttl: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheConfig::default().settings()
    }
}

/// Cache key namespaces
pub mod keys {
    pub const DID: &str = "did:";
    pub const HANDLE: &str = "handle:";
    pub const PDS: &str = "pds:";

    pub fn did(did: &str) -> String {
        format!("{}{}", DID, did)
    }

    pub fn handle(handle: &str) -> String {
        format!("{}{}", HANDLE, handle)
    }

    pub fn pds(actor: &str) -> String {
        format!("{}{}", PDS, actor)
    }
}

/// Build the store selected by configuration
pub async fn build_store(config: &CacheConfig) -> BeaconResult<Arc<dyn CacheStore>> {
    match &config.redis_url {
        Some(url) => {
            let store = RedisCacheStore::connect(url, &config.key_prefix).await?;
            Ok(Arc::new(store))
        }
        None => {
            info!("Using in-memory identity cache");
            Ok(Arc::new(MemoryCacheStore::new()))
        }
    }
}
