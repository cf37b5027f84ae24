/// Identity resolution service - cache-first resolution of DIDs and handles
use crate::{
    cache::{build_store, keys, CacheSettings, CacheStore, CacheValue, MemoryCacheStore},
    config::BeaconConfig,
    error::BeaconResult,
    identity::{is_did, AtProtoHandleResolver, DidDocument, DidResolver, DidResolverManager, HandleResolver},
    metrics,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Resolves DIDs, handles, and PDS endpoints with a cache in front
///
/// Every operation takes a `use_cache` flag. When false (or when caching is
/// disabled in the settings) the call neither reads nor writes the cache,
/// and the same applies to every stage of composite operations.
#[derive(Clone)]
pub struct Beacon {
    did_resolver: Arc<dyn DidResolver>,
    handle_resolver: Arc<dyn HandleResolver>,
    cache: Arc<dyn CacheStore>,
    settings: Arc<RwLock<CacheSettings>>,
}

impl Beacon {
    /// Create a service from its collaborators, with default cache settings
    pub fn new(
        did_resolver: Arc<dyn DidResolver>,
        handle_resolver: Arc<dyn HandleResolver>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            did_resolver,
            handle_resolver,
            cache,
            settings: Arc::new(RwLock::new(CacheSettings::default())),
        }
    }

    /// Replace the initial cache settings
    pub fn with_settings(self, settings: CacheSettings) -> Self {
        Self {
            settings: Arc::new(RwLock::new(settings)),
            ..self
        }
    }

    /// Wire the default PLC and handle resolvers and the configured cache store
    pub async fn from_config(config: &BeaconConfig) -> BeaconResult<Self> {
        config.validate()?;

        let did_resolver = Arc::new(DidResolverManager::with_defaults(config)?);
        let handle_resolver = Arc::new(AtProtoHandleResolver::from_config(config)?);
        let cache: Arc<dyn CacheStore> = if config.cache.enabled {
            build_store(&config.cache).await?
        } else {
            Arc::new(MemoryCacheStore::new())
        };

        Ok(Self::new(did_resolver, handle_resolver, cache).with_settings(config.cache.settings()))
    }

    /// Current cache settings
    pub async fn cache_settings(&self) -> CacheSettings {
        *self.settings.read().await
    }

    /// Change cache settings at runtime
    ///
    /// TTLs are read at write time, so only entries written afterwards are
    /// affected.
    pub async fn set_cache_settings(&self, settings: CacheSettings) {
        *self.settings.write().await = settings;
    }

    /// Resolve a DID to its document
    pub async fn resolve_did(&self, did: &str, use_cache: bool) -> BeaconResult<DidDocument> {
        let use_cache = self.caching(use_cache).await;
        let cache_key = keys::did(did);

        if use_cache {
            let cached = self.cache.get(&cache_key).await.and_then(CacheValue::into_document);
            metrics::record_cache_access("did", cached.is_some());
            if let Some(doc) = cached {
                debug!("Cache HIT: {}", cache_key);
                return Ok(doc);
            }
            debug!("Cache MISS: {}", cache_key);
        }

        let doc = timed("did", did, self.did_resolver.resolve(did)).await?;

        if use_cache {
            let ttl = self.settings.read().await.did_ttl;
            self.cache.put(&cache_key, doc.clone().into(), ttl).await;
        }

        Ok(doc)
    }

    /// Convert a handle to its DID
    pub async fn handle_to_did(&self, handle: &str, use_cache: bool) -> BeaconResult<String> {
        let use_cache = self.caching(use_cache).await;
        let cache_key = keys::handle(handle);

        if use_cache {
            let cached = self.cache.get(&cache_key).await.and_then(CacheValue::into_text);
            metrics::record_cache_access("handle", cached.is_some());
            if let Some(did) = cached {
                debug!("Cache HIT: {}", cache_key);
                return Ok(did);
            }
            debug!("Cache MISS: {}", cache_key);
        }

        let did = timed("handle", handle, self.handle_resolver.resolve(handle)).await?;

        if use_cache {
            let ttl = self.settings.read().await.handle_ttl;
            self.cache.put(&cache_key, did.clone().into(), ttl).await;
        }

        Ok(did)
    }

    /// Resolve a handle to the document of the DID it points at
    pub async fn resolve_handle(&self, handle: &str, use_cache: bool) -> BeaconResult<DidDocument> {
        let did = self.handle_to_did(handle, use_cache).await?;
        self.resolve_did(&did, use_cache).await
    }

    /// Resolve a DID or a handle to a DID document
    pub async fn resolve_identity(&self, actor: &str, use_cache: bool) -> BeaconResult<DidDocument> {
        if is_did(actor) {
            self.resolve_did(actor, use_cache).await
        } else {
            self.resolve_handle(actor, use_cache).await
        }
    }

    /// Resolve a DID or a handle to its PDS endpoint
    ///
    /// Only a found endpoint is cached; identities without a PDS service are
    /// resolved again on every call.
    pub async fn resolve_pds(&self, actor: &str, use_cache: bool) -> BeaconResult<Option<String>> {
        let use_cache = self.caching(use_cache).await;
        let cache_key = keys::pds(actor);

        if use_cache {
            let cached = self.cache.get(&cache_key).await.and_then(CacheValue::into_text);
            metrics::record_cache_access("pds", cached.is_some());
            if let Some(endpoint) = cached {
                debug!("Cache HIT: {}", cache_key);
                return Ok(Some(endpoint));
            }
            debug!("Cache MISS: {}", cache_key);
        }

        let doc = self.resolve_identity(actor, use_cache).await?;
        let endpoint = doc.pds_endpoint().map(str::to_string);

        match &endpoint {
            Some(url) if use_cache => {
                let ttl = self.settings.read().await.pds_ttl;
                self.cache.put(&cache_key, url.clone().into(), ttl).await;
            }
            None => debug!("No PDS service in document for {}", actor),
            _ => {}
        }

        Ok(endpoint)
    }

    /// Primary handle of a DID, read from its document's `alsoKnownAs`
    pub async fn did_to_handle(&self, did: &str, use_cache: bool) -> BeaconResult<Option<String>> {
        let doc = self.resolve_did(did, use_cache).await?;
        Ok(doc.handle().map(str::to_string))
    }

    /// Clear the cached document for a DID
    pub async fn clear_did_cache(&self, did: &str) {
        self.cache.forget(&keys::did(did)).await;
    }

    /// Clear the cached DID for a handle
    pub async fn clear_handle_cache(&self, handle: &str) {
        self.cache.forget(&keys::handle(handle)).await;
    }

    /// Clear the cached PDS endpoint for a DID or handle
    pub async fn clear_pds_cache(&self, actor: &str) {
        self.cache.forget(&keys::pds(actor)).await;
    }

    /// Clear every cached entry
    pub async fn clear_cache(&self) {
        self.cache.flush().await;
    }

    async fn caching(&self, use_cache: bool) -> bool {
        use_cache && self.settings.read().await.enabled
    }
}

async fn timed<T, F>(kind: &str, input: &str, resolution: F) -> BeaconResult<T>
where
    F: Future<Output = BeaconResult<T>>,
{
    let started = Instant::now();
    let result = resolution.await;
    metrics::record_resolution(kind, result.is_ok(), started.elapsed().as_secs_f64());

    if let Err(e) = &result {
        warn!("{} resolution failed for {}: {}", kind, input, e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BeaconError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeDidResolver {
        documents: HashMap<String, DidDocument>,
        calls: AtomicUsize,
    }

    impl FakeDidResolver {
        fn new(documents: Vec<DidDocument>) -> Arc<Self> {
            Arc::new(Self {
                documents: documents.into_iter().map(|d| (d.id.clone(), d)).collect(),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DidResolver for FakeDidResolver {
        async fn resolve(&self, did: &str) -> BeaconResult<DidDocument> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.documents
                .get(did)
                .cloned()
                .ok_or_else(|| BeaconError::did_failed(did, "404 Not Found"))
        }

        fn supports(&self, method: &str) -> bool {
            method == "plc"
        }
    }

    struct FakeHandleResolver {
        handles: HashMap<String, String>,
        calls: AtomicUsize,
    }

    impl FakeHandleResolver {
        fn new(handles: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                handles: handles
                    .iter()
                    .map(|(h, d)| (h.to_string(), d.to_string()))
                    .collect(),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HandleResolver for FakeHandleResolver {
        async fn resolve(&self, handle: &str) -> BeaconResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.handles
                .get(handle)
                .cloned()
                .ok_or_else(|| BeaconError::handle_failed(handle, "Unable to resolve handle"))
        }
    }

    /// Memory store that records every write
    #[derive(Default)]
    struct RecordingStore {
        inner: MemoryCacheStore,
        puts: Mutex<Vec<(String, u64)>>,
    }

    impl RecordingStore {
        fn puts(&self) -> Vec<(String, u64)> {
            self.puts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CacheStore for RecordingStore {
        async fn has(&self, key: &str) -> bool {
            self.inner.has(key).await
        }

        async fn get(&self, key: &str) -> Option<CacheValue> {
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, value: CacheValue, ttl_secs: u64) {
            self.puts.lock().unwrap().push((key.to_string(), ttl_secs));
            self.inner.put(key, value, ttl_secs).await
        }

        async fn forget(&self, key: &str) {
            self.inner.forget(key).await
        }

        async fn flush(&self) {
            self.inner.flush().await
        }
    }

    fn alice_doc() -> DidDocument {
        DidDocument::from_value(json!({
            "id": "did:plc:abc123",
            "alsoKnownAs": ["at://user.bsky.social"],
            "service": [{
                "id": "#atproto_pds",
                "type": "AtprotoPersonalDataServer",
                "serviceEndpoint": "https://pds.example.com"
            }]
        }))
        .unwrap()
    }

    fn bob_doc() -> DidDocument {
        DidDocument::from_value(json!({
            "id": "did:plc:bob456",
            "alsoKnownAs": ["at://bob.test"]
        }))
        .unwrap()
    }

    struct Fixture {
        beacon: Beacon,
        dids: Arc<FakeDidResolver>,
        handles: Arc<FakeHandleResolver>,
        store: Arc<RecordingStore>,
    }

    fn fixture() -> Fixture {
        let dids = FakeDidResolver::new(vec![alice_doc(), bob_doc()]);
        let handles = FakeHandleResolver::new(&[
            ("user.bsky.social", "did:plc:abc123"),
            ("bob.test", "did:plc:bob456"),
            ("ghost.test", "did:plc:missing"),
        ]);
        let store = Arc::new(RecordingStore::default());
        let settings = CacheSettings {
            enabled: true,
            did_ttl: 100,
            handle_ttl: 200,
            pds_ttl: 300,
        };
        let beacon = Beacon::new(dids.clone(), handles.clone(), store.clone()).with_settings(settings);

        Fixture {
            beacon,
            dids,
            handles,
            store,
        }
    }

    #[tokio::test]
    async fn test_resolve_did_uses_cache() {
        let f = fixture();

        let first = f.beacon.resolve_did("did:plc:abc123", true).await.unwrap();
        let second = f.beacon.resolve_did("did:plc:abc123", true).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(f.dids.calls(), 1);
        assert_eq!(f.store.puts(), vec![("did:did:plc:abc123".to_string(), 100)]);
    }

    #[tokio::test]
    async fn test_resolve_did_without_cache() {
        let f = fixture();

        f.beacon.resolve_did("did:plc:abc123", true).await.unwrap();
        f.beacon.resolve_did("did:plc:abc123", false).await.unwrap();
        f.beacon.resolve_did("did:plc:abc123", false).await.unwrap();

        assert_eq!(f.dids.calls(), 3);
        assert_eq!(f.store.puts().len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_did_failure_propagates_and_is_not_cached() {
        let f = fixture();

        let err = f.beacon.resolve_did("did:plc:missing", true).await.unwrap_err();
        assert!(matches!(err, BeaconError::DidResolutionFailed { did, .. } if did == "did:plc:missing"));

        f.beacon.resolve_did("did:plc:missing", true).await.unwrap_err();
        assert_eq!(f.dids.calls(), 2);
        assert!(f.store.puts().is_empty());
    }

    #[tokio::test]
    async fn test_handle_to_did() {
        let f = fixture();

        let did = f.beacon.handle_to_did("user.bsky.social", true).await.unwrap();

        assert_eq!(did, "did:plc:abc123");
        assert_eq!(f.handles.calls(), 1);
        assert_eq!(f.store.puts(), vec![("handle:user.bsky.social".to_string(), 200)]);

        f.beacon.handle_to_did("user.bsky.social", true).await.unwrap();
        assert_eq!(f.handles.calls(), 1);
    }

    #[tokio::test]
    async fn test_resolve_handle() {
        let f = fixture();

        let doc = f.beacon.resolve_handle("user.bsky.social", true).await.unwrap();

        assert_eq!(doc.id, "did:plc:abc123");
        assert_eq!(doc.handle(), Some("user.bsky.social"));
        assert_eq!(f.handles.calls(), 1);
        assert_eq!(f.dids.calls(), 1);
    }

    #[tokio::test]
    async fn test_resolve_handle_threads_cache_flag() {
        let f = fixture();

        f.beacon.resolve_handle("user.bsky.social", false).await.unwrap();
        f.beacon.resolve_handle("user.bsky.social", false).await.unwrap();

        assert_eq!(f.handles.calls(), 2);
        assert_eq!(f.dids.calls(), 2);
        assert!(f.store.puts().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_identity_with_did_skips_handle_resolver() {
        let f = fixture();

        let doc = f.beacon.resolve_identity("did:plc:abc123", true).await.unwrap();

        assert_eq!(doc.id, "did:plc:abc123");
        assert_eq!(f.handles.calls(), 0);
        assert_eq!(f.dids.calls(), 1);
    }

    #[tokio::test]
    async fn test_resolve_identity_with_handle() {
        let f = fixture();

        let doc = f.beacon.resolve_identity("user.bsky.social", true).await.unwrap();

        assert_eq!(doc.id, "did:plc:abc123");
        assert_eq!(doc.handle(), Some("user.bsky.social"));
        assert_eq!(f.handles.calls(), 1);
        assert_eq!(f.dids.calls(), 1);
    }

    #[tokio::test]
    async fn test_resolve_identity_handle_failure_stops_chain() {
        let f = fixture();

        let err = f.beacon.resolve_identity("nobody.test", true).await.unwrap_err();

        assert!(matches!(err, BeaconError::HandleResolutionFailed { .. }));
        assert_eq!(f.dids.calls(), 0);
    }

    #[tokio::test]
    async fn test_resolve_pds_caches_found_endpoint() {
        let f = fixture();

        let pds = f.beacon.resolve_pds("user.bsky.social", true).await.unwrap();
        assert_eq!(pds.as_deref(), Some("https://pds.example.com"));

        let pds = f.beacon.resolve_pds("user.bsky.social", true).await.unwrap();
        assert_eq!(pds.as_deref(), Some("https://pds.example.com"));

        assert_eq!(f.handles.calls(), 1);
        assert_eq!(f.dids.calls(), 1);
        assert!(f
            .store
            .puts()
            .contains(&("pds:user.bsky.social".to_string(), 300)));
    }

    #[tokio::test]
    async fn test_resolve_pds_benefits_from_identity_cache() {
        let f = fixture();

        f.beacon.resolve_did("did:plc:abc123", true).await.unwrap();
        let pds = f.beacon.resolve_pds("did:plc:abc123", true).await.unwrap();

        assert_eq!(pds.as_deref(), Some("https://pds.example.com"));
        assert_eq!(f.dids.calls(), 1);
    }

    #[tokio::test]
    async fn test_resolve_pds_does_not_cache_absence() {
        let f = fixture();

        assert_eq!(f.beacon.resolve_pds("did:plc:bob456", false).await.unwrap(), None);
        assert_eq!(f.beacon.resolve_pds("did:plc:bob456", false).await.unwrap(), None);
        assert_eq!(f.dids.calls(), 2);

        // With caching on, the document is cached but the missing endpoint is not
        assert_eq!(f.beacon.resolve_pds("bob.test", true).await.unwrap(), None);
        assert_eq!(f.beacon.resolve_pds("bob.test", true).await.unwrap(), None);
        assert!(!f.store.puts().iter().any(|(key, _)| key.starts_with("pds:")));
        assert!(!f.store.has("pds:bob.test").await);
    }

    #[tokio::test]
    async fn test_resolve_pds_without_pds_reruns_chain_without_identity_cache() {
        let f = fixture();

        f.beacon.resolve_pds("bob.test", false).await.unwrap();
        f.beacon.resolve_pds("bob.test", false).await.unwrap();

        assert_eq!(f.handles.calls(), 2);
        assert_eq!(f.dids.calls(), 2);
    }

    #[tokio::test]
    async fn test_clear_did_cache_forces_fresh_resolution() {
        let f = fixture();

        f.beacon.resolve_did("did:plc:abc123", true).await.unwrap();
        f.beacon.clear_did_cache("did:plc:abc123").await;
        f.beacon.resolve_did("did:plc:abc123", true).await.unwrap();

        assert_eq!(f.dids.calls(), 2);

        // Clearing an absent key is a no-op
        f.beacon.clear_did_cache("did:plc:unknown").await;
    }

    #[tokio::test]
    async fn test_clear_handle_and_pds_cache() {
        let f = fixture();

        f.beacon.resolve_pds("user.bsky.social", true).await.unwrap();
        f.beacon.clear_pds_cache("user.bsky.social").await;
        f.beacon.clear_handle_cache("user.bsky.social").await;

        assert!(!f.store.has("pds:user.bsky.social").await);
        assert!(!f.store.has("handle:user.bsky.social").await);
        assert!(f.store.has("did:did:plc:abc123").await);

        f.beacon.resolve_pds("user.bsky.social", true).await.unwrap();
        assert_eq!(f.handles.calls(), 2);
        assert_eq!(f.dids.calls(), 1);
    }

    #[tokio::test]
    async fn test_clear_cache_drops_everything() {
        let f = fixture();

        f.beacon.resolve_pds("user.bsky.social", true).await.unwrap();
        f.beacon.clear_cache().await;

        assert!(f.store.inner.is_empty().await);

        f.beacon.resolve_pds("user.bsky.social", true).await.unwrap();
        assert_eq!(f.handles.calls(), 2);
        assert_eq!(f.dids.calls(), 2);
    }

    #[tokio::test]
    async fn test_type_mismatch_is_a_miss() {
        let f = fixture();

        f.store
            .put("did:did:plc:abc123", CacheValue::Text("not a document".into()), 60)
            .await;
        f.store
            .put("handle:user.bsky.social", CacheValue::Document(bob_doc()), 60)
            .await;

        let doc = f.beacon.resolve_did("did:plc:abc123", true).await.unwrap();
        assert_eq!(doc.id, "did:plc:abc123");
        assert_eq!(f.dids.calls(), 1);

        let did = f.beacon.handle_to_did("user.bsky.social", true).await.unwrap();
        assert_eq!(did, "did:plc:abc123");
        assert_eq!(f.handles.calls(), 1);

        // The fresh result replaced the mismatched entry
        let cached = f.store.get("did:did:plc:abc123").await.unwrap();
        assert_eq!(cached.into_document(), Some(alice_doc()));
    }

    #[tokio::test]
    async fn test_ttl_change_applies_to_later_writes() {
        let f = fixture();

        f.beacon.resolve_did("did:plc:abc123", true).await.unwrap();

        let mut settings = f.beacon.cache_settings().await;
        settings.did_ttl = 5;
        f.beacon.set_cache_settings(settings).await;

        f.beacon.resolve_did("did:plc:bob456", true).await.unwrap();

        assert_eq!(
            f.store.puts(),
            vec![
                ("did:did:plc:abc123".to_string(), 100),
                ("did:did:plc:bob456".to_string(), 5),
            ]
        );
    }

    #[tokio::test]
    async fn test_disabled_cache_bypasses_store() {
        let f = fixture();
        f.beacon
            .set_cache_settings(CacheSettings {
                enabled: false,
                ..CacheSettings::default()
            })
            .await;

        f.beacon.resolve_pds("user.bsky.social", true).await.unwrap();
        f.beacon.resolve_pds("user.bsky.social", true).await.unwrap();

        assert_eq!(f.handles.calls(), 2);
        assert_eq!(f.dids.calls(), 2);
        assert!(f.store.puts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_are_resolved_again() {
        let f = fixture();

        f.beacon.handle_to_did("user.bsky.social", true).await.unwrap();
        tokio::time::advance(std::time::Duration::from_secs(199)).await;
        f.beacon.handle_to_did("user.bsky.social", true).await.unwrap();
        assert_eq!(f.handles.calls(), 1);

        tokio::time::advance(std::time::Duration::from_secs(1)).await;
        f.beacon.handle_to_did("user.bsky.social", true).await.unwrap();
        assert_eq!(f.handles.calls(), 2);
    }

    #[tokio::test]
    async fn test_did_to_handle() {
        let f = fixture();

        let handle = f.beacon.did_to_handle("did:plc:abc123", true).await.unwrap();
        assert_eq!(handle.as_deref(), Some("user.bsky.social"));
    }

    #[tokio::test]
    async fn test_from_config_builds_default_wiring() {
        let beacon = Beacon::from_config(&BeaconConfig::default()).await.unwrap();

        assert_eq!(beacon.cache_settings().await, CacheSettings::default());
        let err = beacon.resolve_did("did:web:example.com", true).await.unwrap_err();
        assert!(matches!(err, BeaconError::UnsupportedMethod(m) if m == "web"));

        let err = beacon.resolve_identity("localhost", true).await.unwrap_err();
        assert!(matches!(err, BeaconError::InvalidHandle(_)));
    }
}
