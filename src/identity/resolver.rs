/// Resolver traits and the method-dispatching DID resolver
use crate::{
    config::BeaconConfig,
    error::{BeaconError, BeaconResult},
    identity::{extract_method, DidDocument, PlcDidResolver},
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Resolves a DID to its document
#[async_trait]
pub trait DidResolver: Send + Sync {
    /// Resolve a DID (e.g. `did:plc:abc123`) to a DID document
    async fn resolve(&self, did: &str) -> BeaconResult<DidDocument>;

    /// Whether this resolver handles the given DID method (e.g. `plc`)
    fn supports(&self, method: &str) -> bool;
}

/// Resolves a handle to a DID
#[async_trait]
pub trait HandleResolver: Send + Sync {
    /// Resolve a handle (e.g. `user.bsky.social`) to a DID string
    async fn resolve(&self, handle: &str) -> BeaconResult<String>;
}

/// Routes DIDs to the resolver registered for their method
///
/// Entries are checked in registration order. Registration rejects a method
/// that is already served, so the first match is also the only match.
#[derive(Default, Clone)]
pub struct DidResolverManager {
    resolvers: Vec<(String, Arc<dyn DidResolver>)>,
}

impl DidResolverManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager with the built-in `plc` resolver
    pub fn with_defaults(config: &BeaconConfig) -> BeaconResult<Self> {
        let mut manager = Self::new();
        manager.register("plc", Arc::new(PlcDidResolver::from_config(config)?))?;
        Ok(manager)
    }

    /// Register a resolver for a DID method
    pub fn register(&mut self, method: &str, resolver: Arc<dyn DidResolver>) -> BeaconResult<()> {
        if !resolver.supports(method) {
            return Err(BeaconError::UnsupportedMethod(method.to_string()));
        }

        let taken = self
            .resolvers
            .iter()
            .any(|(name, existing)| name == method || existing.supports(method));
        if taken {
            return Err(BeaconError::DuplicateMethod(method.to_string()));
        }

        debug!("Registered DID resolver for method {}", method);
        self.resolvers.push((method.to_string(), resolver));
        Ok(())
    }

    /// Builder-style variant of [`register`](Self::register)
    pub fn with_resolver(mut self, method: &str, resolver: Arc<dyn DidResolver>) -> BeaconResult<Self> {
        self.register(method, resolver)?;
        Ok(self)
    }

    /// Registered method names, in dispatch order
    pub fn methods(&self) -> Vec<&str> {
        self.resolvers.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn resolver_for(&self, method: &str) -> Option<&Arc<dyn DidResolver>> {
        self.resolvers
            .iter()
            .find(|(_, resolver)| resolver.supports(method))
            .map(|(_, resolver)| resolver)
    }
}

#[async_trait]
impl DidResolver for DidResolverManager {
    async fn resolve(&self, did: &str) -> BeaconResult<DidDocument> {
        let method = extract_method(did).ok_or_else(|| BeaconError::InvalidDid(did.to_string()))?;

        let resolver = self
            .resolver_for(method)
            .ok_or_else(|| BeaconError::UnsupportedMethod(method.to_string()))?;

        resolver.resolve(did).await
    }

    fn supports(&self, method: &str) -> bool {
        self.resolver_for(method).is_some()
    }
}
