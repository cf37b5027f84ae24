/// Beacon - AT Protocol identity resolution
///
/// Resolves DIDs and handles into DID documents and PDS endpoints, with a
/// per-category cache in front of the network resolvers.

pub mod cache;
pub mod config;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod service;

pub use cache::{CacheSettings, CacheStore, CacheValue, MemoryCacheStore, RedisCacheStore};
pub use config::{BeaconConfig, CacheConfig};
pub use error::{BeaconError, BeaconResult};
pub use identity::{
    is_did, AtProtoHandleResolver, DidDocument, DidResolver, DidResolverManager, HandleResolver,
    PlcDidResolver, Service, ServiceType,
};
pub use service::Beacon;
