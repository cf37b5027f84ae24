/// Identity Resolution System
///
/// Classifies actor strings, models DID documents, and resolves DIDs and
/// handles through pluggable resolvers.

pub mod did_doc;
pub mod handle;
pub mod plc;
pub mod resolver;

pub use did_doc::{DidDocument, Service, ServiceType};
pub use handle::AtProtoHandleResolver;
pub use plc::PlcDidResolver;
pub use resolver::{DidResolver, DidResolverManager, HandleResolver};

use crate::error::{BeaconError, BeaconResult};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use std::time::Duration;

/// Prefix shared by every DID
pub const DID_PREFIX: &str = "did:";

lazy_static! {
    /// Domain-name-like handle: dotted labels, alphabetic final label of length >= 2
    static ref HANDLE_PATTERN: Regex = Regex::new(r"^[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("handle pattern is a valid regex");
}

/// Returns true if the actor is a DID rather than a handle
pub fn is_did(actor: &str) -> bool {
    actor.starts_with(DID_PREFIX)
}

/// Extract the method of a DID (`did:plc:abc` -> `plc`)
///
/// Returns `None` when the string is not a DID or has no second colon.
pub fn extract_method(did: &str) -> Option<&str> {
    let mut parts = did.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("did"), Some(method), Some(_)) if !method.is_empty() => Some(method),
        _ => None,
    }
}

/// Check a handle against the domain-name pattern
pub fn is_valid_handle(handle: &str) -> bool {
    HANDLE_PATTERN.is_match(handle)
}

/// Build the JSON HTTP client shared by the network resolvers
pub(crate) fn build_http_client(timeout: Duration, user_agent: &str) -> BeaconResult<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| BeaconError::Config(format!("Failed to create HTTP client: {}", e)))
}
