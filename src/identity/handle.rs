/// Handle resolution through a PDS's `com.atproto.identity.resolveHandle`
use crate::{
    config::BeaconConfig,
    error::{BeaconError, BeaconResult},
    identity::{build_http_client, is_valid_handle, HandleResolver},
};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// XRPC method used for handle lookups
pub const RESOLVE_HANDLE_PATH: &str = "/xrpc/com.atproto.identity.resolveHandle";

/// Resolves handles by asking a PDS
#[derive(Clone)]
pub struct AtProtoHandleResolver {
    http_client: reqwest::Client,
    pds_endpoint: String,
}

impl AtProtoHandleResolver {
    /// Create a resolver that queries the given PDS
    pub fn new(pds_endpoint: &str, timeout: Duration, user_agent: &str) -> BeaconResult<Self> {
        Ok(Self {
            http_client: build_http_client(timeout, user_agent)?,
            pds_endpoint: pds_endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &BeaconConfig) -> BeaconResult<Self> {
        Self::new(&config.pds_endpoint, config.timeout(), &config.user_agent)
    }

    /// Full lookup URL for a handle
    pub fn resolve_url(&self, handle: &str) -> String {
        format!(
            "{}{}?handle={}",
            self.pds_endpoint,
            RESOLVE_HANDLE_PATH,
            urlencoding::encode(handle)
        )
    }
}

#[async_trait]
impl HandleResolver for AtProtoHandleResolver {
    async fn resolve(&self, handle: &str) -> BeaconResult<String> {
        if !is_valid_handle(handle) {
            return Err(BeaconError::InvalidHandle(handle.to_string()));
        }

        let url = self.resolve_url(handle);
        debug!("Resolving handle via {}", url);

        let response = self.http_client.get(&url).send().await.map_err(|e| {
            warn!("Handle request for {} failed: {}", handle, e);
            BeaconError::handle_failed(handle, e.to_string())
        })?;

        if !response.status().is_success() {
            return Err(BeaconError::handle_failed(
                handle,
                format!("PDS returned error: {}", response.status()),
            ));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| BeaconError::handle_failed(handle, format!("Invalid response: {}", e)))?;

        data.get("did")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| BeaconError::handle_failed(handle, "No DID in response"))
    }
}
