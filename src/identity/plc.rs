/// did:plc resolution against a PLC directory
use crate::{
    config::BeaconConfig,
    error::{BeaconError, BeaconResult},
    identity::{build_http_client, extract_method, DidDocument, DidResolver},
};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Resolves `did:plc` identifiers via `GET {directory}/{did}`
#[derive(Clone)]
pub struct PlcDidResolver {
    http_client: reqwest::Client,
    plc_directory: String,
}

impl PlcDidResolver {
    /// Create a resolver for the given directory
    pub fn new(plc_directory: &str, timeout: Duration, user_agent: &str) -> BeaconResult<Self> {
        Ok(Self {
            http_client: build_http_client(timeout, user_agent)?,
            plc_directory: plc_directory.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &BeaconConfig) -> BeaconResult<Self> {
        Self::new(&config.plc_directory, config.timeout(), &config.user_agent)
    }

    pub fn plc_directory(&self) -> &str {
        &self.plc_directory
    }
}

#[async_trait]
impl DidResolver for PlcDidResolver {
    async fn resolve(&self, did: &str) -> BeaconResult<DidDocument> {
        let method = extract_method(did).ok_or_else(|| BeaconError::InvalidDid(did.to_string()))?;
        if !self.supports(method) {
            return Err(BeaconError::UnsupportedMethod(method.to_string()));
        }

        let url = format!("{}/{}", self.plc_directory, did);
        debug!("Fetching PLC document: {}", url);

        let response = self.http_client.get(&url).send().await.map_err(|e| {
            warn!("PLC request for {} failed: {}", did, e);
            BeaconError::did_failed(did, e.to_string())
        })?;

        if !response.status().is_success() {
            return Err(BeaconError::did_failed(
                did,
                format!("PLC directory returned error: {}", response.status()),
            ));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| BeaconError::did_failed(did, format!("Invalid PLC response: {}", e)))?;

        if !data.is_object() {
            return Err(BeaconError::did_failed(did, "Invalid response format"));
        }

        DidDocument::from_value(data)
            .map_err(|e| BeaconError::did_failed(did, format!("Invalid DID document: {}", e)))
    }

    fn supports(&self, method: &str) -> bool {
        method == "plc"
    }
}
