/// Unified error types for Beacon
use thiserror::Error;

/// Main error type for identity resolution
#[derive(Error, Debug)]
pub enum BeaconError {
    /// Handle does not look like a domain name
    #[error("Invalid handle format: {0}")]
    InvalidHandle(String),

    /// DID string has no method segment
    #[error("Invalid DID: {0}")]
    InvalidDid(String),

    /// No registered resolver serves this DID method
    #[error("Unsupported DID method: {0}")]
    UnsupportedMethod(String),

    /// A resolver for this method is already registered
    #[error("DID method already registered: {0}")]
    DuplicateMethod(String),

    /// DID resolution errors
    #[error("Failed to resolve DID {did}: {reason}")]
    DidResolutionFailed { did: String, reason: String },

    /// Handle resolution errors
    #[error("Failed to resolve handle {handle}: {reason}")]
    HandleResolutionFailed { handle: String, reason: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cache backend errors
    #[error("Cache error: {0}")]
    Cache(String),
}

impl BeaconError {
    pub(crate) fn did_failed(did: &str, reason: impl Into<String>) -> Self {
        BeaconError::DidResolutionFailed {
            did: did.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn handle_failed(handle: &str, reason: impl Into<String>) -> Self {
        BeaconError::HandleResolutionFailed {
            handle: handle.to_string(),
            reason: reason.into(),
        }
    }

    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            BeaconError::InvalidHandle(_) => "invalid_handle",
            BeaconError::InvalidDid(_) => "invalid_did",
            BeaconError::UnsupportedMethod(_) => "unsupported_method",
            BeaconError::DuplicateMethod(_) => "duplicate_method",
            BeaconError::DidResolutionFailed { .. } => "did_resolution_failed",
            BeaconError::HandleResolutionFailed { .. } => "handle_resolution_failed",
            BeaconError::Config(_) => "config",
            BeaconError::Cache(_) => "cache",
        }
    }
}

/// Result type alias for Beacon operations
pub type BeaconResult<T> = Result<T, BeaconError>;
