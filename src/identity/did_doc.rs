/// DID document model
///
/// Only the fields identity resolution needs are kept: the subject DID, its
/// aliases, and its service endpoints. Everything else in the raw document
/// is ignored.
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Service type advertised by a Personal Data Server
pub const PDS_SERVICE_TYPE: &str = "AtprotoPersonalDataServer";

/// Scheme prefix of handle aliases in `alsoKnownAs`
pub const AT_URI_PREFIX: &str = "at://";

/// Resolved DID document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub also_known_as: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub service: Vec<Service>,
}

/// Service endpoint descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub service_type: ServiceType,
    /// Usually a URL string; the DID core model also allows maps and sets
    #[serde(default)]
    pub service_endpoint: Value,
}

/// Service `type`: a single string or a set of strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceType {
    One(String),
    Many(Vec<String>),
}

impl Default for ServiceType {
    fn default() -> Self {
        ServiceType::One(String::new())
    }
}

impl ServiceType {
    pub fn contains(&self, service_type: &str) -> bool {
        match self {
            ServiceType::One(t) => t == service_type,
            ServiceType::Many(types) => types.iter().any(|t| t == service_type),
        }
    }
}

impl From<&str> for ServiceType {
    fn from(service_type: &str) -> Self {
        ServiceType::One(service_type.to_string())
    }
}

/// Treat an explicit `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl DidDocument {
    /// Parse a document from raw resolver output
    ///
    /// `id` is required; `alsoKnownAs` and `service` default to empty when
    /// missing or null.
    pub fn from_value(raw: Value) -> Result<Self, serde_json::Error> {
        if !raw.is_object() {
            return Err(serde_json::Error::custom("DID document must be a JSON object"));
        }
        serde_json::from_value(raw)
    }

    /// Parse a document from a JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Endpoint URL of the identity's Personal Data Server, if advertised
    pub fn pds_endpoint(&self) -> Option<&str> {
        self.service
            .iter()
            .filter(|service| service.service_type.contains(PDS_SERVICE_TYPE))
            .find_map(|service| service.service_endpoint.as_str())
    }

    /// Primary handle, taken from the first `at://` alias
    pub fn handle(&self) -> Option<&str> {
        self.also_known_as
            .iter()
            .find_map(|aka| aka.strip_prefix(AT_URI_PREFIX))
    }
}
