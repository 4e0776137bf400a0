//! Wire types shared by the proxy server and its HTTP clients.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Route served by the proxy for telemetry lookups.
pub const PROXY_ROUTE: &str = "/api/proxy/telemetry";

/// Body of a proxy request.
///
/// `firebaseConfig` and `dbPath` are accepted as aliases for dashboards that
/// still send the older field names. A connection config that is not a JSON
/// string is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    #[serde(
        default,
        alias = "firebaseConfig",
        deserialize_with = "string_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub connection_config: Option<String>,
    #[serde(default, alias = "dbPath", skip_serializing_if = "Option::is_none")]
    pub resource_path: Option<String>,
}

impl ProxyRequest {
    pub fn new(resource_path: impl Into<String>) -> Self {
        Self {
            connection_config: None,
            resource_path: Some(resource_path.into()),
        }
    }

    pub fn with_connection_config(mut self, config: impl Into<String>) -> Self {
        self.connection_config = Some(config.into());
        self
    }
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(Some(text)),
        _ => Ok(None),
    }
}

/// Where a proxied payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxySource {
    Cache,
    Upstream,
}

impl ProxySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxySource::Cache => "cache",
            ProxySource::Upstream => "upstream",
        }
    }
}

/// Successful proxy response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyResponse {
    pub data: Value,
    pub source: ProxySource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading: Option<f64>,
}

/// Error body returned with any non-2xx proxy status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyErrorBody {
    pub error: String,
}

/// Cache diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatus {
    pub entries: usize,
}
