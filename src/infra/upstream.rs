//! reqwest-backed upstream fetcher.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::application::upstream::{TelemetryUpstream, UpstreamError};

use super::error::InfraError;

pub fn user_agent() -> &'static str {
    concat!("sensor-proxy/", env!("CARGO_PKG_VERSION"))
}

#[derive(Clone, Debug)]
pub struct HttpUpstream {
    client: Client,
}

impl HttpUpstream {
    pub fn new(timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TelemetryUpstream for HttpUpstream {
    async fn fetch(&self, url: &str) -> Result<Value, UpstreamError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| UpstreamError::transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::status(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status"),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| UpstreamError::transport(err.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|err| UpstreamError::decode(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn upstream() -> HttpUpstream {
        HttpUpstream::new(Duration::from_secs(5)).expect("client builds")
    }

    #[tokio::test]
    async fn success_returns_decoded_payload() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/line1/speed.json");
                then.status(200).json_body(json!({ "speed": 12.5 }));
            })
            .await;

        let value = upstream()
            .fetch(&server.url("/line1/speed.json"))
            .await
            .expect("fetch succeeds");

        assert_eq!(value, json!({ "speed": 12.5 }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn literal_null_is_a_valid_payload() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/empty.json");
                then.status(200).body("null");
            })
            .await;

        let value = upstream()
            .fetch(&server.url("/empty.json"))
            .await
            .expect("fetch succeeds");
        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn non_success_status_maps_to_status_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/denied.json");
                then.status(401).body("Permission denied");
            })
            .await;

        let err = upstream()
            .fetch(&server.url("/denied.json"))
            .await
            .expect_err("fetch fails");
        assert_eq!(err, UpstreamError::status(401, "Unauthorized"));
        assert_eq!(err.to_string(), "upstream responded 401 Unauthorized");
    }

    #[tokio::test]
    async fn non_json_body_maps_to_decode_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/html.json");
                then.status(200).body("<html>maintenance</html>");
            })
            .await;

        let err = upstream()
            .fetch(&server.url("/html.json"))
            .await
            .expect_err("fetch fails");
        assert!(matches!(err, UpstreamError::Decode(_)));
    }

    #[tokio::test]
    async fn unreachable_host_maps_to_transport_error() {
        let err = upstream()
            .fetch("http://127.0.0.1:9/unreachable.json")
            .await
            .expect_err("fetch fails");
        assert!(matches!(err, UpstreamError::Transport(_)));
    }
}
