//! Polls a running proxy over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use sensor_proxy_api_types::{PROXY_ROUTE, ProxyErrorBody, ProxyRequest, ProxyResponse};

use crate::application::poller::{PollError, TelemetrySource};

use super::error::InfraError;
use super::upstream::user_agent;

#[derive(Clone, Debug)]
pub struct HttpProxyClient {
    client: Client,
    endpoint: Url,
}

impl HttpProxyClient {
    pub fn new(proxy_url: &str, timeout: Duration) -> Result<Self, InfraError> {
        let endpoint = Url::parse(proxy_url)
            .and_then(|base| base.join(PROXY_ROUTE))
            .map_err(|err| InfraError::configuration(format!("invalid proxy url: {err}")))?;
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl TelemetrySource for HttpProxyClient {
    async fn fetch(&self, request: ProxyRequest) -> Result<ProxyResponse, PollError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|err| PollError::Transport(err.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| PollError::Transport(err.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ProxyErrorBody>(&bytes)
                .map(|body| body.error)
                .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
            return Err(PollError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_slice(&bytes).map_err(|err| PollError::Decode(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use sensor_proxy_api_types::ProxySource;
    use serde_json::json;

    use super::*;

    fn client(server: &MockServer) -> HttpProxyClient {
        HttpProxyClient::new(&server.base_url(), Duration::from_secs(5)).expect("client builds")
    }

    #[test]
    fn endpoint_joins_the_proxy_route() {
        let client = HttpProxyClient::new("http://127.0.0.1:3000", Duration::from_secs(1))
            .expect("client builds");
        assert_eq!(
            client.endpoint().as_str(),
            "http://127.0.0.1:3000/api/proxy/telemetry"
        );
    }

    #[test]
    fn invalid_proxy_url_is_a_configuration_error() {
        let err = HttpProxyClient::new("not a url", Duration::from_secs(1)).expect_err("invalid");
        assert!(matches!(err, InfraError::Configuration { .. }));
    }

    #[tokio::test]
    async fn posts_the_request_and_decodes_the_response() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(PROXY_ROUTE)
                    .json_body(json!({ "resourcePath": "SPD-01/live/speed" }));
                then.status(200).json_body(json!({
                    "data": { "speed": 42 },
                    "source": "cache",
                    "reading": 42.0
                }));
            })
            .await;

        let response = client(&server)
            .fetch(ProxyRequest::new("SPD-01/live/speed"))
            .await
            .expect("fetch succeeds");

        mock.assert_async().await;
        assert_eq!(response.source, ProxySource::Cache);
        assert_eq!(response.data, json!({ "speed": 42 }));
    }

    #[tokio::test]
    async fn error_body_becomes_rejection() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(PROXY_ROUTE);
                then.status(400)
                    .json_body(json!({ "error": "missing resource path" }));
            })
            .await;

        let err = client(&server)
            .fetch(ProxyRequest::new("x"))
            .await
            .expect_err("rejected");
        assert_eq!(
            err,
            PollError::Rejected {
                status: 400,
                message: "missing resource path".into()
            }
        );
    }
}
