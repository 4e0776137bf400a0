//! Telemetry proxy: resolve the connection, serve from cache, or fetch once.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use sensor_proxy_api_types::{ProxyRequest, ProxyResponse, ProxySource};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheConfig, CacheKey, TtlCache};
use crate::domain::connection::{ConnectionDescriptor, EndpointSource, FallbackReason};
use crate::domain::reading::extract_reading;

use super::upstream::{TelemetryUpstream, UpstreamError};

const SOURCE: &str = "sensor_proxy::proxy";

const METRIC_UPSTREAM_FETCH: &str = "sensor_proxy_upstream_fetch_total";
const METRIC_UPSTREAM_ERROR: &str = "sensor_proxy_upstream_error_total";
const METRIC_UPSTREAM_FETCH_MS: &str = "sensor_proxy_upstream_fetch_ms";
const METRIC_CONFIG_FALLBACK: &str = "sensor_proxy_config_fallback_total";

/// Static inputs of the proxy.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Endpoint used whenever a request carries no usable config.
    pub default_endpoint: String,
    /// Data-format extension appended to every upstream path.
    pub format_suffix: String,
    pub cache_ttl: Duration,
}

impl ProxyConfig {
    pub fn new(default_endpoint: impl Into<String>, cache: &CacheConfig) -> Self {
        Self {
            default_endpoint: default_endpoint.into(),
            format_suffix: "json".to_string(),
            cache_ttl: cache.ttl,
        }
    }

    pub fn with_format_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.format_suffix = suffix.into();
        self
    }
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("missing resource path")]
    MissingResourcePath,
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// A payload served for one proxy request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyOutcome {
    pub key: CacheKey,
    pub payload: Value,
    pub source: ProxySource,
}

impl ProxyOutcome {
    /// Extracted on every call; readings are never cached.
    pub fn reading(&self) -> Option<f64> {
        extract_reading(&self.payload)
    }

    pub fn into_response(self) -> ProxyResponse {
        let reading = self.reading();
        ProxyResponse {
            data: self.payload,
            source: self.source,
            reading,
        }
    }
}

pub struct ProxyService {
    cache: Arc<TtlCache>,
    upstream: Arc<dyn TelemetryUpstream>,
    config: ProxyConfig,
}

impl ProxyService {
    pub fn new(
        cache: Arc<TtlCache>,
        upstream: Arc<dyn TelemetryUpstream>,
        config: ProxyConfig,
    ) -> Self {
        Self {
            cache,
            upstream,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<TtlCache> {
        &self.cache
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Serve `request` from the cache, or fetch it upstream on a miss.
    ///
    /// Concurrent misses for one key may each fetch; the last write wins.
    #[instrument(
        skip(self, request),
        fields(resource_path = request.resource_path.as_deref().unwrap_or(""))
    )]
    pub async fn handle(&self, request: &ProxyRequest) -> Result<ProxyOutcome, ProxyError> {
        let resource_path = request
            .resource_path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .ok_or(ProxyError::MissingResourcePath)?;

        let descriptor = ConnectionDescriptor::resolve(
            request.connection_config.as_deref(),
            resource_path,
            &self.config.default_endpoint,
        );
        record_endpoint_source(&descriptor);

        let key = CacheKey::for_resource(&descriptor.endpoint_url, &descriptor.resource_path);

        if let Some(payload) = self.cache.get(&key) {
            debug!(target = SOURCE, key = %key, "served from cache");
            return Ok(ProxyOutcome {
                key,
                payload,
                source: ProxySource::Cache,
            });
        }

        let url = key.upstream_url(&self.config.format_suffix);
        let payload = self.fetch_upstream(&url).await?;

        self.cache
            .set(key.clone(), payload.clone(), self.config.cache_ttl);

        Ok(ProxyOutcome {
            key,
            payload,
            source: ProxySource::Upstream,
        })
    }

    async fn fetch_upstream(&self, url: &str) -> Result<Value, UpstreamError> {
        let started_at = Instant::now();
        counter!(METRIC_UPSTREAM_FETCH).increment(1);

        let result = self.upstream.fetch(url).await;
        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        histogram!(METRIC_UPSTREAM_FETCH_MS).record(elapsed_ms);

        match &result {
            Ok(_) => info!(target = SOURCE, url, elapsed_ms, "upstream fetch succeeded"),
            Err(err) => {
                counter!(METRIC_UPSTREAM_ERROR).increment(1);
                warn!(target = SOURCE, url, elapsed_ms, error = %err, "upstream fetch failed");
            }
        }

        result
    }
}

fn record_endpoint_source(descriptor: &ConnectionDescriptor) {
    match &descriptor.source {
        EndpointSource::CustomConfig => {
            debug!(
                target = SOURCE,
                endpoint = %descriptor.endpoint_url,
                endpoint_source = descriptor.source.as_str(),
                "resolved endpoint"
            );
        }
        EndpointSource::DefaultFallback(reason) => {
            counter!(METRIC_CONFIG_FALLBACK, "reason" => reason.as_str()).increment(1);
            match reason {
                FallbackReason::Unparsable(err) => warn!(
                    target = SOURCE,
                    endpoint = %descriptor.endpoint_url,
                    reason = reason.as_str(),
                    error = %err,
                    "connection config unusable, using default endpoint"
                ),
                FallbackReason::MissingDatabaseUrl => warn!(
                    target = SOURCE,
                    endpoint = %descriptor.endpoint_url,
                    reason = reason.as_str(),
                    "connection config has no database URL, using default endpoint"
                ),
                FallbackReason::NoConfig => debug!(
                    target = SOURCE,
                    endpoint = %descriptor.endpoint_url,
                    reason = reason.as_str(),
                    "no connection config, using default endpoint"
                ),
            }
        }
    }
}
