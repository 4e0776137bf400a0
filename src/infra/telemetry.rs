use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "sensor_proxy_cache_hit_total",
            Unit::Count,
            "Proxy requests answered from the payload cache."
        );
        describe_counter!(
            "sensor_proxy_cache_miss_total",
            Unit::Count,
            "Proxy requests that found no live cache entry."
        );
        describe_counter!(
            "sensor_proxy_cache_expired_total",
            Unit::Count,
            "Cache entries found expired on read."
        );
        describe_counter!(
            "sensor_proxy_upstream_fetch_total",
            Unit::Count,
            "Upstream fetches issued on cache misses."
        );
        describe_counter!(
            "sensor_proxy_upstream_error_total",
            Unit::Count,
            "Upstream fetches that failed."
        );
        describe_counter!(
            "sensor_proxy_config_fallback_total",
            Unit::Count,
            "Requests routed to the default endpoint, labelled by reason."
        );
        describe_histogram!(
            "sensor_proxy_upstream_fetch_ms",
            Unit::Milliseconds,
            "Upstream fetch latency in milliseconds."
        );
    });
}
