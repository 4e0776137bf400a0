use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sensor_proxy::application::poller::{PollPhase, PollingController};
use sensor_proxy::application::proxy::{ProxyConfig, ProxyService};
use sensor_proxy::application::upstream::{TelemetryUpstream, UpstreamError};
use sensor_proxy::cache::{CacheConfig, TtlCache};
use sensor_proxy::domain::sensor::{SensorDescriptor, SensorStatus};
use serde_json::{Value, json};

const INTERVAL: Duration = Duration::from_secs(5);

struct SackCounter {
    calls: AtomicUsize,
}

impl SackCounter {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelemetryUpstream for SackCounter {
    async fn fetch(&self, _url: &str) -> Result<Value, UpstreamError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!({ "line": { "sacks": call * 10 } }))
    }
}

fn proxy(upstream: Arc<SackCounter>, ttl: Duration) -> Arc<ProxyService> {
    let cache_config = CacheConfig {
        ttl,
        sweep_interval: None,
    };
    Arc::new(ProxyService::new(
        Arc::new(TtlCache::new()),
        upstream,
        ProxyConfig::new("https://default.example", &cache_config),
    ))
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn viewers_of_one_sensor_share_upstream_fetches() {
    let upstream = Arc::new(SackCounter {
        calls: AtomicUsize::new(0),
    });
    let proxy = proxy(upstream.clone(), Duration::from_secs(5));
    let sensor = SensorDescriptor::new("SCK-01");

    let first = PollingController::new(sensor.clone(), true, INTERVAL, proxy.clone());
    let second = PollingController::new(sensor, true, INTERVAL, proxy.clone());
    settle().await;

    assert_eq!(upstream.calls(), 1);
    assert_eq!(first.state().value, 10.0);
    assert_eq!(second.state().value, 10.0);
    assert!(first.state().connected && second.state().connected);

    first.shutdown().await;
    second.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn readings_refresh_once_the_cache_expires() {
    let upstream = Arc::new(SackCounter {
        calls: AtomicUsize::new(0),
    });
    let proxy = proxy(upstream.clone(), Duration::from_secs(3));
    let controller =
        PollingController::new(SensorDescriptor::new("SCK-02"), true, INTERVAL, proxy);
    settle().await;
    assert_eq!(controller.state().value, 10.0);

    tokio::time::sleep(INTERVAL).await;
    assert_eq!(upstream.calls(), 2);
    assert_eq!(controller.state().value, 20.0);

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn hiding_and_tearing_down_stop_all_traffic() {
    let upstream = Arc::new(SackCounter {
        calls: AtomicUsize::new(0),
    });
    let proxy = proxy(upstream.clone(), Duration::from_millis(100));
    let mut controller =
        PollingController::new(SensorDescriptor::new("SCK-03"), true, INTERVAL, proxy);
    settle().await;
    assert_eq!(upstream.calls(), 1);

    controller.set_visible(false);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(upstream.calls(), 1);

    controller.set_visible(true);
    settle().await;
    assert_eq!(upstream.calls(), 2);

    controller.shutdown().await;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(upstream.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn maintenance_sensors_keep_polling_but_inactive_ones_do_not() {
    let upstream = Arc::new(SackCounter {
        calls: AtomicUsize::new(0),
    });
    let proxy = proxy(upstream.clone(), Duration::from_millis(100));

    let maintenance = SensorDescriptor::new("SCK-04").with_status(SensorStatus::Maintenance);
    let inactive = SensorDescriptor::new("SCK-05").with_status(SensorStatus::Inactive);

    let polled = PollingController::new(maintenance, true, INTERVAL, proxy.clone());
    let idle = PollingController::new(inactive, true, INTERVAL, proxy);
    settle().await;

    assert_eq!(polled.phase(), PollPhase::Polling);
    assert_eq!(idle.phase(), PollPhase::Idle);
    assert_eq!(upstream.calls(), 1);
    assert!(!idle.state().connected);
}
