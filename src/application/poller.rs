//! Adaptive polling of one sensor on behalf of one dashboard view.
//!
//! A [`PollingController`] is either **Idle** (view hidden or sensor inactive,
//! no requests) or **Polling** (one request on entry, then one per interval).
//! Transitions are driven explicitly by the owner through
//! [`PollingController::set_visible`], [`PollingController::update_sensor`]
//! and [`PollingController::shutdown`]; leaving Polling cancels the loop and
//! every request it still has in flight.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sensor_proxy_api_types::{ProxyRequest, ProxyResponse};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::reading::extract_reading;
use crate::domain::sensor::SensorDescriptor;

use super::proxy::{ProxyError, ProxyService};

const SOURCE: &str = "sensor_proxy::poller";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("proxy rejected the request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("proxy unreachable: {0}")]
    Transport(String),
    #[error("proxy response could not be decoded: {0}")]
    Decode(String),
}

/// Where a controller sends its requests.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn fetch(&self, request: ProxyRequest) -> Result<ProxyResponse, PollError>;
}

/// Lets a controller poll an in-process proxy without going over HTTP.
#[async_trait]
impl TelemetrySource for ProxyService {
    async fn fetch(&self, request: ProxyRequest) -> Result<ProxyResponse, PollError> {
        self.handle(&request)
            .await
            .map(|outcome| outcome.into_response())
            .map_err(|err| match err {
                ProxyError::MissingResourcePath => PollError::Rejected {
                    status: 400,
                    message: err.to_string(),
                },
                ProxyError::Upstream(upstream) => PollError::Rejected {
                    status: 500,
                    message: upstream.to_string(),
                },
            })
    }
}

/// What a view renders for its sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct PollState {
    pub value: f64,
    pub last_updated_at: OffsetDateTime,
    pub connected: bool,
}

impl PollState {
    fn initial() -> Self {
        Self {
            value: 0.0,
            last_updated_at: OffsetDateTime::now_utc(),
            connected: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Idle,
    Polling,
}

struct PollWorker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PollWorker {
    fn stop(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

pub struct PollingController {
    sensor: SensorDescriptor,
    visible: bool,
    interval: Duration,
    source: Arc<dyn TelemetrySource>,
    state: watch::Sender<PollState>,
    worker: Option<PollWorker>,
}

impl PollingController {
    /// Create a controller and enter whichever phase `sensor` and `visible`
    /// call for. Must be called from within a tokio runtime.
    pub fn new(
        sensor: SensorDescriptor,
        visible: bool,
        interval: Duration,
        source: Arc<dyn TelemetrySource>,
    ) -> Self {
        let (state, _) = watch::channel(PollState::initial());
        let mut controller = Self {
            sensor,
            visible,
            interval: if interval.is_zero() {
                DEFAULT_POLL_INTERVAL
            } else {
                interval
            },
            source,
            state,
            worker: None,
        };
        controller.reconcile();
        controller
    }

    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    pub fn phase(&self) -> PollPhase {
        if self.worker.is_some() {
            PollPhase::Polling
        } else {
            PollPhase::Idle
        }
    }

    pub fn sensor(&self) -> &SensorDescriptor {
        &self.sensor
    }

    pub fn set_visible(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;
        self.reconcile();
    }

    /// Apply an edited sensor. A new endpoint or path restarts polling.
    pub fn update_sensor(&mut self, sensor: SensorDescriptor) {
        let restart = self.worker.is_some() && !self.sensor.same_connection(&sensor);
        self.sensor = sensor;
        if restart {
            self.stop();
        }
        self.reconcile();
    }

    /// Tear down the view: stop polling and wait for the loop to exit.
    pub async fn shutdown(mut self) {
        if let Some(worker) = self.worker.take() {
            worker.cancel.cancel();
            // Cancelled loops exit without error; an aborted or panicked one
            // has nothing left to clean up either.
            let _ = worker.handle.await;
        }
    }

    fn reconcile(&mut self) {
        let pollable = self.sensor.status.is_pollable();
        let should_poll = self.visible && pollable;

        match (should_poll, self.worker.is_some()) {
            (true, false) => self.start(),
            (false, true) => self.stop(),
            _ => {}
        }

        if !pollable {
            self.state.send_if_modified(|state| {
                let changed = state.connected;
                state.connected = false;
                changed
            });
        }
    }

    fn start(&mut self) {
        let cancel = CancellationToken::new();
        let request = request_for(&self.sensor);
        info!(
            target = SOURCE,
            sensor_id = %self.sensor.id,
            resource_path = request.resource_path.as_deref().unwrap_or(""),
            interval_ms = self.interval.as_millis() as u64,
            "polling started"
        );

        let handle = tokio::spawn(run_poll_loop(
            self.sensor.id.clone(),
            request,
            self.interval,
            self.source.clone(),
            self.state.clone(),
            cancel.clone(),
        ));
        self.worker = Some(PollWorker { cancel, handle });
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop();
            info!(target = SOURCE, sensor_id = %self.sensor.id, "polling stopped");
        }
    }
}

impl Drop for PollingController {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop();
        }
    }
}

fn request_for(sensor: &SensorDescriptor) -> ProxyRequest {
    let request = ProxyRequest::new(sensor.effective_resource_path());
    match sensor.connection_config.as_deref().map(str::trim) {
        Some(config) if !config.is_empty() => request.with_connection_config(config),
        _ => request,
    }
}

async fn run_poll_loop(
    sensor_id: String,
    request: ProxyRequest,
    interval: Duration,
    source: Arc<dyn TelemetrySource>,
    state: watch::Sender<PollState>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Ticks never wait for earlier requests; each runs as its own task.
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                in_flight.spawn(poll_once(
                    sensor_id.clone(),
                    request.clone(),
                    source.clone(),
                    state.clone(),
                    cancel.clone(),
                ));
            }
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
        }
    }

    // Nothing may write state once the loop has been told to stop.
    in_flight.abort_all();
    while in_flight.join_next().await.is_some() {}
}

async fn poll_once(
    sensor_id: String,
    request: ProxyRequest,
    source: Arc<dyn TelemetrySource>,
    state: watch::Sender<PollState>,
    cancel: CancellationToken,
) {
    let result = source.fetch(request).await;
    if cancel.is_cancelled() {
        return;
    }

    match result {
        Ok(response) => {
            // An absent reading is shown as zero, same as a genuine zero.
            let value = extract_reading(&response.data).unwrap_or(0.0);
            state.send_modify(|state| {
                state.value = value;
                state.last_updated_at = OffsetDateTime::now_utc();
                state.connected = true;
            });
            debug!(
                target = SOURCE,
                sensor_id = %sensor_id,
                value,
                source = response.source.as_str(),
                "poll succeeded"
            );
        }
        Err(err) => {
            warn!(target = SOURCE, sensor_id = %sensor_id, error = %err, "poll failed");
        }
    }
}
