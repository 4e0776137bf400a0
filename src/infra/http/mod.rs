mod error;
mod middleware;
mod proxy;

pub use error::ApiError;
pub use middleware::{REQUEST_ID_HEADER, RequestContext};

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use sensor_proxy_api_types::PROXY_ROUTE;

use crate::application::proxy::ProxyService;

use middleware::{log_responses, set_request_context};

pub const HEALTH_ROUTE: &str = "/healthz";
pub const CACHE_STATUS_ROUTE: &str = "/api/proxy/cache";

#[derive(Clone)]
pub struct AppState {
    pub proxy: Arc<ProxyService>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(PROXY_ROUTE, post(proxy::proxy_telemetry))
        .route(CACHE_STATUS_ROUTE, get(proxy::cache_status))
        .route(HEALTH_ROUTE, get(proxy::health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
