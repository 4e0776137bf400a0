use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sensor_proxy_api_types::{CacheStatus, ProxyRequest, ProxyResponse};

use super::{AppState, error::ApiError};

pub(super) async fn proxy_telemetry(
    State(state): State<AppState>,
    body: Result<Json<ProxyRequest>, JsonRejection>,
) -> Result<Json<ProxyResponse>, ApiError> {
    let Json(request) = body?;
    let outcome = state.proxy.handle(&request).await?;
    Ok(Json(outcome.into_response()))
}

pub(super) async fn cache_status(State(state): State<AppState>) -> Json<CacheStatus> {
    Json(CacheStatus {
        entries: state.proxy.cache().len(),
    })
}

pub(super) async fn health() -> Response {
    StatusCode::NO_CONTENT.into_response()
}
