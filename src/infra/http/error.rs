use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sensor_proxy_api_types::ProxyErrorBody;

use crate::application::error::ErrorReport;
use crate::application::proxy::ProxyError;

/// `{ "error": ... }` response for the proxy routes.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    report: ErrorReport,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ProxyError> for ApiError {
    fn from(error: ProxyError) -> Self {
        const SOURCE: &str = "infra::http::proxy_error_to_api_error";
        let status = match error {
            ProxyError::MissingResourcePath => StatusCode::BAD_REQUEST,
            ProxyError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: error.to_string(),
            report: ErrorReport::from_error(SOURCE, status, &error),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        const SOURCE: &str = "infra::http::json_rejection";
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "request body is not valid JSON".to_string(),
            report: ErrorReport::from_error(SOURCE, StatusCode::BAD_REQUEST, &rejection),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ProxyErrorBody {
            error: self.message,
        };
        let mut response = (self.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}
