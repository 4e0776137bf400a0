//! Port for the remote telemetry endpoint.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("upstream responded {status} {reason}")]
    Status { status: u16, reason: String },
    #[error("upstream request failed: {0}")]
    Transport(String),
    #[error("upstream payload could not be decoded: {0}")]
    Decode(String),
}

impl UpstreamError {
    pub fn status(status: u16, reason: impl Into<String>) -> Self {
        Self::Status {
            status,
            reason: reason.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}

/// Fetches one raw payload per call. Implementations must not retry.
#[async_trait]
pub trait TelemetryUpstream: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Value, UpstreamError>;
}
