//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod http;
pub mod proxy_client;
pub mod telemetry;
pub mod upstream;
