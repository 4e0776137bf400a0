//! Application services: the telemetry proxy and the polling controller.

pub mod error;
pub mod poller;
pub mod proxy;
pub mod upstream;
