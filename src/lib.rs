//! Caching telemetry proxy and adaptive polling client for sensor dashboards.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
