//! Upstream payload cache.
//!
//! Every dashboard view polls the proxy on its own schedule, so the same
//! sensor resource is requested many times per second across viewers. The
//! cache holds each upstream payload for a short TTL so those requests collapse
//! into one upstream call per window.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! ttl_seconds = 5
//! sweep_interval_seconds = 0 # lazy removal only
//! ```

mod config;
mod keys;
mod store;

pub use config::CacheConfig;
pub use keys::{CacheKey, normalize_endpoint, normalize_resource_path};
pub use store::{TtlCache, spawn_sweeper};
