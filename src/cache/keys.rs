//! Cache key derivation.
//!
//! A key names one upstream resource: the endpoint with trailing slashes
//! removed, joined to the resource path with its surrounding slashes removed.
//! Formatting differences in either half collapse to the same key.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build the key for `resource_path` on `endpoint`.
    pub fn for_resource(endpoint: &str, resource_path: &str) -> Self {
        Self(format!(
            "{}/{}",
            normalize_endpoint(endpoint),
            normalize_resource_path(resource_path)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Upstream URL for this key with the given data-format suffix.
    pub fn upstream_url(&self, format_suffix: &str) -> String {
        let suffix = format_suffix.trim_start_matches('.');
        if suffix.is_empty() {
            self.0.clone()
        } else {
            format!("{}.{suffix}", self.0)
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn normalize_endpoint(endpoint: &str) -> &str {
    endpoint.trim().trim_end_matches('/')
}

pub fn normalize_resource_path(path: &str) -> &str {
    path.trim().trim_matches('/')
}
