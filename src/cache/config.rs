//! Cache configuration.
//!
//! Controls entry lifetime and the optional background sweep via the
//! `[cache]` table of `sensor-proxy.toml`.

use std::time::Duration;

const DEFAULT_TTL_SECS: u64 = 5;

/// Runtime cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Lifetime of a stored upstream payload.
    pub ttl: Duration,
    /// Period of the expired-entry sweep; `None` keeps removal lazy.
    pub sweep_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            sweep_interval: None,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            ttl: settings.ttl,
            sweep_interval: settings.sweep_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(5));
        assert_eq!(config.sweep_interval, None);
    }
}
