//! Upstream payload storage with per-entry expiry.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use metrics::counter;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::keys::CacheKey;

const METRIC_CACHE_HIT: &str = "sensor_proxy_cache_hit_total";
const METRIC_CACHE_MISS: &str = "sensor_proxy_cache_miss_total";
const METRIC_CACHE_EXPIRED: &str = "sensor_proxy_cache_expired_total";

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now <= self.expires_at
    }
}

/// Process-local payload cache keyed by upstream resource.
///
/// Entries are only ever replaced wholesale. An expired entry is removed by the
/// first read that notices it, or by [`TtlCache::purge_expired`].
#[derive(Debug, Default)]
pub struct TtlCache {
    entries: DashMap<CacheKey, CacheEntry>,
}

impl TtlCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the stored payload if it has not expired.
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        let now = Instant::now();
        let fresh = match self.entries.get(key) {
            None => {
                counter!(METRIC_CACHE_MISS).increment(1);
                return None;
            }
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => None,
        };

        if fresh.is_some() {
            counter!(METRIC_CACHE_HIT).increment(1);
            return fresh;
        }

        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        counter!(METRIC_CACHE_EXPIRED).increment(1);
        counter!(METRIC_CACHE_MISS).increment(1);
        None
    }

    /// Store `value` under `key` for `ttl`, replacing any previous entry.
    pub fn set(&self, key: CacheKey, value: Value, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.insert(key, entry);
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Periodically purge expired entries until `shutdown` fires.
pub fn spawn_sweeper(
    cache: Arc<TtlCache>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await; // Skip the first immediate tick
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let removed = cache.purge_expired();
                    if removed > 0 {
                        debug!(
                            target = "sensor_proxy::cache",
                            removed,
                            remaining = cache.len(),
                            "purged expired cache entries"
                        );
                    }
                }
            }
        }
    })
}
