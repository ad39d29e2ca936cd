//! Observability hooks for cache operations.
//!
//! The engine reports every read outcome and every fetch completion through
//! [`CacheMetrics`]. The default implementation logs via the `log` crate;
//! [`NoOpMetrics`] silences everything. Implement the trait to wire the
//! engine into your monitoring system.

use std::time::Duration;

/// Trait for cache metrics collection.
///
/// Default method bodies log at debug/warn level, so an implementation only
/// needs to override what it cares about.
pub trait CacheMetrics: Send + Sync {
    /// A read was served from a fresh cached entry, no fetch scheduled.
    fn record_hit(&self, key: &str) {
        debug!("✓ {} -> HIT", key);
    }

    /// A read found no usable entry and scheduled a fetch.
    fn record_miss(&self, key: &str) {
        debug!("✗ {} -> MISS, fetch scheduled", key);
    }

    /// A read joined an already in-flight fetch instead of starting one.
    fn record_coalesced(&self, key: &str) {
        debug!("{} -> coalesced onto in-flight fetch", key);
    }

    /// A stale entry was served while a revalidating fetch was scheduled.
    fn record_stale_served(&self, key: &str) {
        debug!("{} -> stale served, revalidating", key);
    }

    /// A fetch completed successfully and the entry turned Fresh.
    fn record_loaded(&self, key: &str, duration: Duration) {
        debug!("✓ {} loaded in {:?}", key, duration);
    }

    /// A fetch failed terminally and the entry turned Failed.
    fn record_failure(&self, key: &str, error: &str) {
        warn!("{} failed: {}", key, error);
    }
}

/// Log-backed default metrics.
#[derive(Clone, Default)]
pub struct LogMetrics;

impl CacheMetrics for LogMetrics {}

/// Metrics implementation that records nothing.
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &str) {}
    fn record_miss(&self, _key: &str) {}
    fn record_coalesced(&self, _key: &str) {}
    fn record_stale_served(&self, _key: &str) {}
    fn record_loaded(&self, _key: &str, _duration: Duration) {}
    fn record_failure(&self, _key: &str, _error: &str) {}
}
