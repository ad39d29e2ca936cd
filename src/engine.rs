//! Key-addressed read-through cache engine.
//!
//! The engine owns the only shared mutable state in the crate: a
//! `DashMap<QueryKey, _>` of cache entries, mutated exclusively by the
//! engine's own transition logic. DashMap's per-key sharding serializes
//! those mutations, so consumers on any runtime flavor observe a consistent
//! state machine per entry:
//!
//! ```text
//! Idle -> Fetching -> { Fresh, Failed }
//! Fresh -> Stale        (time-triggered, lazily checked on read)
//! Stale -> Fetching     (on next read, stale value still served)
//! Failed -> Fetching    (on next read; failures are never cached as permanent)
//! ```
//!
//! Entries are never evicted: the store is an unbounded map, matching the
//! bounded key universe of the consuming views (one key per distinct search
//! string or recipe id).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{FetchError, Result};
use crate::key::QueryKey;
use crate::observability::{CacheMetrics, LogMetrics};

/// How long a Fresh entry stays authoritative: 60 seconds.
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(60);

/// Lifecycle state of a cache entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryStatus {
    /// Created but never fetched.
    Idle,
    /// A fetch is in flight. Previously loaded data, if any, is still served.
    Fetching,
    /// Loaded and younger than the stale time.
    Fresh,
    /// Loaded but older than the stale time; next read revalidates.
    Stale,
    /// The last fetch failed after retries were exhausted.
    Failed,
}

/// One cached result and its lifecycle state.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub key: QueryKey,
    pub status: EntryStatus,
    pub data: Option<Value>,
    pub fetched_at: Option<Instant>,
    pub error: Option<FetchError>,
}

impl CacheEntry {
    fn idle(key: QueryKey) -> Self {
        CacheEntry {
            key,
            status: EntryStatus::Idle,
            data: None,
            fetched_at: None,
            error: None,
        }
    }

    fn age_exceeds(&self, stale_time: Duration) -> bool {
        match self.fetched_at {
            Some(at) => at.elapsed() > stale_time,
            None => true,
        }
    }

    /// The entry holds a value that may be served, fresh or stale.
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }
}

struct EntrySlot {
    entry: CacheEntry,
    tx: watch::Sender<CacheEntry>,
    /// Bumped each time a fetch is scheduled; a completing fetch must still
    /// match it or its result is dropped as superseded.
    generation: u64,
    invalidated: bool,
    fetch_started: Option<Instant>,
}

impl EntrySlot {
    fn new(key: QueryKey) -> Self {
        let entry = CacheEntry::idle(key);
        let (tx, _rx) = watch::channel(entry.clone());
        EntrySlot {
            entry,
            tx,
            generation: 0,
            invalidated: false,
            fetch_started: None,
        }
    }
}

enum ReadOutcome {
    Hit,
    Miss,
    Revalidate,
    Coalesced,
}

/// Generic key-addressed store with staleness, in-flight coalescing, and
/// subscriber notification.
///
/// Cheap to clone; all clones share the same store.
#[derive(Clone)]
pub struct CacheEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    slots: DashMap<QueryKey, EntrySlot>,
    stale_time: Duration,
    metrics: Box<dyn CacheMetrics>,
}

impl CacheEngine {
    /// Create an engine with the given stale time and log-backed metrics.
    pub fn new(stale_time: Duration) -> Self {
        Self::with_metrics(stale_time, Box::new(LogMetrics))
    }

    /// Create an engine with a custom metrics handler.
    pub fn with_metrics(stale_time: Duration, metrics: Box<dyn CacheMetrics>) -> Self {
        CacheEngine {
            inner: Arc::new(EngineInner {
                slots: DashMap::new(),
                stale_time,
                metrics,
            }),
        }
    }

    pub fn stale_time(&self) -> Duration {
        self.inner.stale_time
    }

    /// Read the entry for `key`, registering the caller for updates.
    ///
    /// Returns the current entry synchronously (possibly `Fetching` with no
    /// data yet). Schedules exactly one call to `fetcher` when the entry is
    /// not fresh and no fetch is in flight; a concurrent `read` for the same
    /// key joins the in-flight fetch instead of starting a second one, and
    /// both callers observe the same outcome through their subscriptions.
    ///
    /// A stale or invalidated entry keeps serving its old value while the
    /// revalidating fetch runs.
    pub fn read<F, Fut>(&self, key: QueryKey, fetcher: F) -> Subscription
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let inner = &self.inner;
        let key_label = key.to_string();
        let mut scheduled = None;

        let (snapshot, rx) = {
            let mut slot = inner
                .slots
                .entry(key.clone())
                .or_insert_with(|| EntrySlot::new(key.clone()));

            // Staleness is checked lazily here; there is no background timer.
            if slot.entry.status == EntryStatus::Fresh && slot.entry.age_exceeds(inner.stale_time) {
                slot.entry.status = EntryStatus::Stale;
            }

            let outcome = match slot.entry.status {
                EntryStatus::Fetching => ReadOutcome::Coalesced,
                EntryStatus::Fresh if slot.invalidated => ReadOutcome::Revalidate,
                EntryStatus::Fresh => ReadOutcome::Hit,
                EntryStatus::Stale => ReadOutcome::Revalidate,
                EntryStatus::Idle | EntryStatus::Failed => ReadOutcome::Miss,
            };

            match outcome {
                ReadOutcome::Hit => inner.metrics.record_hit(&key_label),
                ReadOutcome::Coalesced => inner.metrics.record_coalesced(&key_label),
                ReadOutcome::Miss | ReadOutcome::Revalidate => {
                    if matches!(outcome, ReadOutcome::Revalidate) {
                        inner.metrics.record_stale_served(&key_label);
                    } else {
                        inner.metrics.record_miss(&key_label);
                    }

                    slot.invalidated = false;
                    slot.generation += 1;
                    slot.entry.status = EntryStatus::Fetching;
                    slot.entry.error = None;
                    slot.fetch_started = Some(Instant::now());
                    scheduled = Some(slot.generation);
                }
            }

            (slot.entry.clone(), slot.tx.subscribe())
        };

        if let Some(generation) = scheduled {
            let engine = self.clone();
            let fut = fetcher();
            tokio::spawn(async move {
                let result = fut.await;
                engine.apply(key, generation, result);
            });
        }

        Subscription { snapshot, rx }
    }

    /// Apply a completed fetch to its entry.
    ///
    /// The result lands only on the entry for its own original key, and only
    /// while that entry is still waiting on this generation - a late answer
    /// from a superseded request never replaces newer state.
    fn apply(&self, key: QueryKey, generation: u64, result: Result<Value>) {
        let inner = &self.inner;
        let Some(mut slot) = inner.slots.get_mut(&key) else {
            return;
        };

        if slot.generation != generation || slot.entry.status != EntryStatus::Fetching {
            debug!("{} -> dropping superseded result (generation {})", key, generation);
            return;
        }

        let elapsed = slot.fetch_started.map(|s| s.elapsed()).unwrap_or_default();
        slot.fetch_started = None;

        match result {
            Ok(value) => {
                slot.entry.status = EntryStatus::Fresh;
                slot.entry.data = Some(value);
                slot.entry.fetched_at = Some(Instant::now());
                slot.entry.error = None;
                inner.metrics.record_loaded(&key.to_string(), elapsed);
            }
            Err(e) => {
                inner.metrics.record_failure(&key.to_string(), &e.to_string());
                slot.entry.status = EntryStatus::Failed;
                // Stale data, if any, stays on the entry; the Failed status
                // and error are what subscribers see.
                slot.entry.error = Some(e);
            }
        }

        // send_replace: the notification must land in the channel even when
        // every subscriber has already been dropped.
        slot.tx.send_replace(slot.entry.clone());
    }

    /// Force the next `read` for `key` to refetch even if the entry is Fresh.
    pub fn invalidate(&self, key: &QueryKey) {
        if let Some(mut slot) = self.inner.slots.get_mut(key) {
            debug!("{} -> invalidated", key);
            slot.invalidated = true;
        }
    }

    /// Peek at the current entry without subscribing or fetching.
    pub fn entry(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.inner.slots.get(key).map(|slot| slot.entry.clone())
    }

    /// Number of keys in the store.
    pub fn len(&self) -> usize {
        self.inner.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.slots.is_empty()
    }
}

impl Default for CacheEngine {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_TIME)
    }
}

/// A caller's view of one entry: a synchronous snapshot plus a stream of
/// terminal updates.
///
/// Dropping the subscription detaches the caller; the underlying request, if
/// any, still completes and updates the cache entry for its own key.
pub struct Subscription {
    snapshot: CacheEntry,
    rx: watch::Receiver<CacheEntry>,
}

impl Subscription {
    /// The entry as it looked when `read` returned.
    pub fn snapshot(&self) -> &CacheEntry {
        &self.snapshot
    }

    /// Wait for the next transition into Fresh or Failed and return the
    /// updated entry. Returns the last known entry if the engine goes away.
    pub async fn updated(&mut self) -> CacheEntry {
        if self.rx.changed().await.is_ok() {
            self.snapshot = self.rx.borrow_and_update().clone();
        }
        self.snapshot.clone()
    }

    /// Resolve to a usable entry: immediately when the snapshot is terminal
    /// or already holds servable (possibly stale) data, otherwise after the
    /// in-flight fetch lands.
    pub async fn resolve(&mut self) -> CacheEntry {
        loop {
            match self.snapshot.status {
                EntryStatus::Fresh | EntryStatus::Failed => return self.snapshot.clone(),
                EntryStatus::Fetching | EntryStatus::Stale if self.snapshot.has_data() => {
                    return self.snapshot.clone();
                }
                _ => {
                    if self.rx.changed().await.is_err() {
                        return self.snapshot.clone();
                    }
                    self.snapshot = self.rx.borrow_and_update().clone();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_fetcher(
        calls: &Arc<AtomicUsize>,
        value: Value,
    ) -> impl Future<Output = Result<Value>> + Send + 'static {
        let calls = Arc::clone(calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(value)
        }
    }

    #[tokio::test]
    async fn test_first_read_fetches_and_turns_fresh() {
        let engine = CacheEngine::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut sub = engine.read(QueryKey::list("soup"), || {
            counting_fetcher(&calls, json!(["minestrone"]))
        });
        assert_eq!(sub.snapshot().status, EntryStatus::Fetching);
        assert!(sub.snapshot().data.is_none());

        let entry = sub.resolve().await;
        assert_eq!(entry.status, EntryStatus::Fresh);
        assert_eq!(entry.data, Some(json!(["minestrone"])));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_reads_coalesce_to_one_fetch() {
        let engine = CacheEngine::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::list("soup");

        let mut first = engine.read(key.clone(), || counting_fetcher(&calls, json!([1])));
        let mut second = engine.read(key.clone(), || counting_fetcher(&calls, json!([2])));

        let a = first.resolve().await;
        let b = second.resolve().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.data, Some(json!([1])));
        assert_eq!(b.data, Some(json!([1])));
    }

    #[tokio::test]
    async fn test_fresh_entry_served_without_fetch() {
        let engine = CacheEngine::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::list("");

        engine
            .read(key.clone(), || counting_fetcher(&calls, json!([1])))
            .resolve()
            .await;

        let mut sub = engine.read(key.clone(), || counting_fetcher(&calls, json!([2])));
        let entry = sub.resolve().await;

        assert_eq!(entry.status, EntryStatus::Fresh);
        assert_eq!(entry.data, Some(json!([1])));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_revalidates_while_serving_old_value() {
        let engine = CacheEngine::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::list("");

        engine
            .read(key.clone(), || counting_fetcher(&calls, json!(["old"])))
            .resolve()
            .await;

        tokio::time::advance(Duration::from_secs(61)).await;

        let mut sub = engine.read(key.clone(), || counting_fetcher(&calls, json!(["new"])));

        // The old value is served synchronously while the refetch runs.
        assert_eq!(sub.snapshot().status, EntryStatus::Fetching);
        assert_eq!(sub.snapshot().data, Some(json!(["old"])));
        let served = sub.resolve().await;
        assert_eq!(served.data, Some(json!(["old"])));

        // A reader that waits observes the refreshed value.
        let refreshed = sub.updated().await;
        assert_eq!(refreshed.status, EntryStatus::Fresh);
        assert_eq!(refreshed.data, Some(json!(["new"])));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_younger_than_stale_time_is_not_refetched() {
        let engine = CacheEngine::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::list("");

        engine
            .read(key.clone(), || counting_fetcher(&calls, json!([1])))
            .resolve()
            .await;

        tokio::time::advance(Duration::from_secs(59)).await;

        let entry = engine
            .read(key.clone(), || counting_fetcher(&calls, json!([2])))
            .resolve()
            .await;

        assert_eq!(entry.status, EntryStatus::Fresh);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_stored_and_notified() {
        let engine = CacheEngine::default();
        let key = QueryKey::detail("42");

        let mut sub = engine.read(key.clone(), || async {
            Err(FetchError::HttpStatus(404))
        });

        let entry = sub.resolve().await;
        assert_eq!(entry.status, EntryStatus::Failed);
        assert_eq!(entry.error, Some(FetchError::HttpStatus(404)));
        assert!(entry.data.is_none());
    }

    #[tokio::test]
    async fn test_failed_entry_refetches_on_next_read() {
        let engine = CacheEngine::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::detail("42");

        let failing_calls = Arc::clone(&calls);
        engine
            .read(key.clone(), move || async move {
                failing_calls.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::Network("unreachable".to_string()))
            })
            .resolve()
            .await;

        let entry = engine
            .read(key.clone(), || counting_fetcher(&calls, json!({"id": "42"})))
            .resolve()
            .await;

        assert_eq!(entry.status, EntryStatus::Fresh);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch_of_fresh_entry() {
        let engine = CacheEngine::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::list("");

        engine
            .read(key.clone(), || counting_fetcher(&calls, json!(["old"])))
            .resolve()
            .await;

        engine.invalidate(&key);

        let mut sub = engine.read(key.clone(), || counting_fetcher(&calls, json!(["new"])));
        // Old value still served while the forced refetch runs.
        assert_eq!(sub.snapshot().data, Some(json!(["old"])));

        let refreshed = sub.updated().await;
        assert_eq!(refreshed.data, Some(json!(["new"])));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_superseded_result_is_dropped() {
        let engine = CacheEngine::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::list("soup");

        engine
            .read(key.clone(), || counting_fetcher(&calls, json!(["current"])))
            .resolve()
            .await;

        // A result from an older request generation must not replace the
        // entry that has since settled.
        engine.apply(key.clone(), 999, Ok(json!(["late"])));

        let entry = engine.entry(&key).expect("Entry should exist");
        assert_eq!(entry.status, EntryStatus::Fresh);
        assert_eq!(entry.data, Some(json!(["current"])));
    }

    #[tokio::test]
    async fn test_distinct_keys_fetch_independently() {
        let engine = CacheEngine::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let a = engine
            .read(QueryKey::list("soup"), || counting_fetcher(&calls, json!(["s"])))
            .resolve()
            .await;
        let b = engine
            .read(QueryKey::list("stew"), || counting_fetcher(&calls, json!(["t"])))
            .resolve()
            .await;

        assert_eq!(a.data, Some(json!(["s"])));
        assert_eq!(b.data, Some(json!(["t"])));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(engine.len(), 2);
    }

    #[tokio::test]
    async fn test_dropped_subscription_still_updates_cache() {
        let engine = CacheEngine::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::list("soup");

        // Consumer moves on before the fetch lands.
        drop(engine.read(key.clone(), || counting_fetcher(&calls, json!(["late"]))));

        // Let the spawned fetch complete.
        tokio::task::yield_now().await;

        let entry = engine.entry(&key).expect("Entry should exist");
        assert_eq!(entry.status, EntryStatus::Fresh);
        assert_eq!(entry.data, Some(json!(["late"])));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
