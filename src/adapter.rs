//! Fetch adapters: the single-attempt network primitive.
//!
//! [`FetchAdapter`] abstracts one HTTP GET, decoupling the cache from the
//! transport. The production implementation is [`HttpAdapter`] (reqwest);
//! [`MockAdapter`] provides a scriptable in-memory stand-in for tests, so
//! cache behavior can be verified without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{FetchError, Result};

/// One HTTP GET against a URL, returning the parsed JSON body or a typed
/// failure. No retries here - retry layering belongs to `RetryPolicy`.
#[async_trait]
pub trait FetchAdapter: Send + Sync {
    /// Perform a single fetch attempt.
    ///
    /// # Errors
    ///
    /// - `FetchError::Network`: connection, DNS, or timeout failure
    /// - `FetchError::HttpStatus`: the server answered with a non-2xx code
    /// - `FetchError::Decode`: the body is not valid JSON
    async fn fetch(&self, url: &str) -> Result<Value>;
}

// ============================================================================
// HTTP adapter (reqwest)
// ============================================================================

/// Production adapter performing real HTTP GETs.
///
/// Holds a single `reqwest::Client` so connections are pooled across
/// requests. Timeouts are bounded only by the HTTP stack defaults; there is
/// no transport-level cancellation of in-flight requests.
#[derive(Clone)]
pub struct HttpAdapter {
    client: reqwest::Client,
}

impl HttpAdapter {
    pub fn new() -> Self {
        HttpAdapter {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FetchAdapter for HttpAdapter {
    async fn fetch(&self, url: &str) -> Result<Value> {
        debug!("GET {}", url);

        let response = self.client.get(url).send().await.map_err(FetchError::from)?;

        let status = response.status();
        if !status.is_success() {
            debug!("✗ GET {} -> {}", url, status.as_u16());
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(FetchError::from)?;
        let value = serde_json::from_slice(&bytes)
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        debug!("✓ GET {} -> {} ({} bytes)", url, status.as_u16(), bytes.len());
        Ok(value)
    }
}

// ============================================================================
// Mock adapter for tests
// ============================================================================

/// Scriptable adapter for testing cache and retry behavior.
///
/// Responses are enqueued per URL and served in order; the final queued
/// response is sticky and served repeatedly, so a single `Ok` covers any
/// number of refetches. Every call is counted, which is what the coalescing
/// and staleness tests assert on.
pub struct MockAdapter {
    responses: Mutex<HashMap<String, VecDeque<Result<Value>>>>,
    calls: AtomicUsize,
    calls_by_url: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
}

impl MockAdapter {
    pub fn new() -> Self {
        MockAdapter {
            responses: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            calls_by_url: Mutex::new(HashMap::new()),
            delay: None,
        }
    }

    /// Sleep this long inside each fetch, to hold requests in flight.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Enqueue the next response for a URL.
    pub fn enqueue(&self, url: &str, response: Result<Value>) {
        self.responses
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    /// Total fetch calls across all URLs.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Fetch calls for one URL.
    pub fn calls_for(&self, url: &str) -> usize {
        self.calls_by_url
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(url)
            .copied()
            .unwrap_or(0)
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FetchAdapter for MockAdapter {
    async fn fetch(&self, url: &str) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .calls_by_url
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .entry(url.to_string())
            .or_insert(0) += 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut responses = self.responses.lock().unwrap_or_else(|p| p.into_inner());
        match responses.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Network("mock queue drained".to_string()))),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(FetchError::Network("mock queue drained".to_string()))),
            None => Err(FetchError::Network(format!(
                "no mock response configured for {}",
                url
            ))),
        }
    }
}
