//! Client configuration.

use std::time::Duration;

use crate::engine::DEFAULT_STALE_TIME;
use crate::retry::DEFAULT_MAX_RETRIES;

/// Base URL of the recipe API.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8098";

/// Configuration for a [`RecipeClient`](crate::client::RecipeClient).
///
/// The defaults carry the observed production constants: one minute of
/// freshness and two retries on transient failure.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL the two endpoints are resolved against.
    pub base_url: String,
    /// How long a loaded entry counts as Fresh.
    pub stale_time: Duration,
    /// Retries on transient failure, on top of the initial attempt.
    pub max_retries: u32,
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            stale_time: DEFAULT_STALE_TIME,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}
