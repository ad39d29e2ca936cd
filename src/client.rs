//! Recipe endpoint bindings over the cache engine.
//!
//! `RecipeClient` composes key composition, retry-wrapped fetching, and the
//! cache engine into the two read operations of the recipe API: list
//! (optionally filtered) and detail by id. It is `Clone` and cheap to share;
//! all clones address the same cache.

use std::sync::Arc;

use crate::adapter::{FetchAdapter, HttpAdapter};
use crate::config::ClientConfig;
use crate::engine::{CacheEngine, EntryStatus, Subscription};
use crate::error::{FetchError, Result};
use crate::key::QueryKey;
use crate::recipe::{recipe_from_value, recipe_list_from_value, Recipe};
use crate::retry::RetryPolicy;

/// Cached, retrying client for the recipe read endpoints.
#[derive(Clone)]
pub struct RecipeClient {
    engine: CacheEngine,
    adapter: Arc<dyn FetchAdapter>,
    retry: RetryPolicy,
    base_url: String,
}

impl RecipeClient {
    /// Create a client performing real HTTP fetches.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_adapter(config, Arc::new(HttpAdapter::new()))
    }

    /// Create a client over a custom adapter (used by tests to script
    /// responses without a network).
    pub fn with_adapter(config: ClientConfig, adapter: Arc<dyn FetchAdapter>) -> Self {
        RecipeClient {
            engine: CacheEngine::new(config.stale_time),
            adapter,
            retry: RetryPolicy::new(config.max_retries),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// The underlying cache engine.
    pub fn engine(&self) -> &CacheEngine {
        &self.engine
    }

    fn list_url(&self, key: &QueryKey) -> String {
        if key.is_unfiltered() {
            format!("{}/posts", self.base_url)
        } else {
            format!("{}/posts/{}", self.base_url, key.params())
        }
    }

    fn detail_url(&self, key: &QueryKey) -> String {
        format!("{}/posts/id/{}", self.base_url, key.params())
    }

    /// Subscribe to the recipe list for `raw_query`.
    ///
    /// The query is normalized into the cache key; clearing the search box
    /// maps back onto the cached unfiltered entry. The fetched body is
    /// validated as a recipe array before it enters the cache.
    pub fn subscribe_list(&self, raw_query: &str) -> Subscription {
        let key = QueryKey::list(raw_query);
        let url = self.list_url(&key);
        let adapter = Arc::clone(&self.adapter);
        let retry = self.retry.clone();

        self.engine.read(key, move || async move {
            let value = retry.run(|| adapter.fetch(&url)).await?;
            recipe_list_from_value(&value)?;
            Ok(value)
        })
    }

    /// Subscribe to one recipe by id.
    pub fn subscribe_recipe(&self, id: &str) -> Subscription {
        let key = QueryKey::detail(id);
        let url = self.detail_url(&key);
        let adapter = Arc::clone(&self.adapter);
        let retry = self.retry.clone();

        self.engine.read(key, move || async move {
            let value = retry.run(|| adapter.fetch(&url)).await?;
            recipe_from_value(&value)?;
            Ok(value)
        })
    }

    /// List recipes, optionally filtered by a search string.
    ///
    /// Resolves from cache when possible (including serving a stale value
    /// while revalidation runs) and otherwise waits for the fetch. A failure
    /// is returned as the typed error, never coerced to an empty list.
    pub async fn list_recipes(&self, raw_query: &str) -> Result<Vec<Recipe>> {
        let mut sub = self.subscribe_list(raw_query);
        let entry = sub.resolve().await;

        if entry.status == EntryStatus::Failed {
            return Err(entry
                .error
                .unwrap_or_else(|| FetchError::Network("fetch failed".to_string())));
        }
        match entry.data {
            Some(value) => recipe_list_from_value(&value),
            None => Err(FetchError::Network(
                "cache engine dropped before the fetch completed".to_string(),
            )),
        }
    }

    /// Fetch one recipe by id.
    pub async fn get_recipe(&self, id: &str) -> Result<Recipe> {
        let mut sub = self.subscribe_recipe(id);
        let entry = sub.resolve().await;

        if entry.status == EntryStatus::Failed {
            return Err(entry
                .error
                .unwrap_or_else(|| FetchError::Network("fetch failed".to_string())));
        }
        match entry.data {
            Some(value) => recipe_from_value(&value),
            None => Err(FetchError::Network(
                "cache engine dropped before the fetch completed".to_string(),
            )),
        }
    }

    /// Force the next list read for `raw_query` to refetch.
    pub fn invalidate_list(&self, raw_query: &str) {
        self.engine.invalidate(&QueryKey::list(raw_query));
    }

    /// Force the next read of recipe `id` to refetch.
    pub fn invalidate_recipe(&self, id: &str) {
        self.engine.invalidate(&QueryKey::detail(id));
    }
}
