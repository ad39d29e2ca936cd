//! # recipe-kit
//!
//! A cached, retrying data-access client for a recipe-sharing API.
//!
//! ## Features
//!
//! - **Key-Addressed Caching:** Every query normalizes to a stable
//!   [`QueryKey`]; equality on the key is the sole addressing mechanism
//! - **Request Coalescing:** Concurrent reads for the same key share one
//!   network call
//! - **Stale-While-Revalidate:** Entries older than the stale time are
//!   served immediately while a refresh runs in the background
//! - **Bounded Retries:** Transient failures (network, 5xx) are retried with
//!   exponential backoff; client errors and decode failures are not
//! - **Typed Failures:** Errors are stored on the cache entry and surfaced
//!   to subscribers, never swallowed or coerced to empty results
//!
//! ## Quick Start
//!
//! ```ignore
//! use recipe_kit::{ClientConfig, RecipeClient};
//!
//! // Create a client (cheap to clone; all clones share one cache)
//! let client = RecipeClient::new(ClientConfig::default());
//!
//! // List recipes, optionally filtered; repeated queries hit the cache
//! let all = client.list_recipes("").await?;
//! let soups = client.list_recipes("soup").await?;
//!
//! // Fetch one recipe by id
//! let recipe = client.get_recipe("r1").await?;
//! println!("{} - {}", recipe.name, recipe.tags_label());
//! ```
//!
//! ## Subscriptions
//!
//! Views that re-render on every keystroke subscribe instead of awaiting:
//!
//! ```ignore
//! let mut sub = client.subscribe_list(&search_box);
//! render(sub.snapshot());          // possibly stale data, synchronously
//! let entry = sub.updated().await; // next Fresh/Failed transition
//! render(&entry);
//! ```
//!
//! Dropping a subscription mid-flight detaches the view; the underlying
//! request still completes and updates the cache entry for its own key.

#[macro_use]
extern crate log;

pub mod adapter;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod key;
pub mod observability;
pub mod recipe;
pub mod retry;

// Re-exports for convenience
pub use adapter::{FetchAdapter, HttpAdapter, MockAdapter};
pub use client::RecipeClient;
pub use config::ClientConfig;
pub use engine::{CacheEngine, CacheEntry, EntryStatus, Subscription};
pub use error::{FetchError, Result};
pub use key::{QueryKey, QueryScope};
pub use recipe::Recipe;
pub use retry::RetryPolicy;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
