//! Cache layer
//!
//! Published content lookups and the public navigation tree are cached in
//! process with moka. Services invalidate the affected keys on every write.
//!
//! # Usage
//!
//! ```rust,ignore
//! use notwp::cache::{create_cache, CacheLayer};
//! use notwp::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default());
//! cache.set("key", &"value", Duration::from_secs(60)).await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// Cache layer trait
///
/// The generic methods make this trait unusable as `dyn CacheLayer`; the
/// [`Cache`] enum is what services hold.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Set a value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    /// Delete a value from cache
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete all values matching a glob pattern (`*`, `?`)
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    /// Clear all cache entries
    async fn clear(&self) -> Result<()>;
}

/// Cache handle shared by services
#[derive(Debug)]
pub enum Cache {
    /// In-memory cache using moka
    Memory(MemoryCache),
}

impl Cache {
    /// TTL applied by services when caching lookups
    pub fn default_ttl(&self) -> Duration {
        match self {
            Cache::Memory(cache) => cache.default_ttl(),
        }
    }
}

#[async_trait]
impl CacheLayer for Cache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self {
            Cache::Memory(cache) => cache.get(key).await,
        }
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.delete(key).await,
        }
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.delete_pattern(pattern).await,
        }
    }

    async fn clear(&self) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.clear().await,
        }
    }
}

/// Create the cache described by the configuration
pub fn create_cache(config: &CacheConfig) -> Arc<Cache> {
    let ttl = Duration::from_secs(config.ttl_seconds.max(1));
    Arc::new(Cache::Memory(MemoryCache::with_capacity_and_ttl(config.max_entries, ttl)))
}

/// Cache key builders, so writers and readers agree on names
pub mod keys {
    pub const SITE_SETTINGS: &str = "site:settings";
    pub const NAV_VISIBLE: &str = "nav:visible";
    pub const DOC_SECTIONS: &str = "docs:sections";

    pub fn post(slug: &str) -> String {
        format!("post:slug:{}", slug)
    }

    pub fn published_posts(page: i64, per_page: i64) -> String {
        format!("posts:published:{}:{}", page, per_page)
    }

    pub fn page(slug: &str) -> String {
        format!("page:slug:{}", slug)
    }

    pub fn doc(slug: &str) -> String {
        format!("doc:slug:{}", slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_memory_cache() {
        let cache = create_cache(&CacheConfig::default());
        assert_eq!(cache.default_ttl(), Duration::from_secs(300));

        cache.set("test_key", &"test_value".to_string(), Duration::from_secs(60)).await.unwrap();
        let result: Option<String> = cache.get("test_key").await.unwrap();
        assert_eq!(result, Some("test_value".to_string()));
    }

    #[tokio::test]
    async fn test_key_patterns_cover_builders() {
        let cache = create_cache(&CacheConfig::default());
        let ttl = cache.default_ttl();
        cache.set(&keys::post("hello"), &1, ttl).await.unwrap();
        cache.set(&keys::published_posts(1, 10), &2, ttl).await.unwrap();
        cache.set(&keys::page("about"), &3, ttl).await.unwrap();

        cache.delete_pattern("post:*").await.unwrap();
        cache.delete_pattern("posts:*").await.unwrap();

        assert_eq!(cache.get::<i32>(&keys::post("hello")).await.unwrap(), None);
        assert_eq!(cache.get::<i32>(&keys::published_posts(1, 10)).await.unwrap(), None);
        assert_eq!(cache.get::<i32>(&keys::page("about")).await.unwrap(), Some(3));
    }
}
