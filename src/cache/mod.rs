//! Cache layer
//!
//! A process-local cache (moka) for hot catalogue reads. Values are stored
//! as JSON so any serializable type can be cached under a string key.
//!
//! ```rust,ignore
//! use rango::cache::create_cache;
//! use rango::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default());
//! cache.set("categories:all", &categories, cache.default_ttl()).await?;
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
/// Generic methods keep this trait out of `dyn` use; services hold the
/// concrete [`Cache`] type instead.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Store a value that expires after `ttl`
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete every key matching a glob pattern (`*` and `?`)
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// The cache implementation shared by services
pub type Cache = MemoryCache;

/// Build the shared cache from configuration
pub fn create_cache(config: &CacheConfig) -> Arc<Cache> {
    Arc::new(MemoryCache::with_capacity_and_ttl(
        config.max_capacity,
        Duration::from_secs(config.ttl_seconds),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_cache_from_config() {
        let config = CacheConfig {
            ttl_seconds: 120,
            max_capacity: 10,
        };
        let cache = create_cache(&config);
        assert_eq!(cache.default_ttl(), Duration::from_secs(120));

        cache
            .set("key", &vec![1, 2, 3], cache.default_ttl())
            .await
            .unwrap();
        let value: Option<Vec<i32>> = cache.get("key").await.unwrap();
        assert_eq!(value, Some(vec![1, 2, 3]));
    }
}
