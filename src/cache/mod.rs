//! Cache layer
//!
//! Process-local caching on top of moka. The web layer uses it for rendered
//! template fragments, keyed with [`make_fragment_key`]. Entries are never
//! invalidated by writes; they expire or are removed explicitly.
//!
//! # Usage
//!
//! ```rust,ignore
//! use yatube::cache::{create_cache, make_fragment_key, CacheLayer};
//!
//! let cache = create_cache(&config.cache)?;
//! let key = make_fragment_key("index_page", &["1"]);
//! cache.set(&key, &html, Duration::from_secs(20)).await?;
//! cache.delete(&key).await?;
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
/// The methods are generic, so the trait is not object safe; share a
/// concrete implementation behind an `Arc` instead.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Store a value that expires after `ttl`
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete every key matching a glob pattern (`*`, `?`)
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// Build the cache described by the configuration
pub fn create_cache(config: &CacheConfig) -> Result<Arc<MemoryCache>> {
    if config.max_capacity == 0 {
        anyhow::bail!("Cache capacity must be greater than zero");
    }
    Ok(Arc::new(MemoryCache::with_capacity(config.max_capacity)))
}

/// Key of a cached template fragment.
///
/// The vary-on values are joined with `:` and hashed, so the key length is
/// bounded whatever the values are.
pub fn make_fragment_key<S: AsRef<str>>(fragment_name: &str, vary_on: &[S]) -> String {
    let joined = vary_on
        .iter()
        .map(|v| v.as_ref())
        .collect::<Vec<_>>()
        .join(":");
    format!("template.cache.{}.{:x}", fragment_name, md5::compute(joined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_create_cache() {
        let cache = create_cache(&CacheConfig::default()).unwrap();

        cache
            .set("k", &"v".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        let value: Option<String> = cache.get("k").await.unwrap();
        assert_eq!(value.as_deref(), Some("v"));
    }

    #[test]
    fn test_create_cache_rejects_zero_capacity() {
        let config = CacheConfig {
            max_capacity: 0,
            ..Default::default()
        };
        assert!(create_cache(&config).is_err());
    }

    #[test]
    fn test_fragment_key_format() {
        // md5 of the empty string
        assert_eq!(
            make_fragment_key::<&str>("index_page", &[]),
            "template.cache.index_page.d41d8cd98f00b204e9800998ecf8427e"
        );
        // md5("1")
        assert_eq!(
            make_fragment_key("index_page", &["1"]),
            "template.cache.index_page.c4ca4238a0b923820dcc509a6f75849b"
        );
        assert_ne!(
            make_fragment_key("index_page", &["1", "2"]),
            make_fragment_key("index_page", &["12"])
        );
    }

    proptest! {
        #[test]
        fn prop_fragment_key_is_stable_and_prefixed(
            name in "[a-z_]{1,20}",
            parts in proptest::collection::vec("[a-z0-9]{0,8}", 0..4)
        ) {
            let key = make_fragment_key(&name, &parts);
            prop_assert_eq!(&key, &make_fragment_key(&name, &parts));
            let prefix = format!("template.cache.{}.", name);
            prop_assert!(key.starts_with(&prefix));
            prop_assert_eq!(key.len(), prefix.len() + 32);
        }
    }
}
