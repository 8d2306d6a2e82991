//! Block-time resolver.
//!
//! A read-through cache in front of "block by hash" lookups. Cached values
//! are RFC 3339 strings keyed by the lowercase `0x` block hash. There is no
//! eviction and no negative caching.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::B256;
use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::framework::StoreError;

/// Errors that can occur while resolving a block time.
#[derive(Debug, Error)]
pub enum BlockTimeError {
    /// Chain RPC failure
    #[error("block lookup failed: {0}")]
    Rpc(String),

    /// The node does not know the block
    #[error("block {0} not found")]
    NotFound(B256),

    /// The node did not answer in time
    #[error("block lookup timed out")]
    Timeout,

    /// Header timestamp is out of range
    #[error("invalid block timestamp {0}")]
    InvalidTimestamp(u64),
}

/// JSON key-value store backing the block-time cache.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError>;
}

/// In-process cache store.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    values: RwLock<HashMap<String, serde_json::Value>>,
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        self.values.write().await.insert(key.to_owned(), value);
        Ok(())
    }
}

/// Chain RPC able to fetch a block's timestamp.
#[async_trait]
pub trait BlockTimeSource: Send + Sync {
    async fn block_time(&self, block_hash: B256) -> Result<OffsetDateTime, BlockTimeError>;
}

/// Resolves block hashes to block times, caching every successful lookup.
#[derive(Clone)]
pub struct BlockTimeResolver {
    cache: Arc<dyn CacheStore>,
    source: Arc<dyn BlockTimeSource>,
}

impl BlockTimeResolver {
    pub fn new(cache: Arc<dyn CacheStore>, source: Arc<dyn BlockTimeSource>) -> Self {
        Self { cache, source }
    }

    pub fn cache_key(block_hash: B256) -> String {
        alloy::hex::encode_prefixed(block_hash)
    }

    /// Return the time of the block with `block_hash`.
    ///
    /// A cache miss, a cache read error, or a cached value that is not an
    /// RFC 3339 string all fall through to the chain RPC.
    pub async fn get_block_time(&self, block_hash: B256) -> Result<OffsetDateTime, BlockTimeError> {
        let key = Self::cache_key(block_hash);

        match self.cache.get(&key).await {
            Ok(Some(value)) => {
                if let Some(time) = parse_cached(&value) {
                    return Ok(time);
                }
                debug!(key = %key, "Ignoring malformed cached block time");
            }
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Block time cache read failed"),
        }

        let time = self.source.block_time(block_hash).await?;

        match time.format(&Rfc3339) {
            Ok(formatted) => {
                if let Err(e) = self.cache.set(&key, serde_json::Value::String(formatted)).await {
                    warn!(key = %key, error = %e, "Failed to cache block time");
                }
            }
            Err(e) => warn!(key = %key, error = %e, "Failed to format block time"),
        }

        Ok(time)
    }
}

fn parse_cached(value: &serde_json::Value) -> Option<OffsetDateTime> {
    value
        .as_str()
        .and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok())
}

/// Convert a header's unix timestamp.
pub fn timestamp_to_time(timestamp: u64) -> Result<OffsetDateTime, BlockTimeError> {
    i64::try_from(timestamp)
        .ok()
        .and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok())
        .ok_or(BlockTimeError::InvalidTimestamp(timestamp))
}


#[cfg(test)]
mod tests {
    use super::testing::CountingSource;
    use super::*;
    use time::macros::datetime;

    struct BrokenCache;

    #[async_trait]
    impl CacheStore for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<serde_json::Value>, StoreError> {
            Err(StoreError::Unavailable("down".to_owned()))
        }

        async fn set(&self, _key: &str, _value: serde_json::Value) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".to_owned()))
        }
    }

    #[tokio::test]
    async fn miss_fetches_once_then_hits_cache() {
        let cache = Arc::new(MemoryCacheStore::default());
        let source = Arc::new(CountingSource::new(datetime!(2021-03-04 05:06:07 UTC)));
        let resolver = BlockTimeResolver::new(cache.clone(), source.clone());
        let hash = B256::repeat_byte(0xAB);

        let first = resolver.get_block_time(hash).await.unwrap();
        let second = resolver.get_block_time(hash).await.unwrap();

        assert_eq!(first, datetime!(2021-03-04 05:06:07 UTC));
        assert_eq!(second, first);
        assert_eq!(source.calls(), 1);

        let cached = cache.get(&BlockTimeResolver::cache_key(hash)).await.unwrap();
        assert_eq!(cached, Some(serde_json::json!("2021-03-04T05:06:07Z")));
    }

    #[tokio::test]
    async fn cache_key_is_lowercase_prefixed_hex() {
        let key = BlockTimeResolver::cache_key(B256::repeat_byte(0xAB));
        assert!(key.starts_with("0xabab"));
        assert_eq!(key.len(), 66);
    }

    #[tokio::test]
    async fn malformed_cache_value_is_a_miss() {
        let cache = Arc::new(MemoryCacheStore::default());
        let hash = B256::repeat_byte(1);
        cache
            .set(&BlockTimeResolver::cache_key(hash), serde_json::json!({"t": 1}))
            .await
            .unwrap();
        let source = Arc::new(CountingSource::new(datetime!(2021-01-01 00:00:00 UTC)));
        let resolver = BlockTimeResolver::new(cache, source.clone());

        let time = resolver.get_block_time(hash).await.unwrap();
        assert_eq!(time, datetime!(2021-01-01 00:00:00 UTC));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn cache_failures_do_not_fail_resolution() {
        let source = Arc::new(CountingSource::new(datetime!(2021-01-01 00:00:00 UTC)));
        let resolver = BlockTimeResolver::new(Arc::new(BrokenCache), source.clone());
        assert!(resolver.get_block_time(B256::ZERO).await.is_ok());
    }

    #[tokio::test]
    async fn rpc_failure_is_surfaced() {
        let resolver = BlockTimeResolver::new(
            Arc::new(MemoryCacheStore::default()),
            Arc::new(CountingSource::failing()),
        );
        assert!(matches!(
            resolver.get_block_time(B256::ZERO).await,
            Err(BlockTimeError::NotFound(_))
        ));
    }

    #[test]
    fn converts_header_timestamps() {
        assert_eq!(
            timestamp_to_time(1_600_000_000).unwrap(),
            datetime!(2020-09-13 12:26:40 UTC)
        );
        assert!(timestamp_to_time(u64::MAX).is_err());
    }
}
