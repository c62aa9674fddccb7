//! Best-effort read-through cache for list and profile lookups.
//!
//! The database stays authoritative: every entry carries a TTL and every
//! write path invalidates by key prefix. Cache failures are logged and
//! swallowed so a dead Redis never turns into a request error.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::Context;
use axum::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tracing::warn;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> anyhow::Result<()>;
    async fn invalidate_prefix(&self, prefix: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url).context("redis url")?;
        let conn = client
            .get_connection_manager()
            .await
            .context("redis connect")?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await.context("redis get")?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(key, value, ttl.as_secs())
            .await
            .context("redis set_ex")?;
        Ok(())
    }

    async fn invalidate_prefix(&self, prefix: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let pattern = format!("{prefix}*");
        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter: redis::AsyncIter<'_, String> =
                conn.scan_match(&pattern).await.context("redis scan")?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }
        if !keys.is_empty() {
            let mut conn = self.conn.clone();
            let _: () = conn.del(keys).await.context("redis del")?;
        }
        Ok(())
    }
}

/// Process-local fallback used when `REDIS_URL` is not configured.
/// Expired entries are swept on every write so the map stays bounded by
/// live keys.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some((value, expires_at)) if Instant::now() < *expires_at => {
                    return Ok(Some(value.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }
        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> anyhow::Result<()> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, expires_at)| now < *expires_at);
        entries.insert(key.to_string(), (value, now + ttl));
        Ok(())
    }

    async fn invalidate_prefix(&self, prefix: &str) -> anyhow::Result<()> {
        self.entries
            .write()
            .await
            .retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }
}

pub async fn get_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Option<T> {
    match cache.get(key).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "dropping undecodable cache entry");
                None
            }
        },
        Ok(None) => None,
        Err(err) => {
            warn!(key, error = %err, "cache read failed");
            None
        }
    }
}

pub async fn put_json<T: Serialize>(cache: &dyn Cache, key: &str, value: &T, ttl: Duration) {
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(key, error = %err, "cache encode failed");
            return;
        }
    };
    if let Err(err) = cache.set(key, raw, ttl).await {
        warn!(key, error = %err, "cache write failed");
    }
}

pub async fn invalidate(cache: &dyn Cache, prefix: &str) {
    if let Err(err) = cache.invalidate_prefix(prefix).await {
        warn!(prefix, error = %err, "cache invalidation failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_cache_round_trips_values() {
        let cache = MemoryCache::new();
        cache
            .set("users:1:me", "{}".into(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("users:1:me").await.unwrap(), Some("{}".into()));
        assert_eq!(cache.get("users:2:me").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_cache_expires_entries() {
        let cache = MemoryCache::new();
        cache
            .set("categories:1::1:10", "[]".into(), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(cache.get("categories:1::1:10").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_cache_sweeps_expired_entries_on_write() {
        let cache = MemoryCache::new();
        cache
            .set("transactions:1:a", "x".into(), Duration::ZERO)
            .await
            .unwrap();
        cache
            .set("transactions:1:b", "x".into(), Duration::ZERO)
            .await
            .unwrap();
        cache
            .set("users:1:me", "{}".into(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.entries.read().await.len(), 1);
        assert_eq!(cache.get("users:1:me").await.unwrap(), Some("{}".into()));
    }

    #[tokio::test]
    async fn prefix_invalidation_only_hits_matching_keys() {
        let cache = MemoryCache::new();
        for key in ["transactions:1:a", "transactions:1:b", "transactions:10:a"] {
            cache
                .set(key, "x".into(), Duration::from_secs(60))
                .await
                .unwrap();
        }
        cache.invalidate_prefix("transactions:1:").await.unwrap();
        assert_eq!(cache.get("transactions:1:a").await.unwrap(), None);
        assert_eq!(cache.get("transactions:1:b").await.unwrap(), None);
        assert_eq!(
            cache.get("transactions:10:a").await.unwrap(),
            Some("x".into())
        );
    }

    #[tokio::test]
    async fn json_helpers_swallow_decode_errors() {
        let cache = MemoryCache::new();
        cache
            .set("users:1:me", "not json".into(), Duration::from_secs(60))
            .await
            .unwrap();
        let decoded: Option<Vec<i64>> = get_json(&cache, "users:1:me").await;
        assert_eq!(decoded, None);

        put_json(&cache, "users:1:me", &vec![1i64, 2], Duration::from_secs(60)).await;
        let decoded: Option<Vec<i64>> = get_json(&cache, "users:1:me").await;
        assert_eq!(decoded, Some(vec![1, 2]));
    }
}
