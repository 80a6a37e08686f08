/// Short-term history cache: JSON lists of messages under expiring keys.
use std::time::{Duration, Instant};

use {
    async_trait::async_trait,
    dashmap::DashMap,
    redis::{AsyncCommands, aio::ConnectionManager},
    tracing::info,
};

#[async_trait]
pub trait HistoryCache: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    /// Store `value` and (re)set its time to live.
    async fn set_ex(&self, key: &str, value: String, ttl_secs: u64) -> anyhow::Result<()>;
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
    async fn exists(&self, key: &str) -> anyhow::Result<bool>;
}

/// Redis-backed cache (Azure Cache for Redis, TLS on port 6380 by default).
#[derive(Clone)]
pub struct RedisHistoryCache {
    conn: ConnectionManager,
}

impl RedisHistoryCache {
    /// Connect and verify the server answers `PING`.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let mut conn = tokio::time::timeout(Duration::from_secs(5), client.get_connection_manager())
            .await
            .map_err(|_| anyhow::anyhow!("redis connect timed out"))??;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!(reply = %pong, "redis connection established");
        Ok(Self { conn })
    }
}

#[async_trait]
impl HistoryCache for RedisHistoryCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn set_ex(&self, key: &str, value: String, ttl_secs: u64) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        let mut conn = self.conn.clone();
        Ok(conn.exists(key).await?)
    }
}

/// Process-local cache with the same expiry semantics, for tests and
/// single-instance deployments without Redis.
#[derive(Default)]
pub struct InMemoryHistoryCache {
    entries: DashMap<String, (String, Instant)>,
}

impl InMemoryHistoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn live(&self, key: &str) -> Option<String> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.1 > Instant::now() => return Some(entry.0.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }
}

#[async_trait]
impl HistoryCache for InMemoryHistoryCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.live(key))
    }

    async fn set_ex(&self, key: &str, value: String, ttl_secs: u64) -> anyhow::Result<()> {
        let deadline = Instant::now() + Duration::from_secs(ttl_secs);
        self.entries.insert(key.to_string(), (value, deadline));
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.live(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_set_get_delete() {
        let cache = InMemoryHistoryCache::new();
        assert!(cache.get("k").await.unwrap().is_none());
        cache.set_ex("k", "[1]".into(), 60).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("[1]"));
        assert!(cache.exists("k").await.unwrap());
        cache.delete("k").await.unwrap();
        assert!(!cache.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn in_memory_entries_expire() {
        let cache = InMemoryHistoryCache::new();
        cache.set_ex("k", "v".into(), 0).await.unwrap();
        assert!(cache.get("k").await.unwrap().is_none());
        assert!(!cache.exists("k").await.unwrap());
    }
}
