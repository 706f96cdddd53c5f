use std::time::Duration;

use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};

use super::{CacheError, CounterCache};

/// A counter cache backed by a Redis server.
#[derive(Clone)]
pub struct RedisCounterCache {
    connection: ConnectionManager,
}

impl RedisCounterCache {
    /// Connect to the Redis server at `url`.
    ///
    /// The connection manager reconnects on its own after the server drops
    /// the connection.
    pub async fn connect(url: &str) -> Result<Self, RedisError> {
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self { connection })
    }
}

impl From<RedisError> for CacheError {
    fn from(err: RedisError) -> Self {
        if err.is_connection_refusal() {
            CacheError::Unavailable(err.to_string())
        } else {
            CacheError::Ambiguous(err.to_string())
        }
    }
}

#[rocket::async_trait]
impl CounterCache for RedisCounterCache {
    async fn get(&self, key: &str) -> Result<Option<i64>, CacheError> {
        let mut conn = self.connection.clone();
        Ok(conn.get::<_, Option<i64>>(key).await?)
    }

    async fn set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let millis = usize::try_from(ttl.as_millis()).unwrap_or(usize::MAX).max(1);
        conn.pset_ex::<_, _, ()>(key, value, millis).await?;
        Ok(())
    }

    async fn increment(&self, key: &str) -> Result<i64, CacheError> {
        let mut conn = self.connection.clone();
        Ok(conn.incr::<_, _, i64>(key, 1).await?)
    }

    async fn scan_delete(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut conn = self.connection.clone();
        let pattern = format!("{prefix}*");
        let keys = {
            let mut iter = conn.scan_match::<_, String>(&pattern).await?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };
        if keys.is_empty() {
            return Ok(0);
        }
        Ok(conn.del::<_, u64>(keys).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REDIS_URL: &str = "redis://127.0.0.1:6379";

    #[rocket::async_test]
    #[ignore = "requires a running Redis server"]
    async fn counts_and_expires() {
        let cache = RedisCounterCache::connect(REDIS_URL).await.unwrap();
        let prefix = format!("quota:test{}:", rand::random::<u32>());
        let key = format!("{prefix}daily:1:a");

        assert_eq!(cache.get(&key).await.unwrap(), None);
        cache.set(&key, 1, Duration::from_secs(30)).await.unwrap();
        assert_eq!(cache.increment(&key).await.unwrap(), 2);
        assert_eq!(cache.get(&key).await.unwrap(), Some(2));

        assert_eq!(cache.scan_delete(&prefix).await.unwrap(), 1);
        assert_eq!(cache.get(&key).await.unwrap(), None);
    }

    #[rocket::async_test]
    #[ignore = "requires a running Redis server"]
    async fn short_ttls_expire() {
        let cache = RedisCounterCache::connect(REDIS_URL).await.unwrap();
        let key = format!("quota:test{}:total:1:a", rand::random::<u32>());
        cache.set(&key, 5, Duration::from_millis(50)).await.unwrap();
        rocket::tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(cache.get(&key).await.unwrap(), None);
    }
}
