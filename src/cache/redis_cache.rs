use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use super::{CacheBackend, CacheError};

/// Redis cache backend. Coarse invalidation uses KEYS + DEL; catalog
/// namespaces hold one key per category, so the scan stays small.
#[derive(Clone)]
pub struct RedisCache {
    connection: MultiplexedConnection,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(backend_error)?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(backend_error)?;

        tracing::info!("✅ Connected to Redis catalog cache");
        Ok(Self { connection })
    }
}

fn backend_error(e: redis::RedisError) -> CacheError {
    CacheError::Backend(e.to_string())
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection.clone();
        conn.get(key).await.map_err(backend_error)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        conn.set::<_, _, ()>(key, value).await.map_err(backend_error)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(key).await.map_err(backend_error)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut conn = self.connection.clone();
        let keys: Vec<String> = conn
            .keys(format!("{}*", prefix))
            .await
            .map_err(backend_error)?;

        if keys.is_empty() {
            return Ok(0);
        }
        conn.del::<_, u64>(keys).await.map_err(backend_error)
    }
}
