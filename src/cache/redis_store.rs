use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::{AsyncCommands, RedisError};

use crate::cache::models::CacheEntry;
use crate::cache::CacheStore;
use crate::error::CacheError;

/// Shared cache tier configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (redis://...)
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

/// Redis-backed shared cache tier.
///
/// Entries live under a key prefix; a per-service index set records which
/// keys belong to each service tag so invalidation touches only that
/// tag's entries.
pub struct RedisStore {
    pool: Pool,
    prefix: String,
}

impl RedisStore {
    /// Create a store and verify connectivity with a PING
    pub async fn new(config: RedisConfig) -> Result<Self, CacheError> {
        let cfg = Config::from_url(&config.url);
        let pool = cfg.create_pool(Some(Runtime::Tokio1)).map_err(|e| {
            CacheError::ConnectionError(format!("failed to create Redis pool: {}", e))
        })?;

        let mut conn = pool
            .get()
            .await
            .map_err(|e| CacheError::ConnectionError(format!("failed to connect to Redis: {}", e)))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| CacheError::ConnectionError(format!("Redis ping failed: {}", e)))?;

        Ok(Self {
            pool,
            prefix: "edge_gateway:cache:".to_string(),
        })
    }

    /// Set the key prefix
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    /// Handle to the underlying pool, for health probing
    pub fn pool(&self) -> Pool {
        self.pool.clone()
    }

    fn entry_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn tag_index_key(&self, service_tag: &str) -> String {
        format!("{}tag:{}", self.prefix, service_tag)
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, CacheError> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::ConnectionError(format!("failed to get Redis connection: {}", e)))
    }

    fn map_redis_error(&self, err: RedisError) -> CacheError {
        match err.kind() {
            redis::ErrorKind::IoError => {
                CacheError::ConnectionError(format!("Redis IO error: {}", err))
            }
            redis::ErrorKind::ResponseError => {
                CacheError::RetrieveError(format!("Redis response error: {}", err))
            }
            _ => CacheError::StoreError(format!("Redis error: {}", err)),
        }
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let entry_key = self.entry_key(key);
        let mut conn = self.connection().await?;

        let data: Option<String> = conn
            .get(&entry_key)
            .await
            .map_err(|e| self.map_redis_error(e))?;

        let data = match data {
            Some(data) => data,
            None => return Ok(None),
        };

        let entry: CacheEntry = serde_json::from_str(&data).map_err(|e| {
            CacheError::RetrieveError(format!("failed to deserialize cache entry: {}", e))
        })?;

        // Redis expiry is authoritative, but the entry's own clock is
        // checked too so a lagging EXPIRE never serves stale data
        if entry.is_expired() {
            let _: () = conn
                .del(&entry_key)
                .await
                .map_err(|e| self.map_redis_error(e))?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    async fn set(&self, key: &str, entry: CacheEntry, ttl: Duration) -> Result<(), CacheError> {
        if ttl.as_secs() == 0 {
            // Redis rejects SETEX with a zero TTL; a zero-TTL entry is
            // already expired so there is nothing to store
            return Ok(());
        }

        let entry_key = self.entry_key(key);
        let index_key = self.tag_index_key(&entry.service_tag);
        let mut conn = self.connection().await?;

        let data = serde_json::to_string(&entry).map_err(|e| {
            CacheError::StoreError(format!("failed to serialize cache entry: {}", e))
        })?;

        let _: () = conn
            .set_ex(&entry_key, data, ttl.as_secs() as usize)
            .await
            .map_err(|e| self.map_redis_error(e))?;

        let _: () = conn
            .sadd(&index_key, key)
            .await
            .map_err(|e| self.map_redis_error(e))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let entry_key = self.entry_key(key);
        let mut conn = self.connection().await?;

        let _: () = conn
            .del(&entry_key)
            .await
            .map_err(|e| self.map_redis_error(e))?;

        Ok(())
    }

    async fn invalidate_service(&self, service_tag: &str) -> Result<(), CacheError> {
        let index_key = self.tag_index_key(service_tag);
        let mut conn = self.connection().await?;

        let members: Vec<String> = conn
            .smembers(&index_key)
            .await
            .map_err(|e| self.map_redis_error(e))?;

        if !members.is_empty() {
            let entry_keys: Vec<String> = members.iter().map(|k| self.entry_key(k)).collect();
            let _: () = conn
                .del(&entry_keys)
                .await
                .map_err(|e| self.map_redis_error(e))?;
        }

        let _: () = conn
            .del(&index_key)
            .await
            .map_err(|e| self.map_redis_error(e))?;

        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;

        let pattern = format!("{}*", self.prefix);
        let keys: Vec<String> = conn
            .keys(&pattern)
            .await
            .map_err(|e| self.map_redis_error(e))?;

        if !keys.is_empty() {
            let _: () = conn
                .del(&keys)
                .await
                .map_err(|e| self.map_redis_error(e))?;
        }

        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let entry_key = self.entry_key(key);
        let mut conn = self.connection().await?;

        conn.exists(&entry_key)
            .await
            .map_err(|e| self.map_redis_error(e))
    }
}
