/// Redis-backed cache store
///
/// Values are stored as tagged JSON so documents and plain strings stay
/// distinguishable. Backend failures are logged and treated as a miss.
use crate::{
    cache::{CacheStore, CacheValue},
    error::{BeaconError, BeaconResult},
};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisResult};
use tracing::{debug, error, info, warn};

/// Redis cache client
#[derive(Clone)]
pub struct RedisCacheStore {
    connection: ConnectionManager,
    key_prefix: String,
}

impl RedisCacheStore {
    /// Connect to Redis
    ///
    /// `key_prefix` must be non-empty: `flush` deletes every key under it.
    pub async fn connect(redis_url: &str, key_prefix: &str) -> BeaconResult<Self> {
        if key_prefix.trim().is_empty() {
            return Err(BeaconError::Config(
                "key_prefix cannot be empty when redis_url is set".to_string(),
            ));
        }

        info!("Connecting to Redis at {}", redis_url);

        let client = Client::open(redis_url).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            BeaconError::Cache(format!("Redis client creation failed: {}", e))
        })?;

        let connection = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to connect to Redis: {}", e);
            BeaconError::Cache(format!("Redis connection failed: {}", e))
        })?;

        info!("Redis connection established");

        Ok(Self {
            connection,
            key_prefix: key_prefix.to_string(),
        })
    }

    fn build_key(&self, key: &str) -> String {
        prefixed(&self.key_prefix, key)
    }
}

fn prefixed(prefix: &str, key: &str) -> String {
    format!("{}{}", prefix, key)
}

fn encode(value: &CacheValue) -> Option<String> {
    serde_json::to_string(value)
        .map_err(|e| error!("Failed to serialize value for cache: {}", e))
        .ok()
}

fn decode(json: &str) -> Option<CacheValue> {
    serde_json::from_str(json)
        .map_err(|e| warn!("Failed to deserialize cached value: {}", e))
        .ok()
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn has(&self, key: &str) -> bool {
        let cache_key = self.build_key(key);

        let mut conn = self.connection.clone();
        let result: RedisResult<bool> = conn.exists(&cache_key).await;
        result.unwrap_or_else(|e| {
            warn!("Redis EXISTS failed for {}: {}", cache_key, e);
            false
        })
    }

    async fn get(&self, key: &str) -> Option<CacheValue> {
        let cache_key = self.build_key(key);
        debug!("Cache GET: {}", cache_key);

        let mut conn = self.connection.clone();
        let result: RedisResult<Option<String>> = conn.get(&cache_key).await;

        match result {
            Ok(Some(json)) => {
                let value = decode(&json);
                if value.is_none() {
                    // Corrupted entry; drop it so the next write starts clean
                    self.forget(key).await;
                }
                value
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Redis GET failed for {}: {}", cache_key, e);
                None
            }
        }
    }

    async fn put(&self, key: &str, value: CacheValue, ttl_secs: u64) {
        let cache_key = self.build_key(key);
        let Some(json) = encode(&value) else {
            return;
        };

        debug!("Cache SET: {} (TTL: {}s)", cache_key, ttl_secs);

        let mut conn = self.connection.clone();
        let result: RedisResult<()> = if ttl_secs == 0 {
            // Redis rejects SETEX with a zero TTL; a zero TTL means "do not keep"
            conn.del(&cache_key).await
        } else {
            conn.set_ex(&cache_key, json, ttl_secs).await
        };

        if let Err(e) = result {
            warn!("Redis SET failed for {}: {}", cache_key, e);
        }
    }

    async fn forget(&self, key: &str) {
        let cache_key = self.build_key(key);
        debug!("Cache DELETE: {}", cache_key);

        let mut conn = self.connection.clone();
        let result: RedisResult<()> = conn.del(&cache_key).await;
        if let Err(e) = result {
            warn!("Redis DELETE failed for {}: {}", cache_key, e);
        }
    }

    async fn flush(&self) {
        let pattern = self.build_key("*");
        info!("Cache FLUSH pattern: {}", pattern);

        let mut conn = self.connection.clone();
        let result: RedisResult<Vec<String>> = conn.keys(&pattern).await;
        let keys = match result {
            Ok(keys) => keys,
            Err(e) => {
                error!("Redis KEYS failed: {}", e);
                return;
            }
        };

        if keys.is_empty() {
            return;
        }

        let result: RedisResult<u64> = conn.del(&keys).await;
        match result {
            Ok(deleted) => info!("Cache flushed {} keys matching {}", deleted, pattern),
            Err(e) => error!("Redis DELETE multiple keys failed: {}", e),
        }
    }
}
