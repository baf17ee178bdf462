//! Cache layer
//!
//! Read-through caching and rate limiting on top of a key/value backend.
//! Every operation degrades gracefully: when no backend is configured or
//! the backend fails, reads miss, writes are dropped and the rate limiter
//! lets the request through. Errors are logged, never returned.

pub mod memory;
pub mod redis_backend;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

pub use memory::MemoryBackend;
pub use redis_backend::RedisBackend;

/// Cache keys per resource
pub mod keys {
    /// Prefix shared by every list and aggregate view
    pub const THREATS_PREFIX: &str = "threats:";
    pub const STATISTICS: &str = "threats:statistics";

    pub fn threats_list(limit: i64) -> String {
        format!("threats:list:{}", limit)
    }

    pub fn threat_detail(id: i64) -> String {
        format!("threat:{}", id)
    }

    pub fn trends(days: i32) -> String {
        format!("threats:trends:{}", days)
    }

    pub fn rate_limit(identifier: &str) -> String {
        format!("ratelimit:{}", identifier)
    }
}

/// TTL per resource type
pub mod ttl {
    use std::time::Duration;

    pub const THREATS_LIST: Duration = Duration::from_secs(30);
    pub const THREAT_DETAIL: Duration = Duration::from_secs(60);
    pub const STATISTICS: Duration = Duration::from_secs(60);
    pub const TRENDS: Duration = Duration::from_secs(300);
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Raw key/value primitives a cache backend must provide
#[async_trait]
pub trait CacheBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Delete every key starting with `prefix`, returns how many were removed
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError>;

    /// Atomically increment a counter, creating it at 1 when absent
    async fn incr(&self, key: &str) -> Result<i64, CacheError>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError>;
}

/// Shared cache handle, cheap to clone
#[derive(Clone, Default)]
pub struct Cache {
    backend: Option<Arc<dyn CacheBackend>>,
}

impl Cache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend: Some(backend) }
    }

    /// No backend: every read misses, every write is a no-op
    pub fn disabled() -> Self {
        Self { backend: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.as_ref().map(|b| b.name()).unwrap_or("disabled")
    }

    pub async fn get_cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let backend = self.backend.as_ref()?;

        let raw = match backend.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Cache get error for {}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Discarding undecodable cache entry {}: {}", key, e);
                None
            }
        }
    }

    pub async fn set_cached<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) {
        let Some(backend) = &self.backend else {
            return;
        };

        let result = match serde_json::to_string(value) {
            Ok(raw) => backend.set(key, raw, ttl).await,
            Err(e) => Err(e.into()),
        };

        if let Err(e) = result {
            tracing::warn!("Cache set error for {}: {}", key, e);
        }
    }

    pub async fn delete_cached(&self, key: &str) {
        let Some(backend) = &self.backend else {
            return;
        };

        if let Err(e) = backend.delete(key).await {
            tracing::warn!("Cache delete error for {}: {}", key, e);
        }
    }

    pub async fn invalidate_prefix(&self, prefix: &str) {
        let Some(backend) = &self.backend else {
            return;
        };

        match backend.delete_prefix(prefix).await {
            Ok(count) => tracing::debug!("Invalidated {} cache entries under {}", count, prefix),
            Err(e) => tracing::warn!("Cache invalidate error for {}: {}", prefix, e),
        }
    }

    /// Fixed-window limiter: allowed while the window's counter is <= `limit`.
    /// Fails open when the backend is missing or errors.
    pub async fn check_rate_limit(&self, identifier: &str, limit: i64, window: Duration) -> bool {
        let Some(backend) = &self.backend else {
            return true;
        };

        let key = keys::rate_limit(identifier);
        let current = match backend.incr(&key).await {
            Ok(current) => current,
            Err(e) => {
                tracing::warn!("Rate limit error for {}: {}", identifier, e);
                return true;
            }
        };

        // First hit opens the window. A counter left without a TTL would never
        // reset, so drop it and let the request through.
        if current == 1 {
            if let Err(e) = backend.expire(&key, window).await {
                tracing::warn!("Rate limit expiry error for {}: {}", identifier, e);
                if let Err(e) = backend.delete(&key).await {
                    tracing::warn!("Rate limit cleanup error for {}: {}", identifier, e);
                }
                return true;
            }
        }

        current <= limit
    }
}
