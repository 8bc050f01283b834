/// Shared key/value state between master and worker processes
use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

pub mod memory;
pub mod redis_cache;

pub use memory::MemoryCache;
pub use redis_cache::RedisCache;

/// Atomic single-key operations over string values and string lists.
///
/// Every mutation touches exactly one key so that cursors, quota counters
/// and running-task markers stay consistent without transactions.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Set `key` only if it does not exist yet. Returns true when the value was written.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete `key` only while it still holds `value`. Returns true when deleted.
    async fn delete_if_eq(&self, key: &str, value: &str) -> Result<bool>;

    async fn rpush(&self, key: &str, values: &[String]) -> Result<()>;

    /// Pop up to `count` items from the head of a list
    async fn lpop(&self, key: &str, count: usize) -> Result<Vec<String>>;

    async fn llen(&self, key: &str) -> Result<usize>;
}
