/// Redis-backed cache shared by master and worker processes
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::num::NonZeroUsize;
use std::time::Duration;
use tracing::debug;

use super::Cache;
use crate::error::Result;

const DELETE_IF_EQ: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end
"#;

#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(dsn: &str) -> Result<Self> {
        let client = redis::Client::open(dsn)?;
        let manager = ConnectionManager::new(client).await?;
        debug!("Connected cache to {}", dsn);
        Ok(Self { manager })
    }

    fn ttl_secs(ttl: Duration) -> u64 {
        ttl.as_secs().max(1)
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.manager.clone();
        match ttl {
            Some(ttl) => {
                let _: () = conn.set_ex(key, value, Self::ttl_secs(ttl)).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.manager.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(Self::ttl_secs(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.manager.clone();
        let value: i64 = conn.incr(key, delta).await?;
        Ok(value)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.expire(key, Self::ttl_secs(ttl) as i64).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn delete_if_eq(&self, key: &str, value: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        let removed: i64 = redis::Script::new(DELETE_IF_EQ)
            .key(key)
            .arg(value)
            .invoke_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn rpush(&self, key: &str, values: &[String]) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let mut conn = self.manager.clone();
        let _: () = conn.rpush(key, values).await?;
        Ok(())
    }

    async fn lpop(&self, key: &str, count: usize) -> Result<Vec<String>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.manager.clone();
        let popped: Vec<String> = conn.lpop(key, NonZeroUsize::new(count)).await?;
        Ok(popped)
    }

    async fn llen(&self, key: &str) -> Result<usize> {
        let mut conn = self.manager.clone();
        let len: usize = conn.llen(key).await?;
        Ok(len)
    }
}
