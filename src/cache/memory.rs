/// In-process cache for single-process deployments and tests
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::Cache;
use crate::error::{Result, SyncError};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    List(VecDeque<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Cache backed by a mutex-guarded map; TTLs follow tokio's clock
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn live<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
        let now = Instant::now();
        if entries.get(key).is_some_and(|e| !e.is_live(now)) {
            entries.remove(key);
        }
        entries.get_mut(key)
    }

    /// Drop every expired entry
    fn sweep(entries: &mut HashMap<String, Entry>) {
        let now = Instant::now();
        entries.retain(|_, e| e.is_live(now));
    }

    fn wrong_type(key: &str) -> SyncError {
        SyncError::CacheError(format!("WRONGTYPE operation against key {}", key))
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        match Self::live(&mut entries, key) {
            Some(Entry { value: Value::Str(s), .. }) => Ok(Some(s.clone())),
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut entries = self.entries.lock().await;
        Self::sweep(&mut entries);
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        Self::sweep(&mut entries);
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut entries = self.entries.lock().await;
        let (current, expires_at) = match Self::live(&mut entries, key) {
            Some(Entry { value: Value::Str(s), expires_at }) => {
                let n = s.parse::<i64>().map_err(|_| {
                    SyncError::CacheError(format!("value at {} is not an integer", key))
                })?;
                (n, *expires_at)
            }
            Some(_) => return Err(Self::wrong_type(key)),
            None => (0, None),
        };

        let updated = current + delta;
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(updated.to_string()),
                expires_at,
            },
        );
        Ok(updated)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock().await;
        Self::sweep(&mut entries);
        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn delete_if_eq(&self, key: &str, value: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let matches = matches!(
            Self::live(&mut entries, key),
            Some(Entry { value: Value::Str(s), .. }) if s.as_str() == value
        );
        if matches {
            entries.remove(key);
        }
        Ok(matches)
    }

    async fn rpush(&self, key: &str, values: &[String]) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if Self::live(&mut entries, key).is_none() {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::List(VecDeque::new()),
                    expires_at: None,
                },
            );
        }
        match entries.get_mut(key) {
            Some(Entry { value: Value::List(list), .. }) => {
                list.extend(values.iter().cloned());
                Ok(())
            }
            _ => Err(Self::wrong_type(key)),
        }
    }

    async fn lpop(&self, key: &str, count: usize) -> Result<Vec<String>> {
        let mut entries = self.entries.lock().await;
        let popped = match Self::live(&mut entries, key) {
            Some(Entry { value: Value::List(list), .. }) => {
                let n = count.min(list.len());
                list.drain(..n).collect::<Vec<_>>()
            }
            Some(_) => return Err(Self::wrong_type(key)),
            None => return Ok(Vec::new()),
        };

        // Redis drops a list once it is empty
        if matches!(entries.get(key), Some(Entry { value: Value::List(l), .. }) if l.is_empty()) {
            entries.remove(key);
        }
        Ok(popped)
    }

    async fn llen(&self, key: &str) -> Result<usize> {
        let mut entries = self.entries.lock().await;
        match Self::live(&mut entries, key) {
            Some(Entry { value: Value::List(list), .. }) => Ok(list.len()),
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(0),
        }
    }
}
