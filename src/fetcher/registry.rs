/// Round-robin registry of configured fetcher instances
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

use super::{CsvQuotesFetcher, QuotesFetcher};
use crate::error::{Result, SyncError};
use crate::types::FetcherConfig;

#[derive(Default)]
pub struct FetcherRegistry {
    instances: Vec<Arc<dyn QuotesFetcher>>,
    next: AtomicUsize,
}

impl FetcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one instance per `[[fetchers]]` entry; unknown `impl` is fatal
    pub fn from_config(configs: &[FetcherConfig]) -> Result<Self> {
        let mut registry = Self::new();
        for cfg in configs {
            let instance: Arc<dyn QuotesFetcher> = match cfg.impl_name.as_str() {
                "csv" => Arc::new(CsvQuotesFetcher::from_config(cfg)?),
                other => return Err(SyncError::UnknownFetcher(other.to_string())),
            };
            registry.register(instance);
        }
        Ok(registry)
    }

    pub fn register(&mut self, instance: Arc<dyn QuotesFetcher>) {
        info!("Added quotes fetcher implementor: {}", instance.impl_name());
        self.instances.push(instance);
    }

    /// Next instance in rotation
    pub fn get_instance(&self) -> Result<Arc<dyn QuotesFetcher>> {
        if self.instances.is_empty() {
            return Err(SyncError::NoFetcherAvailable);
        }
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.instances.len();
        Ok(Arc::clone(&self.instances[i]))
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// First registered instance, outside the rotation
    pub fn primary(&self) -> Result<Arc<dyn QuotesFetcher>> {
        self.instances
            .first()
            .map(Arc::clone)
            .ok_or(SyncError::NoFetcherAvailable)
    }
}
