/// Process context shared by jobs, dispatcher and worker handlers
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{Cache, MemoryCache, RedisCache};
use crate::data::{BarStore, JsonlBarStore};
use crate::error::Result;
use crate::events::{EventBus, LocalEventBus, RedisEventBus};
use crate::fetcher::FetcherRegistry;
use crate::sync::{load_cached_calendar, CursorStore};
use crate::time::{ExchangeCalendar, TradingCalendar};
use crate::types::{BackendKind, Config};

/// Everything a component needs, built once at start and passed down
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub cache: Arc<dyn Cache>,
    pub bus: Arc<dyn EventBus>,
    pub calendar: Arc<dyn TradingCalendar>,
    pub fetchers: Arc<FetcherRegistry>,
    pub store: Arc<dyn BarStore>,
}

impl AppContext {
    /// Build the context for the configured backend
    pub async fn connect(config: Config) -> Result<Self> {
        let (cache, bus): (Arc<dyn Cache>, Arc<dyn EventBus>) = match config.backend.kind {
            BackendKind::Redis => {
                let dsn = &config.backend.redis_dsn;
                let cache = RedisCache::connect(dsn).await?;
                let bus = RedisEventBus::connect(dsn).await?;
                info!("Connected to redis at {}", dsn);
                (Arc::new(cache), Arc::new(bus))
            }
            BackendKind::Memory => {
                info!("Using in-process cache and event bus");
                (Arc::new(MemoryCache::new()), Arc::new(LocalEventBus::new()))
            }
        };
        let ctx = Self::assemble(config, cache, bus)?;

        if let Err(e) = load_cached_calendar(ctx.cache.as_ref(), ctx.calendar.as_ref()).await {
            warn!("Cached trading calendar unusable, using holiday table: {}", e);
        }
        Ok(ctx)
    }

    /// In-process backends regardless of configuration
    pub fn in_memory(config: Config) -> Result<Self> {
        Self::assemble(config, Arc::new(MemoryCache::new()), Arc::new(LocalEventBus::new()))
    }

    fn assemble(config: Config, cache: Arc<dyn Cache>, bus: Arc<dyn EventBus>) -> Result<Self> {
        let calendar = ExchangeCalendar::from_config(&config)?;
        let fetchers = FetcherRegistry::from_config(&config.fetchers)?;
        let store = JsonlBarStore::new(config.store.dir.clone());

        Ok(AppContext {
            config: Arc::new(config),
            cache,
            bus,
            calendar: Arc::new(calendar),
            fetchers: Arc::new(fetchers),
            store: Arc::new(store),
        })
    }

    /// Replace the configured fetchers
    pub fn with_fetchers(mut self, fetchers: FetcherRegistry) -> Self {
        self.fetchers = Arc::new(fetchers);
        self
    }

    pub fn cursors(&self) -> CursorStore {
        CursorStore::new(Arc::clone(&self.cache))
    }
}
