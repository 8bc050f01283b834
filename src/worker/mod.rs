/// Worker executor - serves sync requests published by the master
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::context::AppContext;
use crate::error::{Result, SyncError};
use crate::events::{register, Event, EventBus, EventHandler, EventPayload, EventType};
use crate::utils::RecentKeys;

pub mod handlers;

pub use handlers::SyncRequest;

/// Remembered request keys for redelivery detection
const SEEN_CAPACITY: usize = 4096;

pub struct Worker {
    ctx: AppContext,
    account: String,
    seen: Mutex<RecentKeys>,
}

impl Worker {
    pub fn new(ctx: AppContext) -> Self {
        let account = ctx.config.worker.account.clone();
        Worker {
            ctx,
            account,
            seen: Mutex::new(RecentKeys::with_capacity(SEEN_CAPACITY)),
        }
    }

    /// Subscribe to every request kind and start the heartbeat.
    /// A worker without any quotes fetcher cannot start.
    pub async fn start(self: Arc<Self>) -> Result<Vec<JoinHandle<()>>> {
        if self.ctx.fetchers.is_empty() {
            return Err(SyncError::NoFetcherAvailable);
        }

        let mut handles = Vec::new();
        for kind in EventType::REQUESTS {
            let worker = Arc::clone(&self);
            let handler: EventHandler = Arc::new(move |event| {
                let worker = Arc::clone(&worker);
                Box::pin(async move { worker.handle(event).await })
            });
            handles.push(register(self.ctx.bus.as_ref(), kind, handler).await?);
        }
        handles.push(self.spawn_heartbeat());

        info!(
            "👷 Worker {} started with {} fetcher(s)",
            self.account,
            self.ctx.fetchers.len()
        );
        Ok(handles)
    }

    /// Serve one request. Failures are reported to the dispatcher before returning.
    pub async fn handle(&self, event: Event) -> Result<()> {
        if !self.seen.lock().await.insert(&event.idempotency_key) {
            debug!("Duplicate delivery of {} ignored", event.idempotency_key);
            return Ok(());
        }

        let req = SyncRequest::from_event(&event)?;
        info!(
            "📥 {} task={} run={} end={}",
            event.event_type.as_str(),
            req.task,
            req.run_id,
            req.end
        );

        let result = match event.event_type {
            EventType::DoSyncSecurityList => handlers::sync_security_list(&self.ctx, &self.account, &req).await,
            EventType::DoSyncTradePriceLimits => {
                handlers::sync_trade_price_limits(&self.ctx, &self.account, &req).await
            }
            EventType::DoSyncCalendar => handlers::sync_calendar(&self.ctx, &self.account, &req).await,
            _ => handlers::sync_bars(&self.ctx, &self.account, &req).await,
        };

        if let Err(e) = &result {
            error!("Request {} of run {} failed: {} ({})", req.task, req.run_id, e, e.error_code());
            let failed = Event::new(
                EventType::SyncFailed,
                EventPayload::SyncFailed {
                    task: req.task.clone(),
                    run_id: req.run_id.clone(),
                    reason: e.to_string(),
                    worker: self.account.clone(),
                },
            );
            if let Err(publish_err) = self.ctx.bus.publish(failed).await {
                warn!("Could not report failure of {}: {}", req.task, publish_err);
            }
        }
        result
    }

    pub async fn heart_beat(&self) -> Result<()> {
        let fetcher = self.ctx.fetchers.primary()?;
        let quota = match fetcher.get_quota().await {
            Ok(quota) => quota,
            Err(e) => {
                warn!("Could not read quota of {}: {}", fetcher.impl_name(), e);
                None
            }
        };

        self.ctx
            .bus
            .publish(Event::new(
                EventType::HeartBeat,
                EventPayload::HeartBeat {
                    account: self.account.clone(),
                    impl_name: fetcher.impl_name().to_string(),
                    time: Utc::now(),
                    quota,
                },
            ))
            .await
    }

    fn spawn_heartbeat(self: &Arc<Self>) -> JoinHandle<()> {
        let worker = Arc::clone(self);
        let every = Duration::from_secs(self.ctx.config.worker.heartbeat_interval_secs);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                if let Err(e) = worker.heart_beat().await {
                    warn!("Heartbeat failed: {}", e);
                }
            }
        })
    }
}
