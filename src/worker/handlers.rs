/// Request handlers: fetch, store, acknowledge
use chrono::NaiveDateTime;
use std::time::Duration;
use tracing::{debug, info};

use crate::cache::Cache;
use crate::context::AppContext;
use crate::data::BarStore;
use crate::error::{Result, SyncError};
use crate::events::{Event, EventBus, EventPayload, EventType};
use crate::fetcher::QuotesFetcher;
use crate::sync::{cache_security_list, cache_trade_days};
use crate::sync::keys::trade_price_limit_key;
use crate::types::FrameSpec;

/// Fields of a `SyncRequest` payload
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub task: String,
    pub run_id: String,
    pub frames: Vec<FrameSpec>,
    pub end: NaiveDateTime,
    pub scope_key: Option<String>,
    pub quota_key: String,
}

impl SyncRequest {
    pub fn from_event(event: &Event) -> Result<Self> {
        match &event.payload {
            EventPayload::SyncRequest {
                task,
                run_id,
                frames,
                end,
                scope_key,
                quota_key,
                ..
            } => Ok(SyncRequest {
                task: task.clone(),
                run_id: run_id.clone(),
                frames: frames.clone(),
                end: *end,
                scope_key: scope_key.clone(),
                quota_key: quota_key.clone(),
            }),
            other => Err(SyncError::EventHandlerError(format!(
                "{} carries no sync request: {:?}",
                event.event_type.as_str(),
                other
            ))),
        }
    }
}

/// Drain the run's scope list batch by batch, fetching every frame type per code
pub async fn sync_bars(ctx: &AppContext, worker: &str, req: &SyncRequest) -> Result<()> {
    let scope_key = req
        .scope_key
        .as_deref()
        .ok_or_else(|| SyncError::InvalidParameter(format!("{} request without scope", req.task)))?;
    let batch_size = ctx.config.worker.batch_size;

    loop {
        let codes = ctx.cache.lpop(scope_key, batch_size).await?;
        if codes.is_empty() {
            break;
        }

        let fetcher = ctx.fetchers.get_instance()?;
        let mut records = 0;
        for code in &codes {
            for spec in &req.frames {
                let bars = fetcher
                    .get_bars(code, req.end, spec.n_bars, spec.frame_type)
                    .await?;
                if bars.is_empty() {
                    debug!("No {} bars for {} up to {}", spec.frame_type, code, req.end);
                }
                records += ctx.store.save_bars(code, spec.frame_type, &bars).await?;
            }
        }

        let processed = (codes.len() * req.frames.len()) as u64;
        ack(ctx, worker, req, processed, records as u64).await?;
    }

    Ok(())
}

pub async fn sync_security_list(ctx: &AppContext, worker: &str, req: &SyncRequest) -> Result<()> {
    let securities = ctx.fetchers.get_instance()?.get_security_list().await?;
    if securities.is_empty() {
        return Err(SyncError::FetchFailed("quotes fetcher returned an empty security list".to_string()));
    }

    cache_security_list(ctx.cache.as_ref(), &securities).await?;
    info!("📋 Security list updated: {} entries", securities.len());
    ack(ctx, worker, req, 1, securities.len() as u64).await
}

pub async fn sync_trade_price_limits(ctx: &AppContext, worker: &str, req: &SyncRequest) -> Result<()> {
    let date = req.end.date();
    let limits = ctx.fetchers.get_instance()?.get_trade_price_limits(date).await?;

    for limit in &limits {
        let value = format!("{},{}", limit.high_limit, limit.low_limit);
        ctx.cache
            .set(&trade_price_limit_key(date, &limit.code), &value, None)
            .await?;
    }
    let stored = ctx.store.save_price_limits(date, &limits).await?;

    info!("Trade price limits of {} synced: {}", date, stored);
    ack(ctx, worker, req, 1, stored as u64).await
}

pub async fn sync_calendar(ctx: &AppContext, worker: &str, req: &SyncRequest) -> Result<()> {
    let days = ctx.fetchers.get_instance()?.get_all_trade_days().await?;
    if days.is_empty() {
        return Err(SyncError::FetchFailed("quotes fetcher returned no trading days".to_string()));
    }

    cache_trade_days(ctx.cache.as_ref(), &days).await?;
    info!("📅 Trading calendar updated: {} days", days.len());
    ack(ctx, worker, req, 1, days.len() as u64).await
}

/// Count progress toward the run's quota, then tell the dispatcher
async fn ack(ctx: &AppContext, worker: &str, req: &SyncRequest, processed: u64, records: u64) -> Result<()> {
    ctx.cache.incr_by(&req.quota_key, processed as i64).await?;
    ctx.cache
        .expire(&req.quota_key, Duration::from_secs(ctx.config.jobs.quota_ttl_secs))
        .await?;

    ctx.bus
        .publish(Event::new(
            EventType::SyncProgress,
            EventPayload::SyncProgress {
                task: req.task.clone(),
                run_id: req.run_id.clone(),
                processed,
                records,
                worker: worker.to_string(),
            },
        ))
        .await
}
