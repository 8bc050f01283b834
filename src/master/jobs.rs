/// Master jobs - decide what to sync, dispatch it, advance cursors on success
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::context::AppContext;
use crate::error::Result;
use crate::events::{Event, EventBus, EventPayload, EventType};
use crate::sync::{compute_window, load_cached_calendar, BarsSyncTask, CursorKey, TaskOutcome};
use crate::time::TradingCalendar;
use crate::types::{FrameSpec, FrameType};

/// `(task name, outcome)` of every task a job ran
pub type JobOutcomes = Vec<(String, TaskOutcome)>;

const CALENDAR_FRAMES: [FrameType; 4] = [FrameType::Week, FrameType::Month, FrameType::Quarter, FrameType::Year];
const SUB_DAY_FRAMES: [FrameType; 4] = [FrameType::Min5, FrameType::Min15, FrameType::Min30, FrameType::Min60];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    SyncMinuteBars,
    AfterHourSync,
    SyncMin5To60,
    SyncYearQuarterMonthWeek,
    DailyCalibration,
    SyncSecurityList,
    SyncTradePriceLimits,
    SyncCalendar,
}

impl JobKind {
    pub fn name(&self) -> &str {
        match self {
            JobKind::SyncMinuteBars => "sync_minute_bars",
            JobKind::AfterHourSync => "after_hour_sync",
            JobKind::SyncMin5To60 => "sync_min_5_15_30_60",
            JobKind::SyncYearQuarterMonthWeek => "sync_year_quarter_month_week",
            JobKind::DailyCalibration => "daily_calibration_sync",
            JobKind::SyncSecurityList => "sync_security_list",
            JobKind::SyncTradePriceLimits => "sync_trade_price_limits",
            JobKind::SyncCalendar => "sync_calendar",
        }
    }
}

/// Run `job` at the calendar's current time and report anything abnormal
pub async fn run_job(ctx: &AppContext, job: JobKind) {
    let now = ctx.calendar.now();
    let result = match job {
        JobKind::SyncMinuteBars => sync_minute_bars(ctx, now).await,
        JobKind::AfterHourSync => after_hour_sync(ctx, now).await,
        JobKind::SyncMin5To60 => sync_min_5_15_30_60(ctx, now).await,
        JobKind::SyncYearQuarterMonthWeek => sync_year_quarter_month_week(ctx, now).await,
        JobKind::DailyCalibration => daily_calibration_sync(ctx, now).await,
        JobKind::SyncSecurityList => sync_security_list(ctx, now).await,
        JobKind::SyncTradePriceLimits => sync_trade_price_limits(ctx, now).await,
        JobKind::SyncCalendar => sync_calendar(ctx, now).await,
    };

    match result {
        Ok(outcomes) => {
            for (task, outcome) in outcomes {
                match outcome {
                    TaskOutcome::TimedOut => {
                        report_abnormal(ctx, job.name(), &format!("task {} timed out", task)).await
                    }
                    TaskOutcome::Failed(reason) => {
                        report_abnormal(ctx, job.name(), &format!("task {} failed: {}", task, reason)).await
                    }
                    TaskOutcome::Succeeded | TaskOutcome::Skipped => {}
                }
            }
        }
        Err(e) => report_abnormal(ctx, job.name(), &format!("{} ({})", e, e.error_code())).await,
    }
}

/// Log at error and publish a `MasterReport` for operators
pub async fn report_abnormal(ctx: &AppContext, job: &str, reason: &str) {
    error!("🚨 Job {} abnormal: {}", job, reason);

    let report = Event::new(
        EventType::MasterReport,
        EventPayload::MasterReport {
            job: job.to_string(),
            reason: reason.to_string(),
        },
    );
    if let Err(e) = ctx.bus.publish(report).await {
        warn!("Failed to publish report for {}: {}", job, e);
    }
}

fn day_start(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Number of `frame_type` frames in one full session
fn frames_per_session(calendar: &dyn TradingCalendar, date: NaiveDate, frame_type: FrameType) -> usize {
    calendar.count_frames(
        calendar.first_min_frame(date, frame_type),
        calendar.last_min_frame(date),
        frame_type,
    )
}

/// Intraday minute task covering everything after the minute cursor
pub async fn get_sync_minute_bars_task(ctx: &AppContext, now: NaiveDateTime) -> Result<Option<BarsSyncTask>> {
    let tail = ctx.cursors().get(CursorKey::BarsTail(FrameType::Min1)).await?;
    let Some(window) = compute_window(now, tail, ctx.calendar.as_ref(), FrameType::Min1) else {
        info!("No minute bars to sync at {}", now);
        return Ok(None);
    };

    let per_frame = Duration::from_secs(ctx.config.jobs.minute_timeout_per_frame_secs);
    Ok(Some(BarsSyncTask::new(
        "minute",
        EventType::DoSyncMin,
        vec![FrameSpec::new(FrameType::Min1, window.n_frames)],
        window.end,
        window.timeout(per_frame),
    )))
}

pub async fn run_sync_minute_bars_task(ctx: &AppContext, task: &mut BarsSyncTask) -> Result<TaskOutcome> {
    let outcome = task.run(ctx).await?;
    if outcome.is_success() {
        ctx.cursors()
            .advance(CursorKey::BarsTail(FrameType::Min1), task.end)
            .await?;
    }
    Ok(outcome)
}

pub async fn sync_minute_bars(ctx: &AppContext, now: NaiveDateTime) -> Result<JobOutcomes> {
    let Some(mut task) = get_sync_minute_bars_task(ctx, now).await? else {
        return Ok(Vec::new());
    };
    let outcome = run_sync_minute_bars_task(ctx, &mut task).await?;
    Ok(vec![(task.name, outcome)])
}

/// After the close: today's full minute series plus the day bars still missing
pub async fn after_hour_sync(ctx: &AppContext, now: NaiveDateTime) -> Result<JobOutcomes> {
    let calendar = ctx.calendar.as_ref();
    let today = now.date();
    if !calendar.is_trade_day(today) {
        info!("{} is not a trading day, no after-hour sync", today);
        return Ok(Vec::new());
    }

    let tail = ctx.cursors().get(CursorKey::BarsTail(FrameType::Day)).await?;
    let Some(window) = compute_window(now, tail, calendar, FrameType::Day) else {
        info!("Session not closed or day bars already synced at {}", now);
        return Ok(Vec::new());
    };

    let close = calendar.session_close(today);
    let mut task = BarsSyncTask::new(
        "day",
        EventType::DoSyncDay,
        vec![
            FrameSpec::new(FrameType::Min1, frames_per_session(calendar, today, FrameType::Min1)),
            FrameSpec::new(FrameType::Day, window.n_frames),
        ],
        close,
        Duration::from_secs(ctx.config.jobs.after_hour_timeout_secs),
    );

    let outcome = task.run(ctx).await?;
    if outcome.is_success() {
        let cursors = ctx.cursors();
        cursors.advance(CursorKey::BarsTail(FrameType::Day), window.end).await?;
        cursors.advance(CursorKey::BarsTail(FrameType::Min1), close).await?;
    }
    Ok(vec![(task.name, outcome)])
}

/// 5/15/30/60-minute bars of the last closed session, one task for all four
pub async fn sync_min_5_15_30_60(ctx: &AppContext, now: NaiveDateTime) -> Result<JobOutcomes> {
    let calendar = ctx.calendar.as_ref();
    let anchor = calendar.last_session_close(now);
    let cursors = ctx.cursors();

    let mut frames = Vec::new();
    for frame_type in SUB_DAY_FRAMES {
        let tail = cursors.get(CursorKey::BarsTail(frame_type)).await?;
        if let Some(window) = compute_window(anchor, tail, calendar, frame_type) {
            frames.push(FrameSpec::new(frame_type, window.n_frames));
        }
    }
    if frames.is_empty() {
        info!("5m-60m bars already synced up to {}", anchor);
        return Ok(Vec::new());
    }

    let mut task = BarsSyncTask::new(
        "min_5_15_30_60",
        EventType::DoSyncDay,
        frames,
        anchor,
        Duration::from_secs(ctx.config.jobs.calendar_frames_timeout_secs),
    );

    let outcome = task.run(ctx).await?;
    if outcome.is_success() {
        for spec in &task.frames {
            cursors.advance(CursorKey::BarsTail(spec.frame_type), anchor).await?;
        }
    }
    Ok(vec![(task.name, outcome)])
}

/// One task per week/month/quarter/year stream with a pending window
pub async fn sync_year_quarter_month_week(ctx: &AppContext, now: NaiveDateTime) -> Result<JobOutcomes> {
    let calendar = ctx.calendar.as_ref();
    // runs at night, so windows are computed at the close of the last session
    let anchor = calendar.last_session_close(now);
    let cursors = ctx.cursors();
    let mut outcomes = Vec::new();

    for frame_type in CALENDAR_FRAMES {
        let cursor = CursorKey::BarsTail(frame_type);
        let tail = cursors.get(cursor).await?;
        let Some(window) = compute_window(anchor, tail, calendar, frame_type) else {
            continue;
        };

        let mut task = BarsSyncTask::new(
            frame_type.cursor_name(),
            EventType::DoSyncYearQuarterMonthWeek,
            vec![FrameSpec::new(frame_type, window.n_frames)],
            window.end,
            Duration::from_secs(ctx.config.jobs.calendar_frames_timeout_secs),
        );

        let outcome = task.run(ctx).await?;
        if outcome.is_success() {
            cursors.advance(cursor, window.end).await?;
        }
        outcomes.push((task.name, outcome));
    }

    Ok(outcomes)
}

/// Re-sync whole past sessions behind the archive tail, oldest first.
/// Stops at the first day that does not succeed.
pub async fn daily_calibration_sync(ctx: &AppContext, now: NaiveDateTime) -> Result<JobOutcomes> {
    let calendar = ctx.calendar.as_ref();
    let target = calendar.last_session_close(now).date();
    let cursors = ctx.cursors();

    let mut day = match cursors.get(CursorKey::ArchiveTail).await? {
        Some(tail) => calendar.next_trade_day(tail.date()),
        None => target,
    };

    let mut outcomes = Vec::new();
    while day <= target {
        let mut task = BarsSyncTask::new(
            "calibration",
            EventType::DoSyncDay,
            vec![
                FrameSpec::new(FrameType::Min1, frames_per_session(calendar, day, FrameType::Min1)),
                FrameSpec::new(FrameType::Day, 1),
            ],
            calendar.session_close(day),
            Duration::from_secs(ctx.config.jobs.after_hour_timeout_secs),
        );

        let outcome = task.run(ctx).await?;
        let succeeded = outcome.is_success();
        outcomes.push((task.name, outcome));
        if !succeeded {
            break;
        }

        cursors.advance(CursorKey::ArchiveTail, day_start(day)).await?;
        if cursors.get(CursorKey::ArchiveHead).await?.is_none() {
            cursors.reset(CursorKey::ArchiveHead, day_start(day)).await?;
        }
        info!("📦 Calibrated {}", day);
        day = calendar.next_trade_day(day);
    }

    Ok(outcomes)
}

pub async fn sync_security_list(ctx: &AppContext, now: NaiveDateTime) -> Result<JobOutcomes> {
    let mut task = BarsSyncTask::new(
        "security_list",
        EventType::DoSyncSecurityList,
        Vec::new(),
        now,
        Duration::from_secs(ctx.config.jobs.security_list_timeout_secs),
    )
    .with_expected(1);

    let outcome = task.run(ctx).await?;
    Ok(vec![(task.name, outcome)])
}

/// Refresh the provider's trading days, then adopt them in this process
pub async fn sync_calendar(ctx: &AppContext, now: NaiveDateTime) -> Result<JobOutcomes> {
    let mut task = BarsSyncTask::new(
        "calendar",
        EventType::DoSyncCalendar,
        Vec::new(),
        now,
        Duration::from_secs(ctx.config.jobs.calendar_sync_timeout_secs),
    )
    .with_expected(1);

    let outcome = task.run(ctx).await?;
    if outcome.is_success() {
        load_cached_calendar(ctx.cache.as_ref(), ctx.calendar.as_ref()).await?;
    }
    Ok(vec![(task.name, outcome)])
}

/// Limits of every trading day after the cursor up to today, oldest first
pub async fn sync_trade_price_limits(ctx: &AppContext, now: NaiveDateTime) -> Result<JobOutcomes> {
    let calendar = ctx.calendar.as_ref();
    let today = now.date();
    if !calendar.is_trade_day(today) {
        info!("{} is not a trading day, no price limits", today);
        return Ok(Vec::new());
    }

    let cursors = ctx.cursors();
    let mut day = match cursors.get(CursorKey::TradePriceTail).await? {
        Some(tail) => calendar.next_trade_day(tail.date()),
        None => today,
    };

    let mut outcomes = Vec::new();
    while day <= today {
        let mut task = BarsSyncTask::new(
            "trade_price_limits",
            EventType::DoSyncTradePriceLimits,
            vec![FrameSpec::new(FrameType::Day, 1)],
            day_start(day),
            Duration::from_secs(ctx.config.jobs.price_limit_timeout_secs),
        )
        .with_expected(1);

        let outcome = task.run(ctx).await?;
        let succeeded = outcome.is_success();
        outcomes.push((task.name, outcome));
        if !succeeded {
            break;
        }

        cursors.advance(CursorKey::TradePriceTail, day_start(day)).await?;
        day = calendar.next_trade_day(day);
    }

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cache;
    use crate::events::Subscription;
    use crate::fetcher::{CsvQuotesFetcher, FetcherRegistry};
    use crate::sync::keys;
    use crate::sync::cache_security_list;
    use crate::types::{parse_frame, Config, Security};
    use crate::worker::Worker;
    use std::sync::Arc;

    fn dt(s: &str) -> NaiveDateTime {
        parse_frame(s).unwrap()
    }

    fn context() -> AppContext {
        AppContext::in_memory(Config::default()).unwrap()
    }

    async fn seed_securities(ctx: &AppContext) {
        cache_security_list(ctx.cache.as_ref(), &[Security::stock("000001.XSHE")])
            .await
            .unwrap();
    }

    /// Context with a running worker over CSV fixtures
    async fn context_with_worker(quotes: &tempfile::TempDir, store: &tempfile::TempDir) -> AppContext {
        tokio::fs::write(
            quotes.path().join("securities.csv"),
            "code,display_name,name,start_date,end_date,type\n\
             000001.XSHE,PAYH,PAYH,1991-04-03,2200-01-01,stock\n",
        )
        .await
        .unwrap();
        tokio::fs::create_dir_all(quotes.path().join("price_limits")).await.unwrap();
        tokio::fs::write(
            quotes.path().join("price_limits").join("2022-02-18.csv"),
            "code,high_limit,low_limit\n000001.XSHE,16.5,13.5\n",
        )
        .await
        .unwrap();

        let mut config = Config::default();
        config.store.dir = store.path().to_path_buf();
        let mut registry = FetcherRegistry::new();
        registry.register(Arc::new(CsvQuotesFetcher::new(quotes.path().to_path_buf())));

        let ctx = AppContext::in_memory(config).unwrap().with_fetchers(registry);
        Arc::new(Worker::new(ctx.clone())).start().await.unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_minute_task_from_cursor() {
        let ctx = context();
        ctx.cursors()
            .advance(CursorKey::BarsTail(FrameType::Min1), dt("2022-02-18 11:29:00"))
            .await
            .unwrap();

        let task = get_sync_minute_bars_task(&ctx, dt("2022-02-18 11:35:20"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.end, dt("2022-02-18 11:35:00"));
        assert_eq!(task.frames, vec![FrameSpec::new(FrameType::Min1, 6)]);
        assert_eq!(task.timeout, Duration::from_secs(360));
    }

    #[tokio::test]
    async fn test_no_minute_task_on_weekend() {
        let ctx = context();
        assert!(get_sync_minute_bars_task(&ctx, dt("2022-02-19 10:00:00"))
            .await
            .unwrap()
            .is_none());
        assert!(sync_minute_bars(&ctx, dt("2022-02-19 10:00:00")).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_minute_sync_advances_cursor_end_to_end() {
        let quotes = tempfile::tempdir().unwrap();
        let store = tempfile::tempdir().unwrap();
        let ctx = context_with_worker(&quotes, &store).await;
        seed_securities(&ctx).await;

        let outcomes = sync_minute_bars(&ctx, dt("2022-02-18 11:35:00")).await.unwrap();
        assert_eq!(outcomes, vec![("minute".to_string(), TaskOutcome::Succeeded)]);
        assert_eq!(
            ctx.cursors().get(CursorKey::BarsTail(FrameType::Min1)).await.unwrap(),
            Some(dt("2022-02-18 11:35:00"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_minute_sync_keeps_cursor() {
        let ctx = context();
        seed_securities(&ctx).await;
        ctx.cursors()
            .advance(CursorKey::BarsTail(FrameType::Min1), dt("2022-02-18 11:29:00"))
            .await
            .unwrap();

        let outcomes = sync_minute_bars(&ctx, dt("2022-02-18 11:30:00")).await.unwrap();
        assert_eq!(outcomes[0].1, TaskOutcome::TimedOut);
        assert_eq!(
            ctx.cursors().get(CursorKey::BarsTail(FrameType::Min1)).await.unwrap(),
            Some(dt("2022-02-18 11:29:00"))
        );
        assert_eq!(ctx.cache.get("master.task.minute.state").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_after_hour_sync_moves_day_and_minute_cursors() {
        let quotes = tempfile::tempdir().unwrap();
        let store = tempfile::tempdir().unwrap();
        let ctx = context_with_worker(&quotes, &store).await;
        seed_securities(&ctx).await;

        assert!(after_hour_sync(&ctx, dt("2022-02-18 14:00:00")).await.unwrap().is_empty());

        let outcomes = after_hour_sync(&ctx, dt("2022-02-18 15:05:00")).await.unwrap();
        assert_eq!(outcomes[0].1, TaskOutcome::Succeeded);

        let cursors = ctx.cursors();
        assert_eq!(
            cursors.get(CursorKey::BarsTail(FrameType::Day)).await.unwrap(),
            Some(dt("2022-02-18"))
        );
        assert_eq!(
            cursors.get(CursorKey::BarsTail(FrameType::Min1)).await.unwrap(),
            Some(dt("2022-02-18 15:00:00"))
        );

        // nothing left for today
        assert!(after_hour_sync(&ctx, dt("2022-02-18 16:00:00")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_after_hour_day_frames_catch_up() {
        let ctx = context();
        seed_securities(&ctx).await;
        ctx.cursors()
            .advance(CursorKey::BarsTail(FrameType::Day), dt("2022-02-16"))
            .await
            .unwrap();
        let mut requests = ctx.bus.subscribe(EventType::DoSyncDay).await.unwrap();

        let job_ctx = ctx.clone();
        let job = tokio::spawn(async move { after_hour_sync(&job_ctx, dt("2022-02-18 15:05:00")).await });

        let event = requests.recv().await.unwrap();
        job.abort();
        match event.payload {
            EventPayload::SyncRequest { frames, end, .. } => {
                assert_eq!(end, dt("2022-02-18 15:00:00"));
                assert_eq!(
                    frames,
                    vec![FrameSpec::new(FrameType::Min1, 330), FrameSpec::new(FrameType::Day, 2)]
                );
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_weekend_run_uses_friday_close() {
        let ctx = context();
        seed_securities(&ctx).await;
        ctx.cursors()
            .advance(CursorKey::BarsTail(FrameType::Week), dt("2022-02-11"))
            .await
            .unwrap();
        for ft in [FrameType::Month, FrameType::Quarter, FrameType::Year] {
            ctx.cursors().advance(CursorKey::BarsTail(ft), dt("2022-01-28")).await.unwrap();
        }
        let mut requests = ctx.bus.subscribe(EventType::DoSyncYearQuarterMonthWeek).await.unwrap();

        let job_ctx = ctx.clone();
        // Saturday 02:05
        let job = tokio::spawn(async move {
            sync_year_quarter_month_week(&job_ctx, dt("2022-02-19 02:05:00")).await
        });

        let event = requests.recv().await.unwrap();
        job.abort();
        match event.payload {
            EventPayload::SyncRequest { task, frames, end, .. } => {
                assert_eq!(task, "week");
                assert_eq!(end, dt("2022-02-18"));
                assert_eq!(frames, vec![FrameSpec::new(FrameType::Week, 1)]);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_security_list_then_price_limits() {
        let quotes = tempfile::tempdir().unwrap();
        let store = tempfile::tempdir().unwrap();
        let ctx = context_with_worker(&quotes, &store).await;

        let outcomes = sync_security_list(&ctx, dt("2022-02-18 09:00:00")).await.unwrap();
        assert_eq!(outcomes[0].1, TaskOutcome::Succeeded);
        assert!(ctx.cache.get(keys::SECURITIES).await.unwrap().is_some());

        let outcomes = sync_trade_price_limits(&ctx, dt("2022-02-18 09:31:00")).await.unwrap();
        assert_eq!(outcomes, vec![("trade_price_limits".to_string(), TaskOutcome::Succeeded)]);
        assert_eq!(
            ctx.cursors().get(CursorKey::TradePriceTail).await.unwrap(),
            Some(dt("2022-02-18"))
        );
        assert_eq!(
            ctx.cache
                .get("trade_price_limits:2022-02-18:000001.XSHE")
                .await
                .unwrap()
                .as_deref(),
            Some("16.5,13.5")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_calendar_sync_closes_unlisted_days() {
        let quotes = tempfile::tempdir().unwrap();
        let store = tempfile::tempdir().unwrap();
        let ctx = context_with_worker(&quotes, &store).await;
        // provider closes Monday 2022-02-21
        tokio::fs::write(
            quotes.path().join("calendar.csv"),
            "date\n2022-02-17\n2022-02-18\n2022-02-22\n",
        )
        .await
        .unwrap();
        let monday = NaiveDate::from_ymd_opt(2022, 2, 21).unwrap();
        assert!(ctx.calendar.is_trade_day(monday));

        let outcomes = sync_calendar(&ctx, dt("2022-02-18 08:00:00")).await.unwrap();
        assert_eq!(outcomes, vec![("calendar".to_string(), TaskOutcome::Succeeded)]);
        assert!(!ctx.calendar.is_trade_day(monday));
        assert!(get_sync_minute_bars_task(&ctx, dt("2022-02-21 10:00:00"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_calibration_stops_at_first_failure() {
        let ctx = context();
        seed_securities(&ctx).await;
        ctx.cursors()
            .reset(CursorKey::ArchiveTail, dt("2022-02-15"))
            .await
            .unwrap();

        // no worker: the first pending day times out
        let outcomes = daily_calibration_sync(&ctx, dt("2022-02-19 02:05:00")).await.unwrap();
        assert_eq!(outcomes, vec![("calibration".to_string(), TaskOutcome::TimedOut)]);
        assert_eq!(
            ctx.cursors().get(CursorKey::ArchiveTail).await.unwrap(),
            Some(dt("2022-02-15"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_calibration_walks_forward() {
        let quotes = tempfile::tempdir().unwrap();
        let store = tempfile::tempdir().unwrap();
        let ctx = context_with_worker(&quotes, &store).await;
        seed_securities(&ctx).await;
        ctx.cursors()
            .reset(CursorKey::ArchiveTail, dt("2022-02-16"))
            .await
            .unwrap();

        let outcomes = daily_calibration_sync(&ctx, dt("2022-02-19 02:05:00")).await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(
            ctx.cursors().get(CursorKey::ArchiveTail).await.unwrap(),
            Some(dt("2022-02-18"))
        );
        assert_eq!(
            ctx.cursors().get(CursorKey::ArchiveHead).await.unwrap(),
            Some(dt("2022-02-17"))
        );
    }

    #[tokio::test]
    async fn test_abnormal_outcomes_reported() {
        let ctx = context();
        let mut reports: Subscription = ctx.bus.subscribe(EventType::MasterReport).await.unwrap();

        report_abnormal(&ctx, "sync_minute_bars", "task minute timed out").await;

        let event = reports.recv().await.unwrap();
        assert_eq!(
            event.payload,
            EventPayload::MasterReport {
                job: "sync_minute_bars".to_string(),
                reason: "task minute timed out".to_string(),
            }
        );
    }
}
