/// BarsSyncTask - one dispatch of a sync request to the workers
use chrono::NaiveDateTime;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::keys;
use super::securities::cached_security_codes;
use crate::cache::Cache;
use crate::context::AppContext;
use crate::error::{Result, SyncError};
use crate::events::{Event, EventBus, EventPayload, EventType};
use crate::types::FrameSpec;
use crate::utils::generate_idempotency_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Dispatched,
    Succeeded,
    TimedOut,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    /// Another run of the same task name holds the running marker
    Skipped,
    TimedOut,
    Failed(String),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded)
    }
}

/// A sync request for a set of frame types up to `end`.
///
/// Tasks without an explicit expected count cover the cached security list:
/// the codes are pushed to a per-run scope list that workers drain, and the
/// run succeeds once `codes x frame types` pairs have been acknowledged.
#[derive(Debug)]
pub struct BarsSyncTask {
    pub name: String,
    pub event: EventType,
    pub frames: Vec<FrameSpec>,
    pub end: NaiveDateTime,
    pub timeout: Duration,
    pub run_id: String,
    expected: Option<u64>,
    state: TaskState,
}

impl BarsSyncTask {
    pub fn new(
        name: impl Into<String>,
        event: EventType,
        frames: Vec<FrameSpec>,
        end: NaiveDateTime,
        timeout: Duration,
    ) -> Self {
        BarsSyncTask {
            name: name.into(),
            event,
            frames,
            end,
            timeout,
            run_id: uuid::Uuid::new_v4().to_string(),
            expected: None,
            state: TaskState::Created,
        }
    }

    /// Fixed quota target instead of one per (security, frame type)
    pub fn with_expected(mut self, expected: u64) -> Self {
        self.expected = Some(expected);
        self
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn state_key(&self) -> String {
        keys::state_key(&self.name)
    }

    pub fn quota_key(&self) -> String {
        keys::quota_key(&self.name, &self.run_id)
    }

    /// Progress acknowledged so far for this run; missing counter is 0
    pub async fn get_quota(&self, cache: &dyn Cache) -> Result<u64> {
        match cache.get(&self.quota_key()).await? {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| SyncError::CacheError(format!("bad quota value '{}' for {}", raw, self.name))),
            None => Ok(0),
        }
    }

    /// Dispatch the request and wait for completion.
    ///
    /// Never dispatches while another run of the same name holds the marker.
    /// The marker and scope list are released on every exit path.
    pub async fn run(&mut self, ctx: &AppContext) -> Result<TaskOutcome> {
        let state_key = self.state_key();
        // the wait ends no later than the marker expires
        let deadline = Instant::now() + self.timeout;
        if !ctx.cache.set_nx(&state_key, &self.run_id, self.timeout).await? {
            info!("Task {} is already running, skipped", self.name);
            self.state = TaskState::Skipped;
            return Ok(TaskOutcome::Skipped);
        }

        let outcome = self.dispatch(ctx, deadline).await;
        self.cleanup(ctx).await;

        self.state = match &outcome {
            Ok(TaskOutcome::Succeeded) => TaskState::Succeeded,
            Ok(TaskOutcome::TimedOut) => TaskState::TimedOut,
            Ok(TaskOutcome::Skipped) => TaskState::Skipped,
            Ok(TaskOutcome::Failed(_)) | Err(_) => TaskState::Failed,
        };
        outcome
    }

    async fn dispatch(&mut self, ctx: &AppContext, deadline: Instant) -> Result<TaskOutcome> {
        let (expected, scope_key) = match self.expected {
            Some(n) => (n, None),
            None => {
                let codes = cached_security_codes(ctx.cache.as_ref()).await?;
                if codes.is_empty() {
                    return Err(SyncError::SecurityNotFound(
                        "security list is empty, sync it before bars".to_string(),
                    ));
                }
                let key = keys::scope_key(&self.name, &self.run_id);
                ctx.cache.rpush(&key, &codes).await?;
                ctx.cache.expire(&key, self.timeout).await?;
                ((codes.len() * self.frames.len()) as u64, Some(key))
            }
        };

        // subscribe first so no ack can slip in before we listen
        let mut progress = ctx.bus.subscribe(EventType::SyncProgress).await?;
        let mut failures = ctx.bus.subscribe(EventType::SyncFailed).await?;

        let request = Event::with_key(
            self.event,
            EventPayload::SyncRequest {
                task: self.name.clone(),
                run_id: self.run_id.clone(),
                frames: self.frames.clone(),
                end: self.end,
                expected,
                scope_key,
                quota_key: self.quota_key(),
            },
            generate_idempotency_key(&[&self.name, &self.run_id]),
        );
        ctx.bus.publish(request).await?;
        self.state = TaskState::Dispatched;

        info!(
            "📤 Dispatched {} ({}) end={} expected={} timeout={}s",
            self.name,
            self.event.as_str(),
            self.end,
            expected,
            self.timeout.as_secs()
        );

        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => {
                    let quota = self.get_quota(ctx.cache.as_ref()).await.unwrap_or_default();
                    warn!(
                        "⏰ Task {} timed out after {}s ({}/{})",
                        self.name,
                        self.timeout.as_secs(),
                        quota,
                        expected
                    );
                    return Ok(TaskOutcome::TimedOut);
                }
                event = progress.recv() => {
                    let event = event.ok_or_else(|| {
                        SyncError::EventDispatchFailed("progress subscription closed".to_string())
                    })?;
                    if !self.owns(&event) {
                        debug!("Ignoring stale ack {:?} for task {}", event.run_ref(), self.name);
                        continue;
                    }

                    let quota = self.get_quota(ctx.cache.as_ref()).await?;
                    debug!("Task {} progress {}/{}", self.name, quota, expected);
                    if quota >= expected {
                        info!("✅ Task {} done ({}/{})", self.name, quota, expected);
                        return Ok(TaskOutcome::Succeeded);
                    }
                }
                event = failures.recv() => {
                    let event = event.ok_or_else(|| {
                        SyncError::EventDispatchFailed("failure subscription closed".to_string())
                    })?;
                    if !self.owns(&event) {
                        debug!("Ignoring stale failure {:?} for task {}", event.run_ref(), self.name);
                        continue;
                    }

                    if let EventPayload::SyncFailed { reason, worker, .. } = event.payload {
                        error!("❌ Task {} failed on worker {}: {}", self.name, worker, reason);
                        return Ok(TaskOutcome::Failed(reason));
                    }
                }
            }
        }
    }

    fn owns(&self, event: &Event) -> bool {
        event.run_ref() == Some((self.name.as_str(), self.run_id.as_str()))
    }

    async fn cleanup(&self, ctx: &AppContext) {
        match ctx.cache.delete_if_eq(&self.state_key(), &self.run_id).await {
            Ok(false) => debug!("Marker of {} no longer held by run {}", self.name, self.run_id),
            Ok(true) => {}
            Err(e) => warn!("Failed to clear marker of {}: {}", self.name, e),
        }

        if self.expected.is_none() {
            let scope = keys::scope_key(&self.name, &self.run_id);
            if let Err(e) = ctx.cache.delete(&scope).await {
                warn!("Failed to drop scope list {}: {}", scope, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::events::Subscription;
    use crate::sync::cache_security_list;
    use crate::types::{parse_frame, Config, FrameType, Security};
    use async_trait::async_trait;
    use std::sync::Arc;

    fn context() -> AppContext {
        AppContext::in_memory(Config::default()).unwrap()
    }

    fn minute_task(timeout_secs: u64) -> BarsSyncTask {
        BarsSyncTask::new(
            "minute",
            EventType::DoSyncMin,
            vec![FrameSpec::new(FrameType::Min1, 6)],
            parse_frame("2022-02-18 11:35:00").unwrap(),
            Duration::from_secs(timeout_secs),
        )
    }

    async fn next_request(rx: &mut Subscription) -> (String, String, String, Option<String>) {
        let event = rx.recv().await.unwrap();
        match event.payload {
            EventPayload::SyncRequest {
                task,
                run_id,
                quota_key,
                scope_key,
                ..
            } => (task, run_id, quota_key, scope_key),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    fn progress(task: &str, run_id: &str, processed: u64) -> Event {
        Event::new(
            EventType::SyncProgress,
            EventPayload::SyncProgress {
                task: task.to_string(),
                run_id: run_id.to_string(),
                processed,
                records: processed,
                worker: "test".to_string(),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_quota_reached() {
        let ctx = context();
        let mut requests = ctx.bus.subscribe(EventType::DoSyncMin).await.unwrap();

        let worker_ctx = ctx.clone();
        tokio::spawn(async move {
            let (task, run_id, quota_key, _) = next_request(&mut requests).await;
            for (i, n) in [400_000i64, 400_000, 200_000].into_iter().enumerate() {
                if i == 2 {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                worker_ctx.cache.incr_by(&quota_key, n).await.unwrap();
                worker_ctx.bus.publish(progress(&task, &run_id, n as u64)).await.unwrap();
            }
        });

        let started = Instant::now();
        let mut task = minute_task(60).with_expected(1_000_000);
        let outcome = task.run(&ctx).await.unwrap();

        assert_eq!(outcome, TaskOutcome::Succeeded);
        assert!(outcome.is_success());
        assert_eq!(task.state(), TaskState::Succeeded);
        // only the third ack completes the quota
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(task.get_quota(ctx.cache.as_ref()).await.unwrap(), 1_000_000);
        assert_eq!(ctx.cache.get("master.task.minute.state").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_without_acks() {
        let ctx = context();
        let started = Instant::now();

        let mut task = minute_task(30).with_expected(1);
        let outcome = task.run(&ctx).await.unwrap();

        assert_eq!(outcome, TaskOutcome::TimedOut);
        assert!(!outcome.is_success());
        assert_eq!(task.state(), TaskState::TimedOut);
        assert!(started.elapsed() >= Duration::from_secs(30));
        assert_eq!(ctx.cache.get("master.task.minute.state").await.unwrap(), None);
        assert_eq!(ctx.cache.get("jobs.bars_sync.minute.tail").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_runs_dispatch_once() {
        let ctx = context();
        let mut requests = ctx.bus.subscribe(EventType::DoSyncMin).await.unwrap();

        let mut a = minute_task(30).with_expected(1);
        let mut b = minute_task(30).with_expected(1);
        let (ra, rb) = tokio::join!(a.run(&ctx), b.run(&ctx));
        let mut outcomes = vec![ra.unwrap(), rb.unwrap()];
        outcomes.sort_by_key(|o| format!("{:?}", o));

        assert_eq!(outcomes, vec![TaskOutcome::Skipped, TaskOutcome::TimedOut]);
        assert!(requests.try_recv().is_ok());
        assert!(requests.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_acks_ignored() {
        let ctx = context();
        let mut requests = ctx.bus.subscribe(EventType::DoSyncMin).await.unwrap();

        let worker_ctx = ctx.clone();
        tokio::spawn(async move {
            let (task, run_id, quota_key, _) = next_request(&mut requests).await;

            // leftovers from an earlier run of the same task
            worker_ctx.cache.incr_by("master.task.minute.old-run.quota", 5).await.unwrap();
            worker_ctx.bus.publish(progress(&task, "old-run", 5)).await.unwrap();
            worker_ctx
                .bus
                .publish(Event::new(
                    EventType::SyncFailed,
                    EventPayload::SyncFailed {
                        task: task.clone(),
                        run_id: "old-run".to_string(),
                        reason: "late failure".to_string(),
                        worker: "test".to_string(),
                    },
                ))
                .await
                .unwrap();

            tokio::time::sleep(Duration::from_secs(10)).await;
            worker_ctx.cache.incr_by(&quota_key, 1).await.unwrap();
            worker_ctx.bus.publish(progress(&task, &run_id, 1)).await.unwrap();
        });

        let started = Instant::now();
        let mut task = minute_task(60).with_expected(1);
        assert_eq!(task.run(&ctx).await.unwrap(), TaskOutcome::Succeeded);
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_failure_fails_run() {
        let ctx = context();
        let mut requests = ctx.bus.subscribe(EventType::DoSyncMin).await.unwrap();

        let worker_ctx = ctx.clone();
        tokio::spawn(async move {
            let (task, run_id, _, _) = next_request(&mut requests).await;
            worker_ctx
                .bus
                .publish(Event::new(
                    EventType::SyncFailed,
                    EventPayload::SyncFailed {
                        task,
                        run_id,
                        reason: "quota exhausted".to_string(),
                        worker: "test".to_string(),
                    },
                ))
                .await
                .unwrap();
        });

        let mut task = minute_task(60).with_expected(1);
        let outcome = task.run(&ctx).await.unwrap();
        assert_eq!(outcome, TaskOutcome::Failed("quota exhausted".to_string()));
        assert_eq!(task.state(), TaskState::Failed);
        assert_eq!(ctx.cache.get("master.task.minute.state").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scope_covers_security_list() {
        let ctx = context();
        cache_security_list(
            ctx.cache.as_ref(),
            &[Security::stock("000001.XSHE"), Security::stock("600000.XSHG")],
        )
        .await
        .unwrap();
        let mut requests = ctx.bus.subscribe(EventType::DoSyncDay).await.unwrap();

        let worker_ctx = ctx.clone();
        tokio::spawn(async move {
            let (task, run_id, quota_key, scope_key) = next_request(&mut requests).await;
            let codes = worker_ctx.cache.lpop(&scope_key.unwrap(), 10).await.unwrap();
            assert_eq!(codes.len(), 2);
            // two codes x two frame types
            worker_ctx.cache.incr_by(&quota_key, 4).await.unwrap();
            worker_ctx.bus.publish(progress(&task, &run_id, 4)).await.unwrap();
        });

        let mut task = BarsSyncTask::new(
            "day",
            EventType::DoSyncDay,
            vec![FrameSpec::new(FrameType::Min1, 330), FrameSpec::new(FrameType::Day, 1)],
            parse_frame("2022-02-18 15:00:00").unwrap(),
            Duration::from_secs(60),
        );
        assert_eq!(task.run(&ctx).await.unwrap(), TaskOutcome::Succeeded);
        assert_eq!(task.get_quota(ctx.cache.as_ref()).await.unwrap(), 4);
        assert_eq!(
            ctx.cache.llen(&keys::scope_key("day", &task.run_id)).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_bars_task_needs_security_list() {
        let ctx = context();
        let mut task = BarsSyncTask::new(
            "day",
            EventType::DoSyncDay,
            vec![FrameSpec::new(FrameType::Day, 1)],
            parse_frame("2022-02-18 15:00:00").unwrap(),
            Duration::from_secs(60),
        );

        assert!(matches!(task.run(&ctx).await, Err(SyncError::SecurityNotFound(_))));
        assert_eq!(ctx.cache.get("master.task.day.state").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_quota_reads_zero() {
        let ctx = context();
        let task = minute_task(30);
        assert_eq!(task.get_quota(ctx.cache.as_ref()).await.unwrap(), 0);
    }

    /// Memory cache whose list pushes take `delay`
    struct SlowPushCache {
        inner: MemoryCache,
        delay: Duration,
    }

    #[async_trait]
    impl Cache for SlowPushCache {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
            self.inner.set(key, value, ttl).await
        }

        async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
            self.inner.set_nx(key, value, ttl).await
        }

        async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
            self.inner.incr_by(key, delta).await
        }

        async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
            self.inner.expire(key, ttl).await
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.inner.delete(key).await
        }

        async fn delete_if_eq(&self, key: &str, value: &str) -> Result<bool> {
            self.inner.delete_if_eq(key, value).await
        }

        async fn rpush(&self, key: &str, values: &[String]) -> Result<()> {
            tokio::time::sleep(self.delay).await;
            self.inner.rpush(key, values).await
        }

        async fn lpop(&self, key: &str, count: usize) -> Result<Vec<String>> {
            self.inner.lpop(key, count).await
        }

        async fn llen(&self, key: &str) -> Result<usize> {
            self.inner.llen(key).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_ends_when_marker_expires() {
        let mut ctx = context();
        ctx.cache = Arc::new(SlowPushCache {
            inner: MemoryCache::new(),
            delay: Duration::from_secs(10),
        });
        cache_security_list(ctx.cache.as_ref(), &[Security::stock("000001.XSHE")])
            .await
            .unwrap();

        let started = Instant::now();
        let mut task = BarsSyncTask::new(
            "day",
            EventType::DoSyncDay,
            vec![FrameSpec::new(FrameType::Day, 1)],
            parse_frame("2022-02-18 15:00:00").unwrap(),
            Duration::from_secs(30),
        );
        let outcome = task.run(&ctx).await.unwrap();

        // the 10s scope fill counts against the 30s budget
        assert_eq!(outcome, TaskOutcome::TimedOut);
        assert!(started.elapsed() >= Duration::from_secs(30));
        assert!(started.elapsed() < Duration::from_secs(31));
    }
}
