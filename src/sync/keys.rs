/// Cache key layout shared by master and workers
use crate::types::FrameType;

pub const TASK_PREFIX: &str = "master.task";

pub const BAR_SYNC_ARCHIVE_HEAD: &str = "jobs.bars_sync.archive.head";
pub const BAR_SYNC_ARCHIVE_TAIL: &str = "jobs.bars_sync.archive.tail";
pub const BAR_SYNC_TRADE_PRICE_TAIL: &str = "jobs.bars_sync.trade_price.tail";

pub const TRADE_PRICE_LIMITS: &str = "trade_price_limits";
pub const SECURITIES: &str = "securities";
pub const DAY_FRAMES: &str = "calendar.day_frames";

/// `jobs.bars_sync.<granularity>.tail`, e.g. `jobs.bars_sync.minute.tail`
pub fn bars_tail(frame_type: FrameType) -> String {
    format!("jobs.bars_sync.{}.tail", frame_type.cursor_name())
}

/// Running marker of a task name
pub fn state_key(task: &str) -> String {
    format!("{}.{}.state", TASK_PREFIX, task)
}

/// Progress counter of one run
pub fn quota_key(task: &str, run_id: &str) -> String {
    format!("{}.{}.{}.quota", TASK_PREFIX, task, run_id)
}

/// Security codes still to be processed by one run
pub fn scope_key(task: &str, run_id: &str) -> String {
    format!("{}.{}.scope.{}", TASK_PREFIX, task, run_id)
}

/// `trade_price_limits:<YYYY-mm-dd>:<code>`
pub fn trade_price_limit_key(date: chrono::NaiveDate, code: &str) -> String {
    format!("{}:{}:{}", TRADE_PRICE_LIMITS, date.format("%Y-%m-%d"), code)
}
