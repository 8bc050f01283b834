/// Event definitions exchanged between master and workers
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::FrameSpec;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub timestamp_ms: i64,
    pub idempotency_key: String,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    // Dispatch requests (master -> worker)
    DoSyncMin,
    DoSyncDay,
    DoSyncYearQuarterMonthWeek,
    DoSyncSecurityList,
    DoSyncTradePriceLimits,
    DoSyncCalendar,

    // Acknowledgements (worker -> master)
    SyncProgress,
    SyncFailed,

    // Operator channel
    MasterReport,

    // Liveness
    HeartBeat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventPayload {
    SyncRequest {
        task: String,
        run_id: String,
        frames: Vec<FrameSpec>,
        end: NaiveDateTime,
        expected: u64,
        scope_key: Option<String>,
        quota_key: String,
    },
    SyncProgress {
        task: String,
        run_id: String,
        processed: u64,
        records: u64,
        worker: String,
    },
    SyncFailed {
        task: String,
        run_id: String,
        reason: String,
        worker: String,
    },
    MasterReport {
        job: String,
        reason: String,
    },
    HeartBeat {
        account: String,
        impl_name: String,
        time: DateTime<Utc>,
        /// Calls left with the quotes provider, when it meters them
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quota: Option<u64>,
    },
}

impl Event {
    pub fn new(event_type: EventType, payload: EventPayload) -> Self {
        let now = Utc::now();
        let idempotency_key = format!(
            "{}:{}:{}",
            event_type.as_str(),
            now.timestamp_millis(),
            uuid::Uuid::new_v4()
        );
        Self::with_key(event_type, payload, idempotency_key)
    }

    pub fn with_key(event_type: EventType, payload: EventPayload, idempotency_key: String) -> Self {
        let now = Utc::now();
        Event {
            event_type,
            timestamp: now,
            timestamp_ms: now.timestamp_millis(),
            idempotency_key,
            payload,
        }
    }

    /// `(task, run_id)` of acks and requests
    pub fn run_ref(&self) -> Option<(&str, &str)> {
        match &self.payload {
            EventPayload::SyncRequest { task, run_id, .. }
            | EventPayload::SyncProgress { task, run_id, .. }
            | EventPayload::SyncFailed { task, run_id, .. } => Some((task, run_id)),
            _ => None,
        }
    }
}

impl EventType {
    pub const REQUESTS: [EventType; 6] = [
        EventType::DoSyncMin,
        EventType::DoSyncDay,
        EventType::DoSyncYearQuarterMonthWeek,
        EventType::DoSyncSecurityList,
        EventType::DoSyncTradePriceLimits,
        EventType::DoSyncCalendar,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            EventType::DoSyncMin => "DO_SYNC_MIN",
            EventType::DoSyncDay => "DO_SYNC_DAY",
            EventType::DoSyncYearQuarterMonthWeek => "DO_SYNC_YEAR_QUARTER_MONTH_WEEK",
            EventType::DoSyncSecurityList => "DO_SYNC_SECURITY_LIST",
            EventType::DoSyncTradePriceLimits => "DO_SYNC_TRADE_PRICE_LIMITS",
            EventType::DoSyncCalendar => "DO_SYNC_CALENDAR",
            EventType::SyncProgress => "SYNC_PROGRESS",
            EventType::SyncFailed => "SYNC_FAILED",
            EventType::MasterReport => "MASTER_REPORT",
            EventType::HeartBeat => "HEART_BEAT",
        }
    }
}
