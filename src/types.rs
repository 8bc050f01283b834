/// Core type definitions for the sync service
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, SyncError};

const MINUTE_FRAME_FORMAT: &str = "%Y-%m-%d %H:%M:00";
const DAY_FRAME_FORMAT: &str = "%Y-%m-%d";

/// Timeframe granularity of a bar series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FrameType {
    #[serde(rename = "1m")]
    Min1,
    #[serde(rename = "5m")]
    Min5,
    #[serde(rename = "15m")]
    Min15,
    #[serde(rename = "30m")]
    Min30,
    #[serde(rename = "60m")]
    Min60,
    #[serde(rename = "1d")]
    Day,
    #[serde(rename = "1w")]
    Week,
    #[serde(rename = "1M")]
    Month,
    #[serde(rename = "1Q")]
    Quarter,
    #[serde(rename = "1Y")]
    Year,
}

impl FrameType {
    pub fn as_str(&self) -> &str {
        match self {
            FrameType::Min1 => "1m",
            FrameType::Min5 => "5m",
            FrameType::Min15 => "15m",
            FrameType::Min30 => "30m",
            FrameType::Min60 => "60m",
            FrameType::Day => "1d",
            FrameType::Week => "1w",
            FrameType::Month => "1M",
            FrameType::Quarter => "1Q",
            FrameType::Year => "1Y",
        }
    }

    /// Name used in cursor keys, e.g. `jobs.bars_sync.minute.tail`
    pub fn cursor_name(&self) -> &str {
        match self {
            FrameType::Min1 => "minute",
            FrameType::Min5 => "min5",
            FrameType::Min15 => "min15",
            FrameType::Min30 => "min30",
            FrameType::Min60 => "min60",
            FrameType::Day => "day",
            FrameType::Week => "week",
            FrameType::Month => "month",
            FrameType::Quarter => "quarter",
            FrameType::Year => "year",
        }
    }

    /// Frame length in minutes; `None` for day-level frames
    pub fn minutes(&self) -> Option<i64> {
        match self {
            FrameType::Min1 => Some(1),
            FrameType::Min5 => Some(5),
            FrameType::Min15 => Some(15),
            FrameType::Min30 => Some(30),
            FrameType::Min60 => Some(60),
            _ => None,
        }
    }

    pub fn is_minute_level(&self) -> bool {
        self.minutes().is_some()
    }

    pub fn format_frame(&self, frame: NaiveDateTime) -> String {
        if self.is_minute_level() {
            frame.format(MINUTE_FRAME_FORMAT).to_string()
        } else {
            frame.date().format(DAY_FRAME_FORMAT).to_string()
        }
    }
}

impl std::fmt::Display for FrameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FrameType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1m" => Ok(FrameType::Min1),
            "5m" => Ok(FrameType::Min5),
            "15m" => Ok(FrameType::Min15),
            "30m" => Ok(FrameType::Min30),
            "60m" => Ok(FrameType::Min60),
            "1d" => Ok(FrameType::Day),
            "1w" => Ok(FrameType::Week),
            "1M" => Ok(FrameType::Month),
            "1Q" => Ok(FrameType::Quarter),
            "1Y" => Ok(FrameType::Year),
            other => Err(SyncError::InvalidParameter(format!("unknown frame type: {}", other))),
        }
    }
}

/// Parse a frame written either as `YYYY-mm-dd HH:MM:SS` or `YYYY-mm-dd`
pub fn parse_frame(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M"))
        .or_else(|_| {
            NaiveDate::parse_from_str(s, DAY_FRAME_FORMAT)
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
        })
        .map_err(|_| SyncError::InvalidCursor(s.to_string()))
}

/// OHLCV bar as returned by a quotes fetcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub frame: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor: Option<f64>,
}

/// Security list entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Security {
    pub code: String,
    pub display_name: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(rename = "type")]
    pub security_type: String,
}

#[cfg(test)]
impl Security {
    /// Listed stock with placeholder names and dates
    pub fn stock(code: &str) -> Self {
        Security {
            code: code.to_string(),
            display_name: code.to_string(),
            name: code.to_string(),
            start_date: NaiveDate::from_ymd_opt(2005, 1, 4).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2200, 1, 1).unwrap(),
            security_type: "stock".to_string(),
        }
    }
}

/// Daily trade price limits of one security
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLimit {
    pub code: String,
    pub frame: NaiveDate,
    pub high_limit: f64,
    pub low_limit: f64,
}

/// Number of bars to fetch for one frame type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSpec {
    pub frame_type: FrameType,
    pub n_bars: usize,
}

impl FrameSpec {
    pub fn new(frame_type: FrameType, n_bars: usize) -> Self {
        FrameSpec { frame_type, n_bars }
    }
}

/// Which backend holds shared state (cache + event bus)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Redis,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Configuration for the sync service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_timezone")]
    pub timezone: String,

    // Logging
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,

    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub fetchers: Vec<FetcherConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
    #[serde(default = "default_redis_dsn")]
    pub redis_dsn: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarConfig {
    #[serde(default = "default_market_open")]
    pub market_open: String,
    #[serde(default = "default_market_close")]
    pub market_close: String,
    #[serde(default)]
    pub holidays: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_minute_timeout")]
    pub minute_timeout_per_frame_secs: u64,
    #[serde(default = "default_after_hour_timeout")]
    pub after_hour_timeout_secs: u64,
    #[serde(default = "default_calendar_frames_timeout")]
    pub calendar_frames_timeout_secs: u64,
    #[serde(default = "default_security_list_timeout")]
    pub security_list_timeout_secs: u64,
    #[serde(default = "default_price_limit_timeout")]
    pub price_limit_timeout_secs: u64,
    #[serde(default = "default_calendar_sync_timeout")]
    pub calendar_sync_timeout_secs: u64,
    #[serde(default = "default_quota_ttl")]
    pub quota_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_account")]
    pub account: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
}

/// One quotes fetcher instance, selected by `impl`
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    #[serde(rename = "impl")]
    pub impl_name: String,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub root: Option<PathBuf>,
}

fn default_timezone() -> String {
    "Asia/Shanghai".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_redis_dsn() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_market_open() -> String {
    "09:30".to_string()
}

fn default_market_close() -> String {
    "15:00".to_string()
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("data/bars")
}

fn default_true() -> bool {
    true
}

fn default_minute_timeout() -> u64 {
    60
}

fn default_after_hour_timeout() -> u64 {
    2 * 60 * 60
}

fn default_calendar_frames_timeout() -> u64 {
    60 * 60
}

fn default_security_list_timeout() -> u64 {
    5 * 60
}

fn default_calendar_sync_timeout() -> u64 {
    5 * 60
}

fn default_price_limit_timeout() -> u64 {
    30 * 60
}

fn default_quota_ttl() -> u64 {
    24 * 60 * 60
}

fn default_account() -> String {
    "default".to_string()
}

fn default_batch_size() -> usize {
    50
}

fn default_heartbeat_interval() -> u64 {
    5
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            kind: BackendKind::default(),
            redis_dsn: default_redis_dsn(),
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        CalendarConfig {
            market_open: default_market_open(),
            market_close: default_market_close(),
            holidays: Vec::new(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            dir: default_store_dir(),
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        JobsConfig {
            enabled: true,
            minute_timeout_per_frame_secs: default_minute_timeout(),
            after_hour_timeout_secs: default_after_hour_timeout(),
            calendar_frames_timeout_secs: default_calendar_frames_timeout(),
            security_list_timeout_secs: default_security_list_timeout(),
            price_limit_timeout_secs: default_price_limit_timeout(),
            calendar_sync_timeout_secs: default_calendar_sync_timeout(),
            quota_ttl_secs: default_quota_ttl(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            account: default_account(),
            batch_size: default_batch_size(),
            heartbeat_interval_secs: default_heartbeat_interval(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            timezone: default_timezone(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            backend: BackendConfig::default(),
            calendar: CalendarConfig::default(),
            store: StoreConfig::default(),
            jobs: JobsConfig::default(),
            worker: WorkerConfig::default(),
            fetchers: Vec::new(),
        }
    }
}
