/// Centralized error types for the sync service
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    // Configuration Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("No quotes fetcher available")]
    NoFetcherAvailable,

    #[error("Unknown quotes fetcher implementation: {0}")]
    UnknownFetcher(String),

    // Fetch Errors
    #[error("Quotes fetch failed: {0}")]
    FetchFailed(String),

    #[error("Security not found: {0}")]
    SecurityNotFound(String),

    // Cache Errors
    #[error("Cache operation failed: {0}")]
    CacheError(String),

    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    // Data Errors
    #[error("Invalid cursor value: {0}")]
    InvalidCursor(String),

    #[error("Invalid bar data: {0}")]
    InvalidBarData(String),

    #[error("Deserialization failed: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    // Storage Errors
    #[error("Storage write failed: {0}")]
    StorageError(String),

    #[error("File I/O error: {0}")]
    FileError(#[from] std::io::Error),

    // Calendar Errors
    #[error("Non-trading day: {0}")]
    NonTradingDay(String),

    #[error("Invalid cron expression: {0}")]
    InvalidSchedule(String),

    // Event Bus Errors
    #[error("Event dispatch failed: {0}")]
    EventDispatchFailed(String),

    #[error("Event handler error: {0}")]
    EventHandlerError(String),

    #[error("Duplicate event detected: {0}")]
    DuplicateEvent(String),

    // System Errors
    #[error("Fatal error: {0}")]
    FatalError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Check if the next cron cycle can be expected to recover from this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SyncError::FetchFailed(_)
                | SyncError::CacheError(_)
                | SyncError::RedisError(_)
                | SyncError::EventDispatchFailed(_)
                | SyncError::StorageError(_)
        )
    }

    /// Check if error must stop the process
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::ConfigError(_)
                | SyncError::NoFetcherAvailable
                | SyncError::UnknownFetcher(_)
                | SyncError::InvalidSchedule(_)
                | SyncError::FatalError(_)
        )
    }

    /// Get error code for logging/monitoring
    pub fn error_code(&self) -> &str {
        match self {
            SyncError::ConfigError(_) => "CFG_001",
            SyncError::InvalidParameter(_) => "CFG_002",
            SyncError::NoFetcherAvailable => "CFG_003",
            SyncError::UnknownFetcher(_) => "CFG_004",
            SyncError::FetchFailed(_) => "FETCH_001",
            SyncError::SecurityNotFound(_) => "FETCH_002",
            SyncError::CacheError(_) => "CACHE_001",
            SyncError::RedisError(_) => "CACHE_002",
            SyncError::InvalidCursor(_) => "DATA_001",
            SyncError::InvalidBarData(_) => "DATA_002",
            SyncError::DeserializationError(_) => "DATA_003",
            SyncError::CsvError(_) => "DATA_004",
            SyncError::StorageError(_) => "STORE_001",
            SyncError::FileError(_) => "FILE_001",
            SyncError::NonTradingDay(_) => "CAL_001",
            SyncError::InvalidSchedule(_) => "CAL_002",
            SyncError::EventDispatchFailed(_) => "EVENT_001",
            SyncError::EventHandlerError(_) => "EVENT_002",
            SyncError::DuplicateEvent(_) => "EVENT_003",
            SyncError::FatalError(_) => "SYS_001",
            SyncError::InternalError(_) => "INT_001",
        }
    }
}
