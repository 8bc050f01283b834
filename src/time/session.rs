/// Market session hours
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{Result, SyncError};
use crate::types::CalendarConfig;

/// Daily trading session, in exchange-local time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl SessionHours {
    pub fn new(open: NaiveTime, close: NaiveTime) -> Result<Self> {
        if open >= close {
            return Err(SyncError::ConfigError(format!(
                "market_open {} must be before market_close {}",
                open, close
            )));
        }
        Ok(SessionHours { open, close })
    }

    pub fn from_config(cfg: &CalendarConfig) -> Result<Self> {
        Self::new(parse_clock(&cfg.market_open)?, parse_clock(&cfg.market_close)?)
    }

    pub fn open_at(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.open)
    }

    pub fn close_at(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.close)
    }
}

impl Default for SessionHours {
    fn default() -> Self {
        SessionHours {
            open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(15, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

/// Parse `HH:MM:SS` or `HH:MM`
pub fn parse_clock(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|e| SyncError::ConfigError(format!("Invalid clock time '{}': {}", s, e)))
}
