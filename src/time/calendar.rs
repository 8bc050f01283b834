/// Trading calendar: trading-day predicate and frame arithmetic
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

use super::holidays::{get_sse_holidays, is_weekend};
use super::session::SessionHours;
use crate::error::{Result, SyncError};
use crate::types::{Config, FrameType};

/// Upper bound on day-by-day calendar scans
const MAX_SCAN_DAYS: usize = 3660;

/// Trading calendar capability.
///
/// Implementors provide the trading-day predicate and session hours; frame
/// arithmetic is derived from those. Minute frames are labelled by their
/// closing minute (the first 1m frame of a 09:30 open is 09:31) and the
/// session close is always the last frame of the day. Day-level frames are
/// the midnight of the last trading day in their period.
pub trait TradingCalendar: Send + Sync {
    fn timezone(&self) -> Tz;

    fn session(&self) -> SessionHours;

    fn is_trade_day(&self, date: NaiveDate) -> bool;

    /// Adopt the provider's trading days; calendars without one ignore it
    fn load_trade_days(&self, _days: &[NaiveDate]) {}

    /// Current wall-clock time in exchange-local time
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.timezone()).naive_local()
    }

    fn next_trade_day(&self, date: NaiveDate) -> NaiveDate {
        let mut day = date;
        for _ in 0..MAX_SCAN_DAYS {
            day = day + Duration::days(1);
            if self.is_trade_day(day) {
                return day;
            }
        }
        day
    }

    fn prev_trade_day(&self, date: NaiveDate) -> NaiveDate {
        let mut day = date;
        for _ in 0..MAX_SCAN_DAYS {
            day = day - Duration::days(1);
            if self.is_trade_day(day) {
                return day;
            }
        }
        day
    }

    fn session_close(&self, date: NaiveDate) -> NaiveDateTime {
        self.session().close_at(date)
    }

    fn first_min_frame(&self, date: NaiveDate, frame_type: FrameType) -> NaiveDateTime {
        let minutes = frame_type.minutes().unwrap_or(1);
        self.session().open_at(date) + Duration::minutes(minutes)
    }

    fn last_min_frame(&self, date: NaiveDate) -> NaiveDateTime {
        self.session_close(date)
    }

    /// Close of the most recent session that has already ended at `now`
    fn last_session_close(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date();
        if self.is_trade_day(today) && now >= self.session_close(today) {
            self.session_close(today)
        } else {
            self.session_close(self.prev_trade_day(today))
        }
    }

    /// True when `date` is the last trading day of its `frame_type` period
    fn is_period_end(&self, date: NaiveDate, frame_type: FrameType) -> bool {
        if !self.is_trade_day(date) {
            return false;
        }
        let next = self.next_trade_day(date);
        match frame_type {
            FrameType::Week => next.iso_week() != date.iso_week(),
            FrameType::Month => (next.year(), next.month()) != (date.year(), date.month()),
            FrameType::Quarter => {
                (next.year(), next.month0() / 3) != (date.year(), date.month0() / 3)
            }
            FrameType::Year => next.year() != date.year(),
            _ => true,
        }
    }

    /// Latest completed frame at or before `dt`
    fn floor(&self, dt: NaiveDateTime, frame_type: FrameType) -> NaiveDateTime {
        match frame_type.minutes() {
            Some(minutes) => {
                let date = dt.date();
                if !self.is_trade_day(date) {
                    return self.last_min_frame(self.prev_trade_day(date));
                }

                let close = self.session_close(date);
                if dt >= close {
                    return close;
                }

                let open = self.session().open_at(date);
                let elapsed = (dt - open).num_minutes();
                if dt < open || elapsed < minutes {
                    return self.last_min_frame(self.prev_trade_day(date));
                }
                open + Duration::minutes(elapsed / minutes * minutes)
            }
            None => {
                let mut day = dt.date();
                for _ in 0..MAX_SCAN_DAYS {
                    if self.is_period_end(day, frame_type) {
                        break;
                    }
                    day = day - Duration::days(1);
                }
                day.and_time(chrono::NaiveTime::MIN)
            }
        }
    }

    /// Frame immediately after `frame`
    fn next_frame(&self, frame: NaiveDateTime, frame_type: FrameType) -> NaiveDateTime {
        match frame_type.minutes() {
            Some(minutes) => {
                let date = frame.date();
                let close = self.session_close(date);
                if !self.is_trade_day(date) || frame >= close {
                    return self.first_min_frame(self.next_trade_day(date), frame_type);
                }
                let next = frame + Duration::minutes(minutes);
                if next > close {
                    close
                } else {
                    next
                }
            }
            None => {
                let mut day = frame.date();
                for _ in 0..MAX_SCAN_DAYS {
                    day = self.next_trade_day(day);
                    if self.is_period_end(day, frame_type) {
                        break;
                    }
                }
                day.and_time(chrono::NaiveTime::MIN)
            }
        }
    }

    /// Inclusive number of frames in `[start, end]`
    fn count_frames(&self, start: NaiveDateTime, end: NaiveDateTime, frame_type: FrameType) -> usize {
        let mut count = 0;
        let mut frame = start;
        while frame <= end {
            count += 1;
            frame = self.next_frame(frame, frame_type);
        }
        count
    }
}

/// Calendar with a single continuous session.
///
/// Dates inside the range of the provider's trading days follow that list;
/// dates outside it fall back to weekdays minus the holiday table.
#[derive(Debug, Clone)]
pub struct ExchangeCalendar {
    tz: Tz,
    session: SessionHours,
    holidays: HashSet<NaiveDate>,
    trade_days: Arc<RwLock<BTreeSet<NaiveDate>>>,
}

impl ExchangeCalendar {
    pub fn new(tz: Tz, session: SessionHours, holidays: HashSet<NaiveDate>) -> Self {
        ExchangeCalendar {
            tz,
            session,
            holidays,
            trade_days: Arc::new(RwLock::new(BTreeSet::new())),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let tz: Tz = config
            .timezone
            .parse()
            .map_err(|e| SyncError::ConfigError(format!("Invalid timezone '{}': {}", config.timezone, e)))?;
        let session = SessionHours::from_config(&config.calendar)?;

        let mut holidays = get_sse_holidays();
        holidays.extend(config.calendar.holidays.iter().copied());

        Ok(Self::new(tz, session, holidays))
    }
}

impl Default for ExchangeCalendar {
    fn default() -> Self {
        Self::new(chrono_tz::Asia::Shanghai, SessionHours::default(), get_sse_holidays())
    }
}

impl TradingCalendar for ExchangeCalendar {
    fn timezone(&self) -> Tz {
        self.tz
    }

    fn session(&self) -> SessionHours {
        self.session
    }

    fn is_trade_day(&self, date: NaiveDate) -> bool {
        let synced = self.trade_days.read().unwrap_or_else(PoisonError::into_inner);
        if let (Some(first), Some(last)) = (synced.first(), synced.last()) {
            if (*first..=*last).contains(&date) {
                return synced.contains(&date);
            }
        }
        !is_weekend(date) && !self.holidays.contains(&date)
    }

    fn load_trade_days(&self, days: &[NaiveDate]) {
        let mut synced = self.trade_days.write().unwrap_or_else(PoisonError::into_inner);
        *synced = days.iter().copied().collect();
        debug!("Calendar holds {} provider trading days", synced.len());
    }
}
