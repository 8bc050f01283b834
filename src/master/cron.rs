/// Cron registrar - fires master jobs on their schedules
use chrono::Utc;
use ::cron::Schedule;
use std::str::FromStr;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::jobs::{run_job, JobKind};
use crate::context::AppContext;
use crate::error::{Result, SyncError};
use crate::time::TradingCalendar;

/// One schedule entry; six-field cron syntax with seconds first
#[derive(Debug, Clone)]
pub struct CronEntry {
    pub name: String,
    pub schedule: Schedule,
    pub job: JobKind,
}

impl CronEntry {
    pub fn new(name: &str, expression: &str, job: JobKind) -> Result<Self> {
        let schedule = Schedule::from_str(expression).map_err(|e| {
            SyncError::InvalidSchedule(format!("invalid cron expression '{}': {}", expression, e))
        })?;
        Ok(CronEntry {
            name: name.to_string(),
            schedule,
            job,
        })
    }
}

/// Job table of the master process, in exchange-local time
pub fn default_cron_table() -> Result<Vec<CronEntry>> {
    let table = [
        ("1m:9:31-59", "0 31-59 9 * * *", JobKind::SyncMinuteBars),
        ("1m:10:*", "0 * 10 * * *", JobKind::SyncMinuteBars),
        // through 11:31 so the 11:30 bar is picked up
        ("1m:11:0-31", "0 0-31 11 * * *", JobKind::SyncMinuteBars),
        ("1m:13-14:*", "0 * 13-14 * * *", JobKind::SyncMinuteBars),
        // 15:00 and 15:01 pick up the closing bar
        ("1m:15:00", "0 0-1 15 * * *", JobKind::SyncMinuteBars),
        ("after_hour_sync_job", "0 5 15 * * *", JobKind::AfterHourSync),
        ("sync_year_quarter_month_week", "0 5 2 * * *", JobKind::SyncYearQuarterMonthWeek),
        ("daily_calibration_sync", "0 5 2 * * *", JobKind::DailyCalibration),
        ("sync_min_5_15_30_60", "0 30 2 * * *", JobKind::SyncMin5To60),
        ("sync_calendar", "0 0 8 * * *", JobKind::SyncCalendar),
        ("sync_security_list", "0 0 9 * * *", JobKind::SyncSecurityList),
        ("sync_trade_price_limits", "0 31 9 * * *", JobKind::SyncTradePriceLimits),
    ];

    table
        .into_iter()
        .map(|(name, expression, job)| CronEntry::new(name, expression, job))
        .collect()
}

pub struct CronRegistrar {
    ctx: AppContext,
    entries: Vec<CronEntry>,
}

impl CronRegistrar {
    pub fn new(ctx: AppContext, entries: Vec<CronEntry>) -> Self {
        CronRegistrar { ctx, entries }
    }

    /// Spawn one scheduler loop per entry. Each firing runs its job on a
    /// separate task so a long dispatch never delays the next firing.
    pub fn start(self) -> Vec<JoinHandle<()>> {
        let tz = self.ctx.calendar.timezone();
        info!("⏰ Registering {} cron entries ({})", self.entries.len(), tz);

        self.entries
            .into_iter()
            .map(|entry| {
                let ctx = self.ctx.clone();
                tokio::spawn(async move {
                    loop {
                        let now = Utc::now().with_timezone(&tz);
                        let Some(next) = entry.schedule.after(&now).next() else {
                            warn!("Cron entry {} has no upcoming firing", entry.name);
                            return;
                        };

                        let wait = (next - now).to_std().unwrap_or_default();
                        debug!("{} fires at {}", entry.name, next);
                        tokio::time::sleep(wait).await;

                        let ctx = ctx.clone();
                        let job = entry.job;
                        tokio::spawn(async move { run_job(&ctx, job).await });
                    }
                })
            })
            .collect()
    }
}
