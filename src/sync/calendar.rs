/// Provider trading days, cached for every process and loaded into the calendar
use chrono::NaiveDate;
use tracing::{debug, info};

use super::keys::DAY_FRAMES;
use crate::cache::Cache;
use crate::error::Result;
use crate::time::TradingCalendar;

/// Replace the cached trading days in a single write
pub async fn cache_trade_days(cache: &dyn Cache, days: &[NaiveDate]) -> Result<()> {
    cache.set(DAY_FRAMES, &serde_json::to_string(days)?, None).await?;
    debug!("Cached {} trading days", days.len());
    Ok(())
}

/// Cached trading days, ascending; missing list is empty
pub async fn cached_trade_days(cache: &dyn Cache) -> Result<Vec<NaiveDate>> {
    match cache.get(DAY_FRAMES).await? {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(Vec::new()),
    }
}

/// Load the cached trading days into `calendar`; returns how many were loaded
pub async fn load_cached_calendar(cache: &dyn Cache, calendar: &dyn TradingCalendar) -> Result<usize> {
    let days = cached_trade_days(cache).await?;
    if days.is_empty() {
        debug!("No cached trading days, calendar keeps its holiday table");
        return Ok(0);
    }

    calendar.load_trade_days(&days);
    info!(
        "📅 Loaded {} trading days ({} .. {})",
        days.len(),
        days[0],
        days[days.len() - 1]
    );
    Ok(days.len())
}
