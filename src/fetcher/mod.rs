/// Quotes fetcher capability and its registry
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use crate::error::Result;
use crate::types::{Bar, FrameType, PriceLimit, Security};

pub mod csv_fetcher;
pub mod registry;

pub use csv_fetcher::CsvQuotesFetcher;
pub use registry::FetcherRegistry;

/// Capability every quotes provider adapter implements
#[async_trait]
pub trait QuotesFetcher: Send + Sync {
    /// Implementation name as configured (`impl = "..."`)
    fn impl_name(&self) -> &str;

    /// Full security list: code, display name, name, listing dates, type
    async fn get_security_list(&self) -> Result<Vec<Security>>;

    /// Up to `n_bars` bars of `code` whose last frame is at or before `end`.
    /// An empty result is valid (suspended security, partial day).
    async fn get_bars(
        &self,
        code: &str,
        end: NaiveDateTime,
        n_bars: usize,
        frame_type: FrameType,
    ) -> Result<Vec<Bar>>;

    /// Trade price limits of all securities for `date`
    async fn get_trade_price_limits(&self, date: NaiveDate) -> Result<Vec<PriceLimit>>;

    /// Every trading day the provider knows of, ascending
    async fn get_all_trade_days(&self) -> Result<Vec<NaiveDate>>;

    /// Calls left with the provider; `None` when it does not meter them
    async fn get_quota(&self) -> Result<Option<u64>> {
        Ok(None)
    }
}
