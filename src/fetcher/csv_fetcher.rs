/// Offline quotes fetcher reading exported CSV files
///
/// Directory layout under `root`:
///   securities.csv                 code,display_name,name,start_date,end_date,type
///   <frame_type>/<code>.csv        frame,open,high,low,close,volume,amount[,factor]
///   price_limits/<YYYY-mm-dd>.csv  code,high_limit,low_limit
///   calendar.csv                   date
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::QuotesFetcher;
use crate::error::{Result, SyncError};
use crate::types::{parse_frame, Bar, FetcherConfig, FrameType, PriceLimit, Security};

#[derive(Debug, Deserialize)]
struct BarRow {
    frame: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    amount: f64,
    #[serde(default)]
    factor: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PriceLimitRow {
    code: String,
    high_limit: f64,
    low_limit: f64,
}

#[derive(Debug, Deserialize)]
struct TradeDayRow {
    date: NaiveDate,
}

pub struct CsvQuotesFetcher {
    root: PathBuf,
}

impl CsvQuotesFetcher {
    pub fn new(root: PathBuf) -> Self {
        CsvQuotesFetcher { root }
    }

    pub fn from_config(config: &FetcherConfig) -> Result<Self> {
        let root = config.root.clone().ok_or_else(|| {
            SyncError::ConfigError("csv fetcher requires `root`".to_string())
        })?;
        Ok(Self::new(root))
    }

    /// Deserialize every row of `path`; a missing file yields no rows
    async fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No data file at {}", path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(SyncError::FetchFailed(format!("{}: {}", path.display(), e))),
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(bytes.as_slice());

        let mut rows = Vec::new();
        for row in reader.deserialize() {
            rows.push(row?);
        }
        Ok(rows)
    }
}

#[async_trait]
impl QuotesFetcher for CsvQuotesFetcher {
    fn impl_name(&self) -> &str {
        "csv"
    }

    async fn get_security_list(&self) -> Result<Vec<Security>> {
        Self::read_rows(&self.root.join("securities.csv")).await
    }

    async fn get_bars(
        &self,
        code: &str,
        end: NaiveDateTime,
        n_bars: usize,
        frame_type: FrameType,
    ) -> Result<Vec<Bar>> {
        let path = self
            .root
            .join(frame_type.as_str())
            .join(format!("{}.csv", code));
        let rows: Vec<BarRow> = Self::read_rows(&path).await?;

        let mut bars = Vec::with_capacity(rows.len());
        for row in rows {
            let frame = parse_frame(&row.frame)
                .map_err(|_| SyncError::InvalidBarData(format!("{}: bad frame {}", code, row.frame)))?;
            if frame > end {
                continue;
            }
            bars.push(Bar {
                frame,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
                amount: row.amount,
                factor: row.factor,
            });
        }

        bars.sort_by_key(|b| b.frame);
        let skip = bars.len().saturating_sub(n_bars);
        Ok(bars.split_off(skip))
    }

    async fn get_trade_price_limits(&self, date: NaiveDate) -> Result<Vec<PriceLimit>> {
        let path = self
            .root
            .join("price_limits")
            .join(format!("{}.csv", date.format("%Y-%m-%d")));
        let rows: Vec<PriceLimitRow> = Self::read_rows(&path).await?;

        Ok(rows
            .into_iter()
            .map(|row| PriceLimit {
                code: row.code,
                frame: date,
                high_limit: row.high_limit,
                low_limit: row.low_limit,
            })
            .collect())
    }

    async fn get_all_trade_days(&self) -> Result<Vec<NaiveDate>> {
        let rows: Vec<TradeDayRow> = Self::read_rows(&self.root.join("calendar.csv")).await?;
        let mut days: Vec<NaiveDate> = rows.into_iter().map(|row| row.date).collect();
        days.sort();
        days.dedup();
        Ok(days)
    }
}
