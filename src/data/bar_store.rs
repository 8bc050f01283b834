/// Bar storage - JSONL files, one per (frame type, security)
/// Writes are idempotent: a frame already on disk is overwritten, never duplicated
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{Result, SyncError};
use crate::types::{Bar, FrameType, PriceLimit};

/// Time-series sink for synced data
#[async_trait]
pub trait BarStore: Send + Sync {
    /// Merge `bars` into the series of `code`; returns the number written
    async fn save_bars(&self, code: &str, frame_type: FrameType, bars: &[Bar]) -> Result<usize>;

    async fn save_price_limits(&self, date: NaiveDate, limits: &[PriceLimit]) -> Result<usize>;

    /// Whole series of `code`, ordered by frame
    async fn load_bars(&self, code: &str, frame_type: FrameType) -> Result<Vec<Bar>>;
}

pub struct JsonlBarStore {
    root: PathBuf,

    /// One writer at a time per file
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl JsonlBarStore {
    pub fn new(root: PathBuf) -> Self {
        JsonlBarStore {
            root,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn bars_file(&self, code: &str, frame_type: FrameType) -> PathBuf {
        self.root.join(frame_type.as_str()).join(format!("{}.jsonl", code))
    }

    fn price_limits_file(&self, date: NaiveDate) -> PathBuf {
        self.root
            .join("price_limits")
            .join(format!("{}.jsonl", date.format("%Y-%m-%d")))
    }

    async fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(path.to_path_buf()).or_default())
    }

    /// Read JSONL records; a missing file is empty, unreadable lines are skipped
    async fn read_records<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
        let file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut lines = BufReader::new(file).lines();
        let mut records = Vec::new();
        while let Some(line) = lines.next_line().await? {
            match serde_json::from_str::<T>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping corrupt record in {}: {}", path.display(), e),
            }
        }
        Ok(records)
    }

    /// Replace `path` with `records` through a temp file and rename
    async fn write_records<T: serde::Serialize>(path: &Path, records: impl Iterator<Item = T>) -> Result<()> {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let tmp = path.with_extension("jsonl.tmp");
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)
            .await?;

        let mut buf = String::new();
        for record in records {
            buf.push_str(&serde_json::to_string(&record)?);
            buf.push('\n');
        }
        file.write_all(buf.as_bytes()).await?;
        file.sync_all().await?;

        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| SyncError::StorageError(format!("{}: {}", path.display(), e)))
    }
}

#[async_trait]
impl BarStore for JsonlBarStore {
    async fn save_bars(&self, code: &str, frame_type: FrameType, bars: &[Bar]) -> Result<usize> {
        if bars.is_empty() {
            return Ok(0);
        }

        let path = self.bars_file(code, frame_type);
        let lock = self.lock_for(&path).await;
        let _guard = lock.lock().await;

        let mut series: BTreeMap<NaiveDateTime, Bar> = Self::read_records::<Bar>(&path)
            .await?
            .into_iter()
            .map(|bar| (bar.frame, bar))
            .collect();
        for bar in bars {
            series.insert(bar.frame, bar.clone());
        }

        Self::write_records(&path, series.values()).await?;
        debug!(
            "Stored {} {} bars for {} ({} total)",
            bars.len(),
            frame_type,
            code,
            series.len()
        );
        Ok(bars.len())
    }

    async fn save_price_limits(&self, date: NaiveDate, limits: &[PriceLimit]) -> Result<usize> {
        if limits.is_empty() {
            return Ok(0);
        }

        let path = self.price_limits_file(date);
        let lock = self.lock_for(&path).await;
        let _guard = lock.lock().await;

        let mut by_code: BTreeMap<String, PriceLimit> = Self::read_records::<PriceLimit>(&path)
            .await?
            .into_iter()
            .map(|limit| (limit.code.clone(), limit))
            .collect();
        for limit in limits {
            by_code.insert(limit.code.clone(), limit.clone());
        }

        Self::write_records(&path, by_code.values()).await?;
        debug!("Stored {} price limits for {}", limits.len(), date);
        Ok(limits.len())
    }

    async fn load_bars(&self, code: &str, frame_type: FrameType) -> Result<Vec<Bar>> {
        let mut bars: Vec<Bar> = Self::read_records(&self.bars_file(code, frame_type)).await?;
        bars.sort_by_key(|b| b.frame);
        Ok(bars)
    }
}
