/// Persisted sync cursors
use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::{debug, info};

use super::keys;
use crate::cache::Cache;
use crate::error::Result;
use crate::types::{parse_frame, FrameType};

/// Identifies one persisted sync stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKey {
    BarsTail(FrameType),
    ArchiveHead,
    ArchiveTail,
    TradePriceTail,
}

impl CursorKey {
    pub fn key(&self) -> String {
        match self {
            CursorKey::BarsTail(ft) => keys::bars_tail(*ft),
            CursorKey::ArchiveHead => keys::BAR_SYNC_ARCHIVE_HEAD.to_string(),
            CursorKey::ArchiveTail => keys::BAR_SYNC_ARCHIVE_TAIL.to_string(),
            CursorKey::TradePriceTail => keys::BAR_SYNC_TRADE_PRICE_TAIL.to_string(),
        }
    }

    /// Frame type deciding how the cursor value is formatted
    fn frame_type(&self) -> FrameType {
        match self {
            CursorKey::BarsTail(ft) => *ft,
            _ => FrameType::Day,
        }
    }
}

pub struct CursorStore {
    cache: Arc<dyn Cache>,
}

impl CursorStore {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        CursorStore { cache }
    }

    pub async fn get(&self, cursor: CursorKey) -> Result<Option<NaiveDateTime>> {
        match self.cache.get(&cursor.key()).await? {
            Some(raw) => Ok(Some(parse_frame(&raw)?)),
            None => Ok(None),
        }
    }

    /// Move the cursor forward to `frame`. Older values are ignored so a
    /// cursor never decreases. Returns true when the stored value changed.
    pub async fn advance(&self, cursor: CursorKey, frame: NaiveDateTime) -> Result<bool> {
        if let Some(current) = self.get(cursor).await? {
            if current >= frame {
                debug!("Cursor {} already at {}, not moving to {}", cursor.key(), current, frame);
                return Ok(false);
            }
        }
        self.write(cursor, frame).await?;
        Ok(true)
    }

    /// Set the cursor unconditionally (manual recovery)
    pub async fn reset(&self, cursor: CursorKey, frame: NaiveDateTime) -> Result<()> {
        info!("Resetting cursor {} to {}", cursor.key(), frame);
        self.write(cursor, frame).await
    }

    async fn write(&self, cursor: CursorKey, frame: NaiveDateTime) -> Result<()> {
        let value = cursor.frame_type().format_frame(frame);
        self.cache.set(&cursor.key(), &value, None).await?;
        debug!("Cursor {} = {}", cursor.key(), value);
        Ok(())
    }
}
