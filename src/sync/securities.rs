/// Cached security list
use tracing::{debug, warn};

use super::keys::SECURITIES;
use crate::cache::Cache;
use crate::error::Result;
use crate::types::Security;

/// Replace the cached list in a single write
pub async fn cache_security_list(cache: &dyn Cache, securities: &[Security]) -> Result<()> {
    let value = serde_json::to_string(securities)?;
    cache.set(SECURITIES, &value, None).await?;
    debug!("Cached {} securities", securities.len());
    Ok(())
}

/// Cached list; malformed entries are skipped. Missing list is empty.
pub async fn cached_securities(cache: &dyn Cache) -> Result<Vec<Security>> {
    let Some(raw) = cache.get(SECURITIES).await? else {
        return Ok(Vec::new());
    };

    let entries: Vec<serde_json::Value> = serde_json::from_str(&raw)?;
    let mut securities = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<Security>(entry) {
            Ok(sec) => securities.push(sec),
            Err(e) => warn!("Skipping cached security: {}", e),
        }
    }
    Ok(securities)
}

pub async fn cached_security_codes(cache: &dyn Cache) -> Result<Vec<String>> {
    Ok(cached_securities(cache)
        .await?
        .into_iter()
        .map(|s| s.code)
        .collect())
}
