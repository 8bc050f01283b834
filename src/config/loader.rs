/// Configuration loading: TOML file layered with `BARSYNC__*` environment overrides
use ::config::{Config as ConfigSource, Environment, File};
use chrono_tz::Tz;
use std::path::Path;

use crate::error::{Result, SyncError};
use crate::time::SessionHours;
use crate::types::Config;

pub const ENV_PREFIX: &str = "BARSYNC";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let source = ConfigSource::builder()
        .add_source(File::from(path.as_ref()))
        // e.g. BARSYNC__BACKEND__REDIS_DSN, BARSYNC__WORKER__ACCOUNT
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| SyncError::ConfigError(format!("Failed to read config file: {}", e)))?;

    let config: Config = source
        .try_deserialize()
        .map_err(|e| SyncError::ConfigError(format!("Failed to parse config: {}", e)))?;

    validate_config(&config)?;

    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<()> {
    config
        .timezone
        .parse::<Tz>()
        .map_err(|e| SyncError::ConfigError(format!("Invalid timezone '{}': {}", config.timezone, e)))?;

    SessionHours::from_config(&config.calendar)?;

    let jobs = &config.jobs;
    let timeouts = [
        ("minute_timeout_per_frame_secs", jobs.minute_timeout_per_frame_secs),
        ("after_hour_timeout_secs", jobs.after_hour_timeout_secs),
        ("calendar_frames_timeout_secs", jobs.calendar_frames_timeout_secs),
        ("security_list_timeout_secs", jobs.security_list_timeout_secs),
        ("price_limit_timeout_secs", jobs.price_limit_timeout_secs),
        ("calendar_sync_timeout_secs", jobs.calendar_sync_timeout_secs),
        ("quota_ttl_secs", jobs.quota_ttl_secs),
    ];
    for (name, value) in timeouts {
        if value == 0 {
            return Err(SyncError::ConfigError(format!("jobs.{} must be > 0", name)));
        }
    }

    if config.worker.batch_size == 0 {
        return Err(SyncError::ConfigError("worker.batch_size must be > 0".to_string()));
    }
    if config.worker.heartbeat_interval_secs == 0 {
        return Err(SyncError::ConfigError(
            "worker.heartbeat_interval_secs must be > 0".to_string(),
        ));
    }

    Ok(())
}
