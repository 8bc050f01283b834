/// Tracing subscriber setup
use tracing_subscriber::EnvFilter;

use crate::error::{Result, SyncError};
use crate::types::{Config, LogFormat};

/// Install the global subscriber. `RUST_LOG` wins over `log_level`.
pub fn init_logging(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("barsync={},info", config.log_level)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    let result = match config.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };

    result.map_err(|e| SyncError::ConfigError(format!("Failed to initialize logging: {}", e)))
}
