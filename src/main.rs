/// Main entry point for the quotes sync service
use anyhow::Context;
use std::str::FromStr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use barsync::{
    config::load_config,
    error::{Result, SyncError},
    logging::init_logging,
    master::{default_cron_table, CronRegistrar},
    worker::Worker,
    AppContext, BackendKind,
};

const USAGE: &str = "usage: barsync <jobs|worker|all>";

/// Which half of the system this process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Jobs,
    Worker,
    All,
}

impl FromStr for Role {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "jobs" => Ok(Role::Jobs),
            "worker" => Ok(Role::Worker),
            "all" => Ok(Role::All),
            other => Err(SyncError::InvalidParameter(format!("unknown role '{}'", other))),
        }
    }
}

/// Application state
pub struct SyncApp {
    ctx: AppContext,
    role: Role,
}

impl SyncApp {
    pub async fn new(config_path: &str, role: Role) -> Result<Self> {
        let config = load_config(config_path)?;
        init_logging(&config)?;

        info!("Starting barsync as {:?}...", role);

        if config.backend.kind == BackendKind::Memory && role != Role::All {
            return Err(SyncError::ConfigError(
                "the memory backend only works with role `all`".to_string(),
            ));
        }

        let ctx = AppContext::connect(config).await?;
        info!("Configuration loaded, {} fetcher(s) configured", ctx.fetchers.len());

        Ok(SyncApp { ctx, role })
    }

    /// Start the configured roles and serve until Ctrl+C
    pub async fn run(&self) -> Result<()> {
        let mut handles: Vec<JoinHandle<()>> = Vec::new();

        if matches!(self.role, Role::Worker | Role::All) {
            let worker = Arc::new(Worker::new(self.ctx.clone()));
            handles.extend(worker.start().await?);
        }

        if matches!(self.role, Role::Jobs | Role::All) {
            if self.ctx.config.jobs.enabled {
                let registrar = CronRegistrar::new(self.ctx.clone(), default_cron_table()?);
                handles.extend(registrar.start());
            } else {
                warn!("Jobs are disabled in configuration, master idle");
            }
        }

        info!("✅ barsync running - Ctrl+C to stop");
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| SyncError::InternalError(format!("Failed to listen for Ctrl+C: {}", e)))?;

        info!("Ctrl+C received - shutting down");
        for handle in handles {
            handle.abort();
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let role: Role = match std::env::args().nth(1) {
        Some(arg) => arg.parse().context(USAGE)?,
        None => Role::All,
    };
    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());

    let app = SyncApp::new(&config_path, role)
        .await
        .with_context(|| format!("failed to start from {}", config_path))?;

    if let Err(e) = app.run().await {
        error!("Fatal error: {} ({})", e, e.error_code());
        return Err(e.into());
    }

    Ok(())
}
