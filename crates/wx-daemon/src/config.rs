//! Daemon configuration from a TOML file and environment variables

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use wx_db::MAX_ROWS_PER_INSERT;
use wx_queue::SchedulerConfig;

/// Default configuration file, overridden by `WX_CONFIG`
const DEFAULT_CONFIG_PATH: &str = "server.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// MySQL database connection URL
    pub db_url: String,

    /// TCP port stations connect to
    pub server_port: u16,

    /// Every station is written once per this interval
    pub station_update_interval_ms: u64,

    /// Scheduler tick; the update interval is split into this many slices
    pub bulk_update_interval_ms: u64,

    /// Maximum rows in one INSERT statement
    pub inserts_per_query: usize,

    /// Number of insert workers, each with its own connection
    pub insert_query_threads: usize,

    /// Readings older than this are deleted; 0 disables deletion
    pub auto_deletion_max_age_seconds: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            db_url: "mysql://localhost/weather".to_string(),
            server_port: 7789,
            station_update_interval_ms: 10_000,
            bulk_update_interval_ms: 100,
            inserts_per_query: 1000,
            insert_query_threads: 4,
            auto_deletion_max_age_seconds: 86_400,
        }
    }
}

impl DaemonConfig {
    /// Load from `WX_CONFIG` (default `server.toml`) if present, then apply
    /// environment overrides
    pub fn load() -> Result<Self> {
        let path = env::var("WX_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = if Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        if let Ok(url) = env::var("DATABASE_URL") {
            config.db_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        self.scheduler_config()?;

        if self.insert_query_threads == 0 {
            bail!("insert_query_threads must be at least 1");
        }
        if self.inserts_per_query > MAX_ROWS_PER_INSERT {
            bail!(
                "inserts_per_query {} exceeds the maximum of {} rows per statement",
                self.inserts_per_query,
                MAX_ROWS_PER_INSERT
            );
        }
        Ok(())
    }

    pub fn scheduler_config(&self) -> Result<SchedulerConfig> {
        SchedulerConfig::new(
            self.station_update_interval_ms,
            self.bulk_update_interval_ms,
            self.inserts_per_query,
        )
        .context("Invalid scheduler settings")
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.server_port))
    }

    pub fn auto_deletion_enabled(&self) -> bool {
        self.auto_deletion_max_age_seconds > 0
    }
}
