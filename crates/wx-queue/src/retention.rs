//! Periodic deletion of aged readings

use crate::statistics::RealtimeStatistics;
use crate::QueueResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};
use wx_core::{Connector, Timestamp};

/// Default time between two sweeps
pub const DEFAULT_SWEEP_PERIOD: Duration = Duration::from_secs(30 * 60);

/// Deletes every reading older than `max_age_seconds`, once per period
pub struct RetentionSweeper {
    connector: Arc<dyn Connector>,
    stats: Arc<RealtimeStatistics>,
    max_age_seconds: u64,
    period: Duration,
}

impl RetentionSweeper {
    pub fn new(
        connector: Arc<dyn Connector>,
        stats: Arc<RealtimeStatistics>,
        max_age_seconds: u64,
    ) -> Self {
        Self {
            connector,
            stats,
            max_age_seconds,
            period: DEFAULT_SWEEP_PERIOD,
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Oldest timestamp that survives a sweep run at `now`
    pub fn cutoff(&self, now: Timestamp) -> Timestamp {
        now.saturating_sub(self.max_age_seconds as i64)
    }

    /// Run one sweep as of `now` on a fresh connection
    pub async fn sweep_once(&self, now: Timestamp) -> QueueResult<u64> {
        let mut conn = self.connector.connect().await?;
        let deleted = conn.delete_older_than(self.cutoff(now)).await?;
        self.stats.add_query();
        Ok(deleted)
    }

    /// Sweep immediately, then once every period, forever
    pub fn spawn(self) -> JoinHandle<()> {
        info!(
            "Deleting all readings once they are older than {} seconds",
            self.max_age_seconds
        );

        tokio::spawn(async move {
            loop {
                let now = chrono::Utc::now().timestamp();
                match self.sweep_once(now).await {
                    Ok(deleted) => info!("Deleted {} old readings", deleted),
                    Err(e) => error!("Retention sweep failed: {}", e),
                }

                tokio::time::sleep(self.period).await;
            }
        })
    }
}
