//! Staggered flush scheduler
//!
//! Example: a 10 second update interval split into 100 ticks flushes the
//! stations of one slot every 100ms, so each station is written once per
//! interval and the inserts are spread evenly over it instead of arriving
//! as one burst.

use crate::rendezvous::RendezvousSender;
use crate::store::StationStore;
use crate::{QueueError, QueueResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use wx_core::CompleteReading;

/// A size-bounded group of readings written by one INSERT
pub type Chunk = Vec<CompleteReading>;

/// Timing and batching parameters of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    update_interval_ms: u64,
    tick_count: usize,
    max_rows_per_batch: usize,
}

impl SchedulerConfig {
    /// Derive the slot count from the full cycle and the tick length
    pub fn new(
        update_interval_ms: u64,
        tick_interval_ms: u64,
        max_rows_per_batch: usize,
    ) -> QueueResult<Self> {
        if tick_interval_ms == 0 {
            return Err(QueueError::InvalidConfig(
                "tick interval must be positive".to_string(),
            ));
        }
        if tick_interval_ms > update_interval_ms {
            return Err(QueueError::InvalidConfig(format!(
                "tick interval {tick_interval_ms}ms exceeds update interval {update_interval_ms}ms"
            )));
        }
        if max_rows_per_batch == 0 {
            return Err(QueueError::InvalidConfig(
                "batch size must be positive".to_string(),
            ));
        }

        Ok(Self {
            update_interval_ms,
            tick_count: (update_interval_ms / tick_interval_ms) as usize,
            max_rows_per_batch,
        })
    }

    pub fn tick_count(&self) -> usize {
        self.tick_count
    }

    pub fn max_rows_per_batch(&self) -> usize {
        self.max_rows_per_batch
    }

    /// Length of one tick; truncated when the interval does not divide evenly
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms / self.tick_count as u64)
    }
}

/// Split readings into chunks of at most `max_rows`, preserving order
pub fn into_chunks(readings: Vec<CompleteReading>, max_rows: usize) -> Vec<Chunk> {
    let max_rows = max_rows.max(1);
    let mut chunks = Vec::with_capacity(readings.len().div_ceil(max_rows));
    let mut current = Vec::with_capacity(max_rows.min(readings.len()));

    for reading in readings {
        if current.len() >= max_rows {
            chunks.push(std::mem::replace(&mut current, Vec::with_capacity(max_rows)));
        }
        current.push(reading);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Walks the slots of a [`StationStore`] one tick at a time
pub struct BatchScheduler {
    store: Arc<StationStore>,
    config: SchedulerConfig,
    slot: usize,
}

impl BatchScheduler {
    /// Fails unless the store has exactly one slot per tick
    pub fn new(store: Arc<StationStore>, config: SchedulerConfig) -> QueueResult<Self> {
        if store.slot_count() != config.tick_count {
            return Err(QueueError::InvalidConfig(format!(
                "store has {} slots but the scheduler walks {} per cycle",
                store.slot_count(),
                config.tick_count
            )));
        }
        Ok(Self {
            store,
            config,
            slot: 0,
        })
    }

    /// Slot the next tick will process
    pub fn current_slot(&self) -> usize {
        self.slot
    }

    /// Collect the due readings of the current slot and advance to the next one
    pub fn tick(&mut self) -> Vec<Chunk> {
        let slot = self.slot;
        self.slot = (self.slot + 1) % self.config.tick_count;

        let drain = self.store.drain_slot(slot);
        for station_id in &drain.incomplete {
            warn!(station = station_id, slot, "Dropping incomplete reading");
        }

        into_chunks(drain.due, self.config.max_rows_per_batch)
    }

    /// Run the tick loop, handing every chunk to the insert workers.
    ///
    /// Returns once all workers are gone.
    pub async fn run(mut self, mut sender: RendezvousSender<Chunk>) -> QueueResult<()> {
        let period = self.config.tick_period();
        info!(
            slots = self.config.tick_count,
            tick_ms = period.as_millis() as u64,
            max_rows = self.config.max_rows_per_batch,
            "Batch scheduler started"
        );

        loop {
            let started = Instant::now();
            let slot = self.slot;

            let chunks = self.tick();
            if !chunks.is_empty() {
                debug!(slot, chunks = chunks.len(), "Dispatching chunks");
            }
            for chunk in chunks {
                sender.send(chunk).await?;
            }

            // Sleep out the rest of the tick so lateness does not accumulate
            tokio::time::sleep(period.saturating_sub(started.elapsed())).await;
        }
    }
}
