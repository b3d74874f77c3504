//! Per-second load counters and their reporter

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{get_current_pid, Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::task::JoinHandle;
use tracing::info;

const MIB: u64 = 1024 * 1024;

/// Counters shared by producers, workers and the reporter.
///
/// Every counter is its own atomic; nothing locks across them.
#[derive(Debug, Default)]
pub struct RealtimeStatistics {
    active_connections: AtomicU64,
    batches_received: AtomicU64,
    records_received: AtomicU64,
    queries: AtomicU64,
    rows_inserted: AtomicU64,
}

/// Values read by one [`RealtimeStatistics::snapshot_and_reset`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub active_connections: u64,
    pub batches_received: u64,
    pub records_received: u64,
    pub queries: u64,
    pub rows_inserted: u64,
    pub memory: MemoryUsage,
}

/// Memory figures in bytes; zero when the platform does not report them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryUsage {
    /// Resident memory of this process
    pub process_bytes: u64,
    /// Memory in use on the host
    pub used_bytes: u64,
    /// Installed memory on the host
    pub total_bytes: u64,
}

/// Reads process and host memory through `sysinfo`
pub struct MemorySampler {
    system: System,
    pid: Option<Pid>,
}

impl MemorySampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            pid: get_current_pid().ok(),
        }
    }

    pub fn sample(&mut self) -> MemoryUsage {
        self.system.refresh_memory();

        let process_bytes = match self.pid {
            Some(pid) => {
                self.system.refresh_processes_specifics(
                    ProcessesToUpdate::Some(&[pid]),
                    true,
                    ProcessRefreshKind::nothing().with_memory(),
                );
                self.system.process(pid).map_or(0, |p| p.memory())
            }
            None => 0,
        };

        MemoryUsage {
            process_bytes,
            used_bytes: self.system.used_memory(),
            total_bytes: self.system.total_memory(),
        }
    }
}

impl Default for MemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_connection(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement active connections, never below zero
    pub fn remove_connection(&self) {
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            });
    }

    pub fn add_batch(&self) {
        self.batches_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_records(&self, amount: u64) {
        self.records_received.fetch_add(amount, Ordering::Relaxed);
    }

    pub fn add_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_inserted_rows(&self, amount: u64) {
        self.rows_inserted.fetch_add(amount, Ordering::Relaxed);
    }

    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Read every counter and zero the per-second ones.
    ///
    /// Active connections is a running total and is left untouched. Memory
    /// is left at zero; the reporter fills it in.
    pub fn snapshot_and_reset(&self) -> StatsSnapshot {
        StatsSnapshot {
            active_connections: self.active_connections.load(Ordering::Relaxed),
            batches_received: self.batches_received.swap(0, Ordering::Relaxed),
            records_received: self.records_received.swap(0, Ordering::Relaxed),
            queries: self.queries.swap(0, Ordering::Relaxed),
            rows_inserted: self.rows_inserted.swap(0, Ordering::Relaxed),
            memory: MemoryUsage::default(),
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "clients={:4}, bulk_data_ps={:4}, actual_data_ps={:5}, queries_ps={:2}, inserts_ps={:5}, \
             process_ram={:4}MB, used_ram={:6}MB, total_ram={:6}MB",
            self.active_connections,
            self.batches_received,
            self.records_received,
            self.queries,
            self.rows_inserted,
            self.memory.process_bytes / MIB,
            self.memory.used_bytes / MIB,
            self.memory.total_bytes / MIB
        )
    }
}

/// Spawn the reporter: every `period`, snapshot, sample memory and log one line
pub fn spawn_reporter(stats: Arc<RealtimeStatistics>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut sampler = MemorySampler::new();
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let snapshot = StatsSnapshot {
                memory: sampler.sample(),
                ..stats.snapshot_and_reset()
            };
            info!(
                clients = snapshot.active_connections,
                bulk_data = snapshot.batches_received,
                records = snapshot.records_received,
                queries = snapshot.queries,
                inserts = snapshot.rows_inserted,
                process_ram = snapshot.memory.process_bytes,
                "{snapshot}"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_resets_per_second_counters() {
        let stats = RealtimeStatistics::new();
        stats.add_connection();
        stats.add_connection();
        stats.add_batch();
        stats.add_records(12);
        stats.add_query();
        stats.add_inserted_rows(12);

        let first = stats.snapshot_and_reset();
        assert_eq!(
            first,
            StatsSnapshot {
                active_connections: 2,
                batches_received: 1,
                records_received: 12,
                queries: 1,
                rows_inserted: 12,
                memory: MemoryUsage::default(),
            }
        );

        let second = stats.snapshot_and_reset();
        assert_eq!(second.active_connections, 2);
        assert_eq!(second.batches_received, 0);
        assert_eq!(second.records_received, 0);
        assert_eq!(second.queries, 0);
        assert_eq!(second.rows_inserted, 0);
    }

    #[test]
    fn test_connections_never_negative() {
        let stats = RealtimeStatistics::new();
        stats.remove_connection();
        assert_eq!(stats.active_connections(), 0);

        stats.add_connection();
        stats.remove_connection();
        stats.remove_connection();
        assert_eq!(stats.active_connections(), 0);
    }

    #[test]
    fn test_connections_net_across_threads() {
        let stats = RealtimeStatistics::new();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..1000 {
                        stats.add_connection();
                        stats.add_records(1);
                    }
                });
            }
        });
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..1000 {
                        stats.remove_connection();
                    }
                });
            }
        });

        let snapshot = stats.snapshot_and_reset();
        assert_eq!(snapshot.active_connections, 4000);
        assert_eq!(snapshot.records_received, 8000);
    }

    #[test]
    fn test_snapshot_line() {
        let snapshot = StatsSnapshot {
            active_connections: 800,
            batches_received: 800,
            records_received: 8000,
            queries: 10,
            rows_inserted: 8000,
            memory: MemoryUsage {
                process_bytes: 48 * MIB + 12,
                used_bytes: 6144 * MIB,
                total_bytes: 16384 * MIB,
            },
        };
        insta::assert_snapshot!(
            snapshot.to_string(),
            @"clients= 800, bulk_data_ps= 800, actual_data_ps= 8000, queries_ps=10, inserts_ps= 8000, process_ram=  48MB, used_ram=  6144MB, total_ram= 16384MB"
        );
    }

    #[test]
    fn test_memory_sampler_reports_host_memory() {
        let usage = MemorySampler::new().sample();

        assert!(usage.total_bytes > 0);
        assert!(usage.used_bytes <= usage.total_bytes);
        assert!(usage.process_bytes <= usage.total_bytes);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reporter_drains_counters() {
        let stats = Arc::new(RealtimeStatistics::new());
        stats.add_records(5);

        let handle = spawn_reporter(Arc::clone(&stats), Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(stats.snapshot_and_reset().records_received, 0);
        handle.abort();
    }
}
