//! Fixed pool of insert workers, one database connection each

use crate::rendezvous::RendezvousReceiver;
use crate::scheduler::Chunk;
use crate::statistics::RealtimeStatistics;
use crate::QueueResult;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};
use wx_core::{Connector, Persistence};

/// Handles of the running insert workers
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Open `count` connections, then start one worker per connection.
    ///
    /// Fails without starting anything if any connection cannot be opened.
    pub async fn start(
        connector: Arc<dyn Connector>,
        count: usize,
        chunks: RendezvousReceiver<Chunk>,
        stats: Arc<RealtimeStatistics>,
    ) -> QueueResult<Self> {
        info!("Starting {} insert workers", count);

        let mut connections = Vec::with_capacity(count);
        for _ in 0..count {
            connections.push(connector.connect().await?);
        }

        let handles = connections
            .into_iter()
            .enumerate()
            .map(|(id, conn)| {
                tokio::spawn(run_worker(id, conn, chunks.clone(), Arc::clone(&stats)))
            })
            .collect();

        Ok(Self { handles })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to finish; they do once the scheduler is gone
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Insert worker panicked: {}", e);
            }
        }
    }
}

#[instrument(skip(conn, chunks, stats))]
async fn run_worker(
    id: usize,
    mut conn: Box<dyn Persistence>,
    chunks: RendezvousReceiver<Chunk>,
    stats: Arc<RealtimeStatistics>,
) {
    while let Some(chunk) = chunks.recv().await {
        if chunk.is_empty() {
            continue;
        }

        match conn.insert_batch(&chunk).await {
            Ok(_) => {
                stats.add_query();
                stats.add_inserted_rows(chunk.len() as u64);
            }
            Err(e) => {
                // No replay path; these rows are lost
                error!(rows = chunk.len(), "Batch insert failed: {}", e);
            }
        }
    }

    info!("Insert worker stopped");
}
