use crate::{CompleteReading, Timestamp};

/// Failure reported by a persistence backend
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Failed to open connection: {0}")]
    Connect(String),

    #[error("Statement failed: {0}")]
    Statement(String),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// One exclusively owned connection to the measurement table
#[async_trait::async_trait]
pub trait Persistence: Send {
    /// Insert all rows with a single statement, returning rows affected
    async fn insert_batch(&mut self, rows: &[CompleteReading]) -> PersistenceResult<u64>;

    /// Delete every row whose date is strictly before `cutoff`
    async fn delete_older_than(&mut self, cutoff: Timestamp) -> PersistenceResult<u64>;
}

/// Opens new [`Persistence`] connections
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> PersistenceResult<Box<dyn Persistence>>;
}
