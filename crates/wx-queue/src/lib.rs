//! Load-balanced insertion of station readings
//!
//! Keeps the latest reading of every station, flushes a fixed slice of the
//! stations on each scheduler tick and hands the resulting chunks to a fixed
//! pool of insert workers through a zero-buffer channel.

pub mod rendezvous;
pub mod retention;
pub mod scheduler;
pub mod statistics;
pub mod store;
pub mod workers;

pub use retention::*;
pub use scheduler::*;
pub use statistics::*;
pub use store::*;
pub use workers::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Persistence error: {0}")]
    Persistence(#[from] wx_core::PersistenceError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("All insert workers have stopped")]
    ChannelClosed,
}

pub type QueueResult<T> = Result<T, QueueError>;
