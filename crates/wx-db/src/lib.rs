//! MySQL persistence for station readings
//!
//! Uses the existing `data` table - NO migrations.
//! Each [`DbClient`] owns exactly one connection.

pub mod client;
pub mod queries;
pub mod schema;

pub use client::*;
pub use schema::*;

use thiserror::Error;
use wx_core::PersistenceError;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Batch of {0} rows exceeds the statement placeholder limit")]
    BatchTooLarge(usize),
}

pub type DbResult<T> = Result<T, DbError>;

impl From<DbError> for PersistenceError {
    fn from(err: DbError) -> Self {
        PersistenceError::Statement(err.to_string())
    }
}
