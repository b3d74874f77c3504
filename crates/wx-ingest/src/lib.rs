//! Station connection handling
//!
//! Accepts TCP connections from weather stations, splits their stream into
//! `<WEATHERDATA>` documents and hands the parsed readings to the station
//! store.

pub mod listener;
pub mod parser;

pub use listener::*;
pub use parser::*;

use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to bind {0}: {1}")]
    Bind(SocketAddr, #[source] std::io::Error),

    #[error("Communication error: {0}")]
    CommunicationError(#[from] std::io::Error),
}

pub type IngestResult<T> = Result<T, IngestError>;
