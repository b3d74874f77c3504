//! Core data types for station ingestion
//!
//! This crate provides the station reading model with its merge rules and
//! the persistence seam the rest of the pipeline writes through.

pub mod pipeline;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;

pub use pipeline::*;
pub use types::*;
