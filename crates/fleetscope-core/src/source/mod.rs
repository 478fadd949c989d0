//! Reading sources
//!
//! The engine never stores readings. It asks a [`ReadingSource`] for the
//! readings of one device and range, once per domain, and forgets them when
//! the request completes.

mod memory;

pub use memory::MemoryReadingSource;

use async_trait::async_trait;
use thiserror::Error;

use crate::range::TimeRange;
use crate::reading::{Reading, ReadingField};

/// Errors raised by a reading source
#[derive(Error, Debug)]
pub enum SourceError {
    /// The backing store cannot be reached
    #[error("Reading source unavailable: {0}")]
    Unavailable(String),

    /// A readings file could not be read
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A readings file is not a JSON array of readings
    #[error("Invalid readings JSON: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Where readings come from
#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// Readings of `device_id` inside `range` that carry at least one of
    /// `fields` (all readings when `fields` is empty), ascending by timestamp
    async fn find(
        &self,
        device_id: &str,
        range: &TimeRange,
        fields: &[ReadingField],
    ) -> Result<Vec<Reading>, SourceError>;

    /// Whether the source has ever seen the device
    async fn device_exists(&self, device_id: &str) -> Result<bool, SourceError>;
}
