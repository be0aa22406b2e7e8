//! Log sources the poll loop reads from.
//!
//! A source is an append-only, timestamp-ordered stream that can be
//! repositioned to a point in time and then read forward one entry at a
//! time. Reading never waits for new entries: when nothing is buffered
//! `next_entry` returns `Ok(None)` straight away.

mod journal;
mod memory;

pub use journal::{JournalSource, DEFAULT_JOURNALCTL};
pub use memory::MemorySource;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while reading a log source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("log source unavailable: {0}")]
    Unavailable(String),

    #[error("failed to decode log entry: {0}")]
    Decode(String),
}

/// A single journal record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Wall-clock time the record was written.
    pub timestamp: DateTime<Utc>,
    /// Raw message text, decoration included.
    pub message: String,
    /// Service unit that produced the record, when the source knows it.
    pub unit: Option<String>,
}

impl LogEntry {
    /// Creates an entry without unit information.
    pub fn new(timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: message.into(),
            unit: None,
        }
    }

    /// Attaches the producing unit.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// Trait for log sources.
///
/// Allows the poll loop to run against the systemd journal in production
/// and an in-memory fake in tests.
pub trait LogSource {
    /// Positions the reader so the next entry returned is the first one
    /// with a timestamp at or after `at`.
    fn seek(&mut self, at: DateTime<Utc>) -> Result<(), SourceError>;

    /// Returns the next entry after the current position, or `None` if
    /// there is nothing more to read right now.
    fn next_entry(&mut self) -> Result<Option<LogEntry>, SourceError>;
}

impl<S: LogSource + ?Sized> LogSource for Box<S> {
    fn seek(&mut self, at: DateTime<Utc>) -> Result<(), SourceError> {
        (**self).seek(at)
    }

    fn next_entry(&mut self) -> Result<Option<LogEntry>, SourceError> {
        (**self).next_entry()
    }
}
