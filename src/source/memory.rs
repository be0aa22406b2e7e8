//! In-memory log source for tests and demos.

use super::{LogEntry, LogSource, SourceError};
use chrono::{DateTime, Utc};

/// Log source backed by a vector of entries.
///
/// Entries are kept sorted by timestamp; appending out of order inserts
/// the entry at its sorted position after any entries with the same time.
#[derive(Debug, Default)]
pub struct MemorySource {
    entries: Vec<LogEntry>,
    cursor: usize,
    seeks: u64,
    failure: Option<String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source pre-filled with `entries`.
    pub fn from_entries(entries: impl IntoIterator<Item = LogEntry>) -> Self {
        let mut source = Self::new();
        for entry in entries {
            source.push(entry);
        }
        source
    }

    /// Appends an entry.
    pub fn push(&mut self, entry: LogEntry) {
        let at = self
            .entries
            .partition_point(|e| e.timestamp <= entry.timestamp);
        self.entries.insert(at, entry);
    }

    /// Makes every subsequent call fail with `SourceError::Unavailable`.
    pub fn fail_with(&mut self, reason: impl Into<String>) {
        self.failure = Some(reason.into());
    }

    /// Number of entries held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries are held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of seeks performed so far.
    pub fn seek_count(&self) -> u64 {
        self.seeks
    }

    fn check(&self) -> Result<(), SourceError> {
        match &self.failure {
            Some(reason) => Err(SourceError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

impl LogSource for MemorySource {
    fn seek(&mut self, at: DateTime<Utc>) -> Result<(), SourceError> {
        self.check()?;
        self.cursor = self.entries.partition_point(|e| e.timestamp < at);
        self.seeks += 1;
        Ok(())
    }

    fn next_entry(&mut self) -> Result<Option<LogEntry>, SourceError> {
        self.check()?;
        let entry = self.entries.get(self.cursor).cloned();
        if entry.is_some() {
            self.cursor += 1;
        }
        Ok(entry)
    }
}
