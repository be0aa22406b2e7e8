//! systemd journal source.
//!
//! Every seek runs `journalctl --output=json` for the configured unit,
//! starting at the requested second, and buffers the decoded records.
//! `journalctl` exits once it has written what is already in the journal,
//! so reads never wait for new records.

use super::{LogEntry, LogSource, SourceError};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Command;

/// Program used when none is configured.
pub const DEFAULT_JOURNALCTL: &str = "journalctl";

const FIELD_TIMESTAMP: &str = "__REALTIME_TIMESTAMP";
const FIELD_MESSAGE: &str = "MESSAGE";
const FIELD_UNIT: &str = "_SYSTEMD_UNIT";

/// Reads one unit's records from the systemd journal.
#[derive(Debug)]
pub struct JournalSource {
    unit: String,
    program: PathBuf,
    buffer: VecDeque<LogEntry>,
}

impl JournalSource {
    /// Creates a source for `unit` using `journalctl` from `PATH`.
    pub fn new(unit: impl Into<String>) -> Self {
        Self::with_program(unit, DEFAULT_JOURNALCTL)
    }

    /// Creates a source that runs a specific `journalctl` binary.
    pub fn with_program(unit: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            unit: unit.into(),
            program: program.into(),
            buffer: VecDeque::new(),
        }
    }

    /// Returns the unit being read.
    pub fn unit(&self) -> &str {
        &self.unit
    }

    fn query(&self, since: DateTime<Utc>) -> Result<Vec<u8>, SourceError> {
        let output = Command::new(&self.program)
            .arg(format!("--unit={}", self.unit))
            .arg("--output=json")
            .arg("--no-pager")
            .arg("--quiet")
            .arg(format!("--since=@{}", since.timestamp()))
            .output()
            .map_err(|e| {
                SourceError::Unavailable(format!("{}: {}", self.program.display(), e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::Unavailable(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }
}

impl LogSource for JournalSource {
    fn seek(&mut self, at: DateTime<Utc>) -> Result<(), SourceError> {
        let stdout = self.query(at)?;
        let text = String::from_utf8_lossy(&stdout);

        self.buffer.clear();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            match parse_record(line)? {
                Some(entry) if entry.timestamp >= at => self.buffer.push_back(entry),
                Some(_) => {}
                None => tracing::trace!("Skipping journal record without timestamp"),
            }
        }

        tracing::trace!(
            unit = %self.unit,
            since = %at,
            records = self.buffer.len(),
            "Journal queried"
        );
        Ok(())
    }

    fn next_entry(&mut self) -> Result<Option<LogEntry>, SourceError> {
        Ok(self.buffer.pop_front())
    }
}

/// Decodes one line of `journalctl --output=json`.
///
/// Returns `Ok(None)` for records without a realtime timestamp.
pub(crate) fn parse_record(line: &str) -> Result<Option<LogEntry>, SourceError> {
    let record: Value =
        serde_json::from_str(line).map_err(|e| SourceError::Decode(e.to_string()))?;

    let Some(micros) = record
        .get(FIELD_TIMESTAMP)
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<i64>().ok())
    else {
        return Ok(None);
    };

    let timestamp = Utc
        .timestamp_micros(micros)
        .single()
        .ok_or_else(|| SourceError::Decode(format!("timestamp out of range: {micros}")))?;

    let message = match record.get(FIELD_MESSAGE) {
        Some(Value::String(s)) => s.clone(),
        // Non-UTF-8 messages are exported as byte arrays.
        Some(Value::Array(bytes)) => {
            let bytes: Vec<u8> = bytes
                .iter()
                .filter_map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect();
            String::from_utf8_lossy(&bytes).into_owned()
        }
        _ => String::new(),
    };

    let unit = record
        .get(FIELD_UNIT)
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(Some(LogEntry {
        timestamp,
        message,
        unit,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_string_message() {
        let line = r#"{"__REALTIME_TIMESTAMP":"1700000000123456","MESSAGE":"hello","_SYSTEMD_UNIT":"eth-miner.service"}"#;
        let entry = parse_record(line).unwrap().unwrap();

        assert_eq!(entry.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(entry.timestamp.timestamp_subsec_micros(), 123_456);
        assert_eq!(entry.message, "hello");
        assert_eq!(entry.unit.as_deref(), Some("eth-miner.service"));
    }

    #[test]
    fn test_parse_byte_array_message() {
        let line = r#"{"__REALTIME_TIMESTAMP":"1700000000000000","MESSAGE":[27,91,48,109,104,105]}"#;
        let entry = parse_record(line).unwrap().unwrap();

        assert_eq!(entry.message, "\u{1b}[0mhi");
        assert!(entry.unit.is_none());
    }

    #[test]
    fn test_parse_missing_timestamp() {
        assert!(parse_record(r#"{"MESSAGE":"x"}"#).unwrap().is_none());
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(matches!(
            parse_record("not json"),
            Err(SourceError::Decode(_))
        ));
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let mut source =
            JournalSource::with_program("eth-miner.service", "/nonexistent/journalctl");
        assert!(matches!(
            source.seek(Utc::now()),
            Err(SourceError::Unavailable(_))
        ));
    }
}
