//! Time-windowed polling of the log source.
//!
//! Each tick drains the entries that arrived in `(previous end, now]`,
//! classifies them and applies the resulting updates to the metric store.
//! Windows are contiguous: every window starts where the previous one
//! ended, so with a timestamp-ordered source each entry is considered
//! exactly once.

use crate::metrics::MetricStore;
use crate::parsing::{MatchResult, PatternMatcher};
use crate::source::{LogEntry, LogSource, SourceError};
use chrono::{DateTime, Utc};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

/// Interval between polls when none is configured.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Half-open time range `(start, end]` covered by one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollWindow {
    /// Exclusive lower bound.
    pub start: DateTime<Utc>,
    /// Inclusive upper bound.
    pub end: DateTime<Utc>,
}

impl PollWindow {
    /// Returns true if `ts` falls inside the window.
    #[inline]
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start < ts && ts <= self.end
    }
}

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Waiting for the next tick.
    Idle,
    /// Consuming the entries of a window.
    Draining(PollWindow),
}

/// Per-window counts, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowStats {
    /// Window that was drained.
    pub window: PollWindow,
    /// Entries inside the window from the configured unit.
    pub entries: u64,
    /// Entries that produced a metric update.
    pub matched: u64,
    /// Entries dropped because a field failed to parse.
    pub field_errors: u64,
    /// Entries skipped: at or before the window start, or from another unit.
    pub skipped: u64,
}

impl WindowStats {
    fn new(window: PollWindow) -> Self {
        Self {
            window,
            entries: 0,
            matched: 0,
            field_errors: 0,
            skipped: 0,
        }
    }
}

/// Drives the log source, the matcher and the metric store.
pub struct PollLoop<S> {
    source: S,
    store: Arc<MetricStore>,
    matcher: PatternMatcher,
    unit: Option<String>,
    interval: Duration,
    last_end: DateTime<Utc>,
    state: PollState,
}

impl<S: LogSource> PollLoop<S> {
    /// Creates a loop whose first window starts (exclusively) at `start`.
    pub fn new(source: S, store: Arc<MetricStore>, start: DateTime<Utc>) -> Self {
        Self {
            source,
            store,
            matcher: PatternMatcher::standard(),
            unit: None,
            interval: DEFAULT_INTERVAL,
            last_end: start,
            state: PollState::Idle,
        }
    }

    /// Only consume entries from `unit`.
    ///
    /// Entries that carry no unit are assumed to come from it.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Sets the tick interval used by [`PollLoop::run`].
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Replaces the template set.
    pub fn with_matcher(mut self, matcher: PatternMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Current state.
    pub fn state(&self) -> PollState {
        self.state
    }

    /// End of the most recent window.
    pub fn last_end(&self) -> DateTime<Utc> {
        self.last_end
    }

    /// Returns the underlying source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Returns the underlying source mutably.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Drains the window ending at `now`.
    ///
    /// A clock that stepped backwards yields an empty window at the
    /// previous end rather than one that overlaps it.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Result<WindowStats, SourceError> {
        let window = PollWindow {
            start: self.last_end,
            end: now.max(self.last_end),
        };
        self.last_end = window.end;

        self.state = PollState::Draining(window);
        let result = self.drain(window);
        self.state = PollState::Idle;
        result
    }

    fn drain(&mut self, window: PollWindow) -> Result<WindowStats, SourceError> {
        let mut stats = WindowStats::new(window);
        if window.start == window.end {
            return Ok(stats);
        }

        self.source.seek(window.start)?;

        while let Some(entry) = self.source.next_entry()? {
            if entry.timestamp > window.end {
                break;
            }
            if !window.contains(entry.timestamp) || !self.from_unit(&entry) {
                stats.skipped += 1;
                continue;
            }

            stats.entries += 1;

            match self.matcher.classify(&entry.message) {
                Ok(MatchResult::NoMatch) => {}
                Ok(result) => {
                    self.store.record_line();
                    self.store.apply(&result);
                    stats.matched += 1;
                }
                Err(e) => {
                    self.store.record_line();
                    tracing::debug!(error = %e, timestamp = %entry.timestamp, "Dropping line");
                    self.store.record_field_error();
                    stats.field_errors += 1;
                }
            }
        }

        Ok(stats)
    }

    fn from_unit(&self, entry: &LogEntry) -> bool {
        match (&self.unit, &entry.unit) {
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => true,
        }
    }

    /// Polls every interval until a message arrives on `shutdown` or its
    /// sender is dropped.
    ///
    /// Returns the first source error; in-flight window state is discarded.
    pub fn run(&mut self, shutdown: &Receiver<()>) -> Result<(), SourceError> {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            unit = self.unit.as_deref().unwrap_or("*"),
            "Poll loop started"
        );

        loop {
            match shutdown.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    tracing::info!("Poll loop stopping");
                    return Ok(());
                }
            }

            let stats = self.poll(Utc::now())?;
            tracing::debug!(
                start = %stats.window.start,
                end = %stats.window.end,
                entries = stats.entries,
                matched = stats.matched,
                field_errors = stats.field_errors,
                "Window drained"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use chrono::TimeZone;
    use std::sync::mpsc;

    const STATUS: &str =
        "  m  12:00:01|ethminer  Speed  123.45 Mh/s    0 61.2  1 62.0  [solo] Time: 01:02:03";
    const SOLUTION: &str = "  ℹ  12:00:02|CUDA0     Solution found; Submitting solution to pool ...";
    const SHARE: &str = "  ℹ  12:00:03|stratum    B-) Submitted and accepted.";
    const JOB: &str = "  ℹ  12:00:04|stratum   Received new job 0xabc123";

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn make_loop(entries: Vec<LogEntry>) -> (PollLoop<MemorySource>, Arc<MetricStore>) {
        let store = Arc::new(MetricStore::new().unwrap());
        let poll = PollLoop::new(MemorySource::from_entries(entries), Arc::clone(&store), at(0));
        (poll, store)
    }

    #[test]
    fn test_single_window_applies_all_updates() {
        let (mut poll, store) = make_loop(vec![
            LogEntry::new(at(1), STATUS),
            LogEntry::new(at(2), SOLUTION),
            LogEntry::new(at(3), SHARE),
            LogEntry::new(at(4), JOB),
            LogEntry::new(at(4), "  ℹ  12:00:04|stratum   Connected"),
        ]);

        let stats = poll.poll(at(5)).unwrap();
        assert_eq!(stats.entries, 5);
        assert_eq!(stats.matched, 4);
        assert_eq!(stats.field_errors, 0);

        assert_eq!(store.total_hashrate(), 123.45);
        assert_eq!(store.device_hashrate("1"), Some(62.0));
        assert_eq!(store.solutions(), 1);
        assert_eq!(store.shares(), 1);
        assert_eq!(store.jobs(), 1);
        assert_eq!(poll.state(), PollState::Idle);
    }

    #[test]
    fn test_windows_are_contiguous() {
        let (mut poll, _store) = make_loop(Vec::new());
        let windows: Vec<PollWindow> = [1, 2, 5, 9]
            .into_iter()
            .map(|s| poll.poll(at(s)).unwrap().window)
            .collect();

        assert_eq!(windows[0].start, at(0));
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(poll.last_end(), at(9));
    }

    #[test]
    fn test_each_entry_counted_once() {
        let entries: Vec<LogEntry> = (1..=10).map(|s| LogEntry::new(at(s), JOB)).collect();
        let (mut poll, store) = make_loop(entries);

        let mut seen = 0;
        for end in [3, 3, 7, 10, 12] {
            seen += poll.poll(at(end)).unwrap().entries;
        }

        assert_eq!(seen, 10);
        assert_eq!(store.jobs(), 10);
    }

    #[test]
    fn test_entry_at_window_start_is_excluded() {
        let (mut poll, store) = make_loop(vec![LogEntry::new(at(0), SHARE)]);

        let stats = poll.poll(at(5)).unwrap();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.skipped, 1);
        assert_eq!(store.shares(), 0);
    }

    #[test]
    fn test_entry_at_window_end_is_included_once() {
        let (mut poll, store) = make_loop(vec![
            LogEntry::new(at(5), SHARE),
            LogEntry::new(at(6), SHARE),
        ]);

        assert_eq!(poll.poll(at(5)).unwrap().entries, 1);
        assert_eq!(store.shares(), 1);

        // Re-presented at the start of the next window: skipped, not re-counted.
        let stats = poll.poll(at(6)).unwrap();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(store.shares(), 2);
    }

    #[test]
    fn test_entries_after_window_wait_for_next() {
        let (mut poll, store) = make_loop(vec![
            LogEntry::new(at(1), JOB),
            LogEntry::new(at(8), JOB),
        ]);

        assert_eq!(poll.poll(at(4)).unwrap().entries, 1);
        assert_eq!(store.jobs(), 1);
        assert_eq!(poll.poll(at(8)).unwrap().entries, 1);
        assert_eq!(store.jobs(), 2);
    }

    #[test]
    fn test_other_units_ignored() {
        let (poll, store) = make_loop(vec![
            LogEntry::new(at(1), JOB).with_unit("eth-miner.service"),
            LogEntry::new(at(2), JOB).with_unit("sshd.service"),
            LogEntry::new(at(3), JOB),
        ]);
        let mut poll = poll.with_unit("eth-miner.service");

        let stats = poll.poll(at(5)).unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(store.jobs(), 2);
    }

    #[test]
    fn test_oversized_uptime_does_not_stop_window() {
        let (mut poll, store) = make_loop(vec![
            LogEntry::new(
                at(1),
                "  m  12:00:01|ethminer  Speed  50.5 Mh/s    0 50.5  [solo] Time: 99999999999999999:00",
            ),
            LogEntry::new(at(2), JOB),
        ]);

        let stats = poll.poll(at(5)).unwrap();
        assert_eq!(stats.matched, 2);
        assert_eq!(store.total_hashrate(), 50.5);
        assert_eq!(store.uptime().as_deref(), Some("99999999999999999:00"));
        assert_eq!(store.jobs(), 1);
        assert!(store.encode().unwrap().contains("ethminer_uptime_seconds 0"));
    }

    #[test]
    fn test_unmatched_lines_leave_store_unchanged() {
        let (mut poll, store) = make_loop(vec![
            LogEntry::new(at(1), "Started Ethereum miner."),
            LogEntry::new(at(2), "  ℹ  12:00:05|stratum   Connected to eu1.ethermine.org:4444"),
        ]);
        let before = store.snapshot();

        let stats = poll.poll(at(5)).unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.matched, 0);
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_field_error_drops_only_that_line() {
        let (mut poll, store) = make_loop(vec![
            LogEntry::new(at(1), STATUS),
            LogEntry::new(
                at(2),
                "  m  12:00:02|ethminer  Speed  9x9 Mh/s    0 1.0  [solo] Time: 01:02:04",
            ),
            LogEntry::new(at(3), JOB),
        ]);

        let stats = poll.poll(at(5)).unwrap();
        assert_eq!(stats.field_errors, 1);
        assert_eq!(stats.matched, 2);
        assert_eq!(store.total_hashrate(), 123.45);
        assert_eq!(store.uptime().as_deref(), Some("01:02:03"));
        assert_eq!(store.jobs(), 1);
        assert_eq!(store.snapshot().field_errors, 1);
    }

    #[test]
    fn test_counters_never_decrease() {
        let entries: Vec<LogEntry> = (1..=20)
            .map(|s| LogEntry::new(at(s), if s % 2 == 0 { SHARE } else { "noise" }))
            .collect();
        let (mut poll, store) = make_loop(entries);

        let mut last = 0;
        for end in (2..=22).step_by(2) {
            poll.poll(at(end)).unwrap();
            assert!(store.shares() >= last);
            last = store.shares();
        }
        assert_eq!(last, 10);
    }

    #[test]
    fn test_clock_step_back_yields_empty_window() {
        let (mut poll, _store) = make_loop(vec![LogEntry::new(at(3), JOB)]);
        poll.poll(at(10)).unwrap();

        let stats = poll.poll(at(4)).unwrap();
        assert_eq!(stats.window.start, at(10));
        assert_eq!(stats.window.end, at(10));
        assert_eq!(stats.entries, 0);
    }

    #[test]
    fn test_source_failure_is_returned() {
        let (mut poll, store) = make_loop(vec![LogEntry::new(at(1), JOB)]);
        poll.source_mut().fail_with("journal gone");

        assert!(matches!(
            poll.poll(at(5)),
            Err(SourceError::Unavailable(_))
        ));
        assert_eq!(store.jobs(), 0);
        assert_eq!(poll.state(), PollState::Idle);
    }

    #[test]
    fn test_run_stops_on_shutdown() {
        let (poll, _store) = make_loop(Vec::new());
        let mut poll = poll.with_interval(Duration::from_millis(5));
        let (tx, rx) = mpsc::channel();

        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(60));
            tx.send(()).unwrap();
        });

        poll.run(&rx).unwrap();
        stopper.join().unwrap();
        assert!(poll.source().seek_count() > 0);
    }

    #[test]
    fn test_run_propagates_source_failure() {
        let (poll, _store) = make_loop(Vec::new());
        let mut poll = poll.with_interval(Duration::from_millis(1));
        poll.source_mut().fail_with("permission denied");
        let (_tx, rx) = mpsc::channel::<()>();

        assert!(matches!(poll.run(&rx), Err(SourceError::Unavailable(_))));
    }
}
