//! Mining Metrics Exporter Library
//!
//! Tails the systemd journal of an `ethminer` service, extracts hashrate,
//! job, solution and share figures from its log lines, and exposes them
//! as Prometheus metrics.
//!
//! # Architecture
//!
//! The system follows an explicit data flow:
//!
//! ```text
//! source → poll (windowing) → parsing (templates → fields) → metrics
//!                                                               ↑
//!                                                    scrape endpoint
//! ```
//!
//! # Design Principles
//!
//! - **Fixed templates**: Lines are matched against a fixed, ordered set
//!   of patterns; anything else is ignored
//! - **Fail-soft per line**: A malformed field drops that line only
//! - **Exactly-once windows**: Each poll covers `(previous end, now]`
//! - **Fail-fast on the source**: A journal that cannot be read ends the process
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use chrono::Utc;
//! use mining_exporter::{
//!     metrics::MetricStore,
//!     poll::PollLoop,
//!     source::{LogEntry, MemorySource},
//! };
//!
//! let start = Utc::now();
//! let mut source = MemorySource::new();
//! source.push(LogEntry::new(
//!     start + chrono::Duration::milliseconds(10),
//!     "  ℹ  12:00:04|stratum   Received new job 0xabc123",
//! ));
//!
//! let store = Arc::new(MetricStore::new().unwrap());
//! let mut poll = PollLoop::new(source, Arc::clone(&store), start);
//!
//! poll.poll(start + chrono::Duration::seconds(1)).unwrap();
//! assert_eq!(store.jobs(), 1);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod parsing;
pub mod poll;
pub mod source;

// Re-export commonly used types at crate root
pub use config::{Cli, ExporterConfig};
pub use error::ExporterError;
pub use metrics::MetricStore;
pub use parsing::{classify, MatchResult, PatternMatcher};
pub use poll::{PollLoop, PollWindow};
pub use source::{JournalSource, LogEntry, LogSource, MemorySource};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
