//! Prometheus metrics for the mining daemon.
//!
//! The [`MetricStore`] holds the values extracted from the journal and is
//! shared between the poll loop (sole writer) and the scrape endpoint.
//!
//! # Metrics Exposed
//!
//! ## Miner Gauges
//! - `ethminer_total_hashrate` - Total hashrate in Mh/s
//! - `ethminer_gpus_hashrate{gpu}` - Per-device hashrate in Mh/s
//! - `ethminer_uptime_seconds` - Miner uptime from the latest status line
//!
//! ## Miner Counters
//! - `ethminer_jobs_total` - Jobs received from the pool
//! - `ethminer_solutions_total` - Solutions found
//! - `ethminer_shares_total` - Solutions accepted by the pool
//!
//! ## Exporter Counters
//! - `ethminer_exporter_lines_total` - Journal entries that matched a template
//! - `ethminer_exporter_field_errors_total` - Lines dropped on field parse errors
//!
//! # Example
//!
//! ```no_run
//! use mining_exporter::metrics::MetricStore;
//! use mining_exporter::parsing::classify;
//!
//! let store = MetricStore::new().expect("Failed to create store");
//!
//! let line = "  ℹ  12:00:03|stratum    B-) Submitted and accepted.";
//! if let Ok(result) = classify(line) {
//!     store.apply(&result);
//! }
//!
//! assert_eq!(store.shares(), 1);
//! ```

#[cfg(feature = "metrics")]
mod server;
mod store;

#[cfg(feature = "metrics")]
pub use server::{router, MetricsServer, MetricsServerConfig, ServerError};
pub use store::{MetricStore, MetricsError, StoreSnapshot, DEVICE_LABEL};
