//! Metric store backed by a Prometheus registry.

use crate::parsing::{HashrateReport, MatchResult};
use prometheus::{Encoder, Gauge, GaugeVec, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

/// Label carried by per-device hashrate series.
pub const DEVICE_LABEL: &str = "gpu";

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Point-in-time copy of the store contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    /// Total hashrate in Mh/s from the latest report.
    pub total_hashrate: f64,
    /// Last known hashrate per device label, sorted by label.
    pub devices: Vec<(String, f64)>,
    /// Uptime text from the latest report.
    pub uptime: Option<String>,
    /// Jobs received.
    pub jobs: u64,
    /// Solutions found.
    pub solutions: u64,
    /// Shares accepted.
    pub shares: u64,
    /// Entries that matched a template.
    pub lines: u64,
    /// Lines dropped because a field failed to parse.
    pub field_errors: u64,
}

/// Current miner gauges and event counters.
///
/// Written by the poll loop and read by the scrape handler at the same
/// time. Numeric values live in Prometheus atomics; the uptime text and
/// the set of known device labels sit behind `RwLock`s.
pub struct MetricStore {
    registry: Registry,

    // Gauges
    total_hashrate: Gauge,
    device_hashrate: GaugeVec,
    uptime_seconds: IntGauge,

    // Counters
    jobs: IntCounter,
    solutions: IntCounter,
    shares: IntCounter,

    // Exporter self-monitoring
    lines: IntCounter,
    field_errors: IntCounter,

    uptime: RwLock<Option<String>>,
    devices: RwLock<BTreeSet<String>>,
}

impl MetricStore {
    /// Creates a store with all miner metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let total_hashrate = Gauge::new("ethminer_total_hashrate", "Total hashrate in Mh/s")?;
        let device_hashrate = GaugeVec::new(
            Opts::new("ethminer_gpus_hashrate", "Per-GPU hashrate in Mh/s"),
            &[DEVICE_LABEL],
        )?;
        let uptime_seconds = IntGauge::new(
            "ethminer_uptime_seconds",
            "Miner uptime from the latest status line",
        )?;

        let jobs = IntCounter::new("ethminer_jobs_total", "Jobs received from the stratum pool")?;
        let solutions = IntCounter::new("ethminer_solutions_total", "Solutions found")?;
        let shares = IntCounter::new("ethminer_shares_total", "Solutions accepted by the pool")?;

        let lines = IntCounter::new(
            "ethminer_exporter_lines_total",
            "Journal entries that matched a template",
        )?;
        let field_errors = IntCounter::new(
            "ethminer_exporter_field_errors_total",
            "Matched lines dropped because a field failed to parse",
        )?;

        registry.register(Box::new(total_hashrate.clone()))?;
        registry.register(Box::new(device_hashrate.clone()))?;
        registry.register(Box::new(uptime_seconds.clone()))?;
        registry.register(Box::new(jobs.clone()))?;
        registry.register(Box::new(solutions.clone()))?;
        registry.register(Box::new(shares.clone()))?;
        registry.register(Box::new(lines.clone()))?;
        registry.register(Box::new(field_errors.clone()))?;

        Ok(Self {
            registry,
            total_hashrate,
            device_hashrate,
            uptime_seconds,
            jobs,
            solutions,
            shares,
            lines,
            field_errors,
            uptime: RwLock::new(None),
            devices: RwLock::new(BTreeSet::new()),
        })
    }

    /// Applies the update for a classified line.
    ///
    /// Returns `false` for [`MatchResult::NoMatch`], which changes nothing.
    pub fn apply(&self, result: &MatchResult) -> bool {
        match result {
            MatchResult::HashrateReport(report) => self.record_report(report),
            MatchResult::SolutionFound { .. } => self.solutions.inc(),
            MatchResult::ShareAccepted => self.shares.inc(),
            MatchResult::JobReceived { .. } => self.jobs.inc(),
            MatchResult::NoMatch => return false,
        }
        true
    }

    /// Replaces the gauges with the values of `report`.
    ///
    /// Devices missing from the report keep their previous value.
    pub fn record_report(&self, report: &HashrateReport) {
        self.total_hashrate.set(report.total_hashrate);

        {
            let mut known = self.devices.write().unwrap_or_else(PoisonError::into_inner);
            for device in &report.devices {
                self.device_hashrate
                    .with_label_values(&[device.label.as_str()])
                    .set(device.hashrate);
                if !known.contains(&device.label) {
                    tracing::info!(device = %device.label, "New device reporting hashrate");
                    known.insert(device.label.clone());
                }
            }
        }

        if let Some(seconds) = report.uptime_seconds() {
            self.uptime_seconds.set(i64::try_from(seconds).unwrap_or(i64::MAX));
        }
        *self.uptime.write().unwrap_or_else(PoisonError::into_inner) = Some(report.uptime.clone());
    }

    /// Counts one journal entry that matched a template.
    pub fn record_line(&self) {
        self.lines.inc();
    }

    /// Counts one line dropped because of a field parse error.
    pub fn record_field_error(&self) {
        self.field_errors.inc();
    }

    /// Total hashrate from the latest report.
    pub fn total_hashrate(&self) -> f64 {
        self.total_hashrate.get()
    }

    /// Last known hashrate for `label`, if that device ever reported.
    pub fn device_hashrate(&self, label: &str) -> Option<f64> {
        let known = self.devices.read().unwrap_or_else(PoisonError::into_inner);
        known
            .contains(label)
            .then(|| self.device_hashrate.with_label_values(&[label]).get())
    }

    /// Device labels seen so far, sorted.
    pub fn devices(&self) -> Vec<String> {
        let known = self.devices.read().unwrap_or_else(PoisonError::into_inner);
        known.iter().cloned().collect()
    }

    /// Uptime text from the latest report.
    pub fn uptime(&self) -> Option<String> {
        self.uptime
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn jobs(&self) -> u64 {
        self.jobs.get()
    }

    pub fn solutions(&self) -> u64 {
        self.solutions.get()
    }

    pub fn shares(&self) -> u64 {
        self.shares.get()
    }

    /// Copies the current values.
    pub fn snapshot(&self) -> StoreSnapshot {
        let devices = self
            .devices()
            .into_iter()
            .map(|label| {
                let value = self.device_hashrate.with_label_values(&[label.as_str()]).get();
                (label, value)
            })
            .collect();

        StoreSnapshot {
            total_hashrate: self.total_hashrate(),
            devices,
            uptime: self.uptime(),
            jobs: self.jobs(),
            solutions: self.solutions(),
            shares: self.shares(),
            lines: self.lines.get(),
            field_errors: self.field_errors.get(),
        }
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl std::fmt::Debug for MetricStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricStore")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}
