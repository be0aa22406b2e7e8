//! Top-level error type for the exporter binary.

use crate::config::ConfigError;
use crate::metrics::MetricsError;
use crate::source::SourceError;
use thiserror::Error;

/// Fatal conditions. Each one ends the process with a non-zero exit code.
#[derive(Debug, Error)]
pub enum ExporterError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[cfg(feature = "metrics")]
    #[error(transparent)]
    Server(#[from] crate::metrics::ServerError),

    #[error("failed to start runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}
