//! Mining Metrics Exporter CLI
//!
//! Reads the ethminer service journal on a fixed interval and serves the
//! extracted figures on a Prometheus scrape endpoint.

use chrono::Utc;
use clap::Parser;
use mining_exporter::{
    config::{Cli, ExporterConfig},
    metrics::{MetricStore, MetricsServer, MetricsServerConfig},
    poll::PollLoop,
    source::JournalSource,
    ExporterError,
};
use std::process::ExitCode;
use std::sync::{mpsc, Arc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref()))
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), ExporterError> {
    let config = ExporterConfig::from_cli(cli)?;
    info!("Mining exporter v{}", mining_exporter::VERSION);

    let store = Arc::new(MetricStore::new()?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .map_err(ExporterError::Runtime)?;

    // Bind before polling so a busy port is fatal at startup.
    let server_config = MetricsServerConfig::with_addr(config.server.bind, config.server.port);
    let server = runtime.block_on(MetricsServer::bind(&server_config, Arc::clone(&store)))?;
    runtime.spawn(async move {
        if let Err(e) = server.run().await {
            error!(error = %e, "Metrics server stopped");
        }
    });

    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    })?;

    let source = JournalSource::with_program(
        config.source.unit.clone(),
        config.source.journalctl.clone(),
    );
    let mut poll = PollLoop::new(source, store, Utc::now())
        .with_unit(config.source.unit.clone())
        .with_interval(config.interval());

    let result = poll.run(&shutdown_rx);
    runtime.shutdown_background();
    result?;

    info!("Shutdown complete");
    Ok(())
}

/// `RUST_LOG` when set and valid, `info` otherwise.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}
