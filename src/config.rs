//! Exporter configuration.
//!
//! Values come from three layers, highest priority first: command-line
//! flags, an optional TOML file, and built-in defaults.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Port the scrape endpoint listens on by default.
pub const DEFAULT_PORT: u16 = 8601;

/// Poll interval in seconds when none is configured.
pub const DEFAULT_INTERVAL_SECS: u64 = 1;

/// systemd unit the miner runs as by default.
pub const DEFAULT_UNIT: &str = "eth-miner.service";

/// Command-line flags.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "mining-exporter",
    version,
    about = "Prometheus mining metrics exporter"
)]
pub struct Cli {
    /// Interval in seconds between checking measures [default: 1]
    #[arg(short = 'f', long = "frequency", value_name = "SECONDS")]
    pub frequency: Option<u64>,

    /// Port for listening [default: 8601]
    #[arg(short = 'p', long = "port", value_name = "PORT")]
    pub port: Option<u16>,

    /// Address to bind the metrics endpoint to [default: 0.0.0.0]
    #[arg(long = "bind", value_name = "IP")]
    pub bind: Option<IpAddr>,

    /// systemd unit to read [default: eth-miner.service]
    #[arg(short = 'u', long = "unit", value_name = "UNIT")]
    pub unit: Option<String>,

    /// TOML configuration file
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid poll interval (must be at least 1 second)")]
    InvalidInterval,
    #[error("invalid unit name {0:?}")]
    InvalidUnit(String),
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Poll loop section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Seconds between polls.
    pub interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
        }
    }
}

/// Scrape endpoint section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub bind: IpAddr,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
        }
    }
}

/// Log source section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// systemd unit whose records are consumed.
    pub unit: String,
    /// `journalctl` binary to run.
    pub journalctl: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            unit: DEFAULT_UNIT.to_string(),
            journalctl: PathBuf::from(crate::source::DEFAULT_JOURNALCTL),
        }
    }
}

/// Full configuration, as read from file and overridden by flags.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExporterConfig {
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub source: SourceConfig,
}

impl ExporterConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Builds the effective configuration for a command line.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let base = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = base.with_overrides(cli);
        config.validate()?;
        Ok(config)
    }

    /// Applies the flags that were given on the command line.
    pub fn with_overrides(mut self, cli: &Cli) -> Self {
        if let Some(frequency) = cli.frequency {
            self.poll.interval_secs = frequency;
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(bind) = cli.bind {
            self.server.bind = bind;
        }
        if let Some(unit) = &cli.unit {
            self.source.unit = unit.clone();
        }
        self
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll.interval_secs == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        let unit = self.source.unit.trim();
        if unit.is_empty() || unit.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidUnit(self.source.unit.clone()));
        }
        Ok(())
    }

    /// Poll interval as a duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.poll.interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = ExporterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.interval(), Duration::from_secs(1));
        assert_eq!(config.server.port, 8601);
        assert_eq!(config.source.unit, "eth-miner.service");
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from(["mining-exporter", "-f", "5", "--port", "9100"]).unwrap();
        let config = ExporterConfig::from_cli(&cli).unwrap();

        assert_eq!(config.poll.interval_secs, 5);
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.source.unit, DEFAULT_UNIT);
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = ExporterConfig::from_toml(
            r#"
            [poll]
            interval_secs = 10

            [server]
            port = 9000

            [source]
            unit = "miner.service"
            "#,
        )
        .unwrap();
        assert_eq!(file.server.bind, IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        let cli = Cli::try_parse_from(["mining-exporter", "-p", "9200"]).unwrap();
        let config = file.with_overrides(&cli);

        assert_eq!(config.poll.interval_secs, 10);
        assert_eq!(config.server.port, 9200);
        assert_eq!(config.source.unit, "miner.service");
    }

    #[test]
    fn test_zero_interval_invalid() {
        let cli = Cli::try_parse_from(["mining-exporter", "-f", "0"]).unwrap();
        assert!(matches!(
            ExporterConfig::from_cli(&cli),
            Err(ConfigError::InvalidInterval)
        ));
    }

    #[test]
    fn test_non_numeric_port_rejected() {
        assert!(Cli::try_parse_from(["mining-exporter", "-p", "http"]).is_err());
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            ExporterConfig::from_toml("[poll]\ninterval_secs = \"fast\""),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ExporterConfig::from_file("/nonexistent/mining-exporter.toml"),
            Err(ConfigError::FileReadError(_))
        ));
    }
}
