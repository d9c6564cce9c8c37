//! Configuration management for HostWatch
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to layer defaults, a configuration file (TOML, YAML or JSON),
//! `HOSTWATCH_` environment variables and command-line overrides.
//!
//! The configuration is built once at startup and handed to each component
//! that needs it.

use crate::cli::Cli;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Json, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Forces debug logging regardless of `log_level`.
    pub debug_mode: bool,
    /// Seconds between two collector ticks.
    pub interval_seconds: u64,
    /// Applications whose liveness is checked on every tick, keyed by name.
    pub applications: BTreeMap<String, ApplicationSpec>,
    /// Limits used by the collector when logging threshold alerts.
    pub thresholds: ThresholdConfig,
    /// Settings for public address lookup and port probing.
    pub network: NetworkConfig,
    /// Settings for the active speed test.
    pub speed_test: SpeedTestConfig,
    /// Where samples are persisted.
    pub sink: SinkConfig,
    /// Settings for the web dashboard.
    pub dashboard: DashboardConfig,
    /// Settings for the Prometheus exporter.
    pub metrics: MetricsConfig,
    /// Settings for log output.
    pub logging: LoggingConfig,
}

/// A monitored application: the process to look for and the port it serves.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ApplicationSpec {
    /// Process name pattern, matched case-insensitively.
    pub process_name: String,
    /// TCP port probed on the local host.
    pub port: u16,
}

/// Percentage limits for the utilization gauges.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ThresholdConfig {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            cpu_percent: 80.0,
            memory_percent: 90.0,
            disk_percent: 85.0,
        }
    }
}

/// Configuration for network identity lookups.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// A URL returning the caller's public IP as plain text.
    pub public_ip_url: String,
    /// Timeout for outbound HTTP requests in milliseconds.
    pub request_timeout_ms: u64,
    /// Timeout for each TCP connect attempt in milliseconds.
    pub port_probe_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            public_ip_url: "https://api.ipify.org".to_string(),
            request_timeout_ms: 5000,
            port_probe_timeout_ms: 500,
        }
    }
}

/// Configuration for the active speed test.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SpeedTestConfig {
    pub enabled: bool,
    /// Seconds between two benchmarks, independent of the sampling interval.
    pub interval_seconds: u64,
    /// JSON endpoint listing candidate servers.
    pub servers_url: String,
    /// How many candidates are pinged when picking the best server.
    pub max_servers: usize,
    /// Latency requests per candidate.
    pub latency_samples: usize,
    /// Square image sizes fetched during the download phase.
    pub download_sizes: Vec<u32>,
    /// Size of the payload posted during the upload phase.
    pub upload_bytes: usize,
    /// Timeout for each benchmark request in milliseconds.
    pub request_timeout_ms: u64,
    /// Upper bound for one whole benchmark run.
    pub max_duration_seconds: u64,
}

impl Default for SpeedTestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 600,
            servers_url: "https://www.speedtest.net/api/js/servers?engine=js&limit=10".to_string(),
            max_servers: 5,
            latency_samples: 3,
            download_sizes: vec![350, 750],
            upload_bytes: 1_000_000,
            request_timeout_ms: 30_000,
            max_duration_seconds: 120,
        }
    }
}

/// Configuration for the CSV sink.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SinkConfig {
    /// Path of the append-only CSV table.
    pub path: PathBuf,
    /// Mount point whose usage is reported as `disk_percent`.
    pub disk_path: PathBuf,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("server_data.csv"),
            disk_path: PathBuf::from(if cfg!(windows) { "C:\\" } else { "/" }),
        }
    }
}

/// Configuration for the web dashboard.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    pub listen_address: SocketAddr,
    /// How long a parsed copy of the CSV table is reused.
    pub cache_seconds: u64,
    /// Poll interval of the browser page.
    pub refresh_seconds: u64,
    /// Default window for history charts.
    pub history_window_seconds: u64,
    /// Limits used when rendering alerts.
    pub thresholds: ThresholdConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::from(([0, 0, 0, 0], 8050)),
            cache_seconds: 5,
            refresh_seconds: 5,
            history_window_seconds: 3600,
            thresholds: ThresholdConfig::default(),
        }
    }
}

/// Configuration for the Prometheus exporter.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_address: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_address: SocketAddr::from(([127, 0, 0, 1], 9090)),
        }
    }
}

/// Configuration for log output.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for a daily rolling log file. Console only when unset.
    pub file: Option<PathBuf>,
}

impl Config {
    /// Loads the application configuration.
    ///
    /// Sources are layered in order: built-in defaults, the file named by
    /// `--config` (format picked from its extension), `HOSTWATCH_*`
    /// environment variables, then command-line flags.
    pub fn load(cli: &Cli) -> Result<Self> {
        // Defaults come from `#[serde(default)]`: a configured application
        // registry must replace the built-in one, not merge into it.
        let mut figment = Figment::new();

        if let Some(path) = &cli.config {
            figment = merge_file(figment, path);
        }

        let config: Config = figment
            // e.g. HOSTWATCH_SPEED_TEST__ENABLED=false
            .merge(Env::prefixed("HOSTWATCH_").split("__"))
            .merge(cli)
            .extract()?;
        Ok(config)
    }

    /// Loads the configuration, falling back to the defaults when any source
    /// is malformed. Command-line flags still apply on top of the defaults.
    ///
    /// The load error is returned alongside so the caller can report it once
    /// logging is up.
    pub fn load_or_default(cli: &Cli) -> (Self, Option<anyhow::Error>) {
        match Self::load(cli) {
            Ok(config) => (config, None),
            Err(e) => {
                let fallback = Figment::new()
                    .merge(cli)
                    .extract()
                    .unwrap_or_else(|_| Self::default());
                (fallback, Some(e))
            }
        }
    }

    /// The effective log filter directive.
    pub fn effective_log_level(&self) -> &str {
        if self.debug_mode {
            "debug"
        } else {
            &self.log_level
        }
    }
}

fn merge_file(figment: Figment, path: &Path) -> Figment {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => figment.merge(Yaml::file(path)),
        Some("json") => figment.merge(Json::file(path)),
        _ => figment.merge(Toml::file(path)),
    }
}

fn default_applications() -> BTreeMap<String, ApplicationSpec> {
    [
        ("smartcare", "SmartCareProcessName", 8080),
        ("sql_server", "sqlservr", 1433),
        ("smartlink", "SmartLinkProcessName", 3307),
        ("etims", "ETIMSProcessName", 8000),
        ("tims", "TIMSProcessName", 8089),
    ]
    .into_iter()
    .map(|(name, process_name, port)| {
        (
            name.to_string(),
            ApplicationSpec {
                process_name: process_name.to_string(),
                port,
            },
        )
    })
    .collect()
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            debug_mode: false,
            interval_seconds: 10,
            applications: default_applications(),
            thresholds: ThresholdConfig::default(),
            network: NetworkConfig::default(),
            speed_test: SpeedTestConfig::default(),
            sink: SinkConfig::default(),
            dashboard: DashboardConfig::default(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
