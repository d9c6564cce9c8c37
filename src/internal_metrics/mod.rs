//! # Internal Metrics Module
//!
//! Prometheus instrumentation of the collector itself.
//!
//! - **`MetricsBuilder`** installs the Prometheus recorder and binds the
//!   scrape listener.
//! - **`Metrics`** is the cloneable handle the collector updates every tick.
//! - **`MetricsServer`** (in `server.rs`) serves `/metrics`.
//!
//! Without an installed recorder every handle is a no-op, which is what tests
//! and the disabled configuration rely on.

use crate::alerts::AlertLevel;
use crate::config::MetricsConfig;
use crate::core::Sample;
use crate::internal_metrics::server::MetricsServer;
use crate::task_manager::TaskManager;
use metrics::{Counter, Histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::error;

pub mod server;

/// Handles to the collector's metrics.
#[derive(Clone)]
pub struct Metrics {
    pub ticks_total: Counter,
    pub tick_failures_total: Counter,
    pub sink_write_failures_total: Counter,
    pub ip_changes_total: Counter,
    pub tick_duration_seconds: Histogram,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Registers descriptions with the global recorder and returns handles.
    pub fn new() -> Self {
        metrics::describe_counter!("collector_ticks_total", Unit::Count, "Total number of sampling ticks started.");
        metrics::describe_counter!("collector_tick_failures_total", Unit::Count, "Ticks that failed before a sample could be assembled.");
        metrics::describe_counter!("sink_write_failures_total", Unit::Count, "Samples dropped because the sink could not be written.");
        metrics::describe_counter!("public_ip_changes_total", Unit::Count, "Number of public IP changes observed by the collector.");
        metrics::describe_counter!("threshold_alerts_total", Unit::Count, "Utilization threshold alerts raised, labeled by level.");
        metrics::describe_counter!("speed_tests_total", Unit::Count, "Speed test runs, labeled by outcome.");
        metrics::describe_histogram!("collector_tick_duration_seconds", Unit::Seconds, "Wall time of a full sampling tick.");
        metrics::describe_histogram!("speed_test_duration_seconds", Unit::Seconds, "Wall time of an active speed test.");
        metrics::describe_gauge!("host_cpu_usage_percent", Unit::Percent, "Last sampled CPU utilization of the host.");
        metrics::describe_gauge!("host_memory_usage_percent", Unit::Percent, "Last sampled memory utilization of the host.");
        metrics::describe_gauge!("host_disk_usage_percent", Unit::Percent, "Last sampled disk utilization of the monitored mount.");
        metrics::describe_gauge!("host_network_rate_mbps", "Last counter-derived throughput in Mbps, labeled by direction.");
        metrics::describe_gauge!("application_running", Unit::Count, "1 when a monitored application is fully running, labeled by application.");

        Self {
            ticks_total: metrics::counter!("collector_ticks_total"),
            tick_failures_total: metrics::counter!("collector_tick_failures_total"),
            sink_write_failures_total: metrics::counter!("sink_write_failures_total"),
            ip_changes_total: metrics::counter!("public_ip_changes_total"),
            tick_duration_seconds: metrics::histogram!("collector_tick_duration_seconds"),
        }
    }

    pub fn new_for_test() -> Self {
        Self::new()
    }

    pub fn increment_threshold_alert(&self, level: AlertLevel) {
        metrics::counter!("threshold_alerts_total", "level" => level.to_string()).increment(1);
    }

    /// Publishes the gauges of a freshly assembled sample.
    pub fn record_sample(&self, sample: &Sample) {
        metrics::gauge!("host_cpu_usage_percent").set(sample.cpu_percent);
        metrics::gauge!("host_memory_usage_percent").set(sample.memory_percent);
        metrics::gauge!("host_disk_usage_percent").set(sample.disk_percent);
        metrics::gauge!("host_network_rate_mbps", "direction" => "upload").set(sample.upload_rate);
        metrics::gauge!("host_network_rate_mbps", "direction" => "download").set(sample.download_rate);
        for (name, status) in &sample.application_status {
            let running = if status.is_running() { 1.0 } else { 0.0 };
            metrics::gauge!("application_running", "application" => name.clone()).set(running);
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for the metrics system.
pub struct MetricsBuilder {
    config: MetricsConfig,
}

impl MetricsBuilder {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Installs the Prometheus recorder and prepares the scrape server.
    ///
    /// Returns plain handles and no server when metrics are disabled or the
    /// recorder cannot be set up; the collector runs either way.
    pub fn build(self, task_manager: &TaskManager) -> (Metrics, Option<(MetricsServer, SocketAddr)>) {
        if !self.config.enabled {
            return (Metrics::new(), None);
        }

        let builder = match PrometheusBuilder::new().set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0],
        ) {
            Ok(builder) => builder,
            Err(e) => {
                error!(error = %e, "Invalid histogram buckets for metrics");
                return (Metrics::new(), None);
            }
        };
        let recorder = builder.build_recorder();
        let handle = recorder.handle();

        let listener = match std::net::TcpListener::bind(self.config.listen_address) {
            Ok(listener) => listener,
            Err(e) => {
                error!(address = %self.config.listen_address, error = %e, "Failed to bind metrics server");
                return (Metrics::new(), None);
            }
        };
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                error!(error = %e, "Failed to get local address for metrics server");
                return (Metrics::new(), None);
            }
        };
        let listener = match listener
            .set_nonblocking(true)
            .and_then(|_| TcpListener::from_std(listener))
        {
            Ok(listener) => listener,
            Err(e) => {
                error!(error = %e, "Failed to hand metrics listener to the runtime");
                return (Metrics::new(), None);
            }
        };

        if let Err(e) = metrics::set_global_recorder(recorder) {
            error!(error = %e, "Failed to install Prometheus recorder");
            return (Metrics::new(), None);
        }

        let server = MetricsServer::new(listener, handle, task_manager.get_shutdown_rx());
        (Metrics::new(), Some((server, addr)))
    }
}
