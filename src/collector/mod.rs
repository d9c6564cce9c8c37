//! # Collector
//!
//! The sampling loop. Every tick reads the host gauges, derives throughput
//! from the interface counters, classifies each configured application,
//! resolves the network identity, consults the speed test cadence and appends
//! the assembled [`Sample`] to the sink.
//!
//! Ticks run strictly one after another on a single task. A tick that fails
//! is logged and the loop waits for the next interval.

pub mod ip_tracker;
pub mod liveness;
pub mod rate;
pub mod system;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::alerts::{self, AlertLevel};
use crate::config::{ApplicationSpec, Config, ThresholdConfig};
use crate::core::{AddressResolver, GaugeError, GaugeSource, Sample, Sink, UNKNOWN_ADDRESS};
use crate::internal_metrics::Metrics;
use crate::network::{HttpAddressResolver, TcpPortProbe};
use crate::sink::CsvSink;
use anyhow::Result;
use chrono::Utc;
use ip_tracker::IpChangeTracker;
use liveness::LivenessClassifier;
use rate::RateEstimator;
use speed_test::{HttpSpeedTest, SpeedTestScheduler};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use system::{SysinfoGauges, SysinfoProcessTable};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("failed to read host gauges: {0}")]
    Gauges(#[from] GaugeError),
}

/// The collaborators a collector drives.
pub struct CollectorParts {
    pub gauges: Box<dyn GaugeSource>,
    pub liveness: LivenessClassifier,
    pub addresses: Box<dyn AddressResolver>,
    /// `None` when the speed test is disabled.
    pub speed_test: Option<SpeedTestScheduler>,
    pub sink: Arc<dyn Sink>,
}

impl CollectorParts {
    /// Production collaborators backed by the OS and the network.
    pub fn from_config(config: &Config) -> Result<Self> {
        let liveness = LivenessClassifier::new(
            Box::new(SysinfoProcessTable::new()),
            Box::new(TcpPortProbe::from_config(&config.network)),
        );
        let speed_test = if config.speed_test.enabled {
            let backend = HttpSpeedTest::new(&config.speed_test)?;
            Some(SpeedTestScheduler::from_config(
                Box::new(backend),
                &config.speed_test,
            ))
        } else {
            info!("Speed test disabled");
            None
        };
        Ok(Self {
            gauges: Box::new(SysinfoGauges::new(&config.sink.disk_path)),
            liveness,
            addresses: Box::new(HttpAddressResolver::new(&config.network)?),
            speed_test,
            sink: Arc::new(CsvSink::new(&config.sink.path)),
        })
    }
}

pub struct Collector {
    interval: Duration,
    applications: BTreeMap<String, ApplicationSpec>,
    thresholds: ThresholdConfig,
    gauges: Box<dyn GaugeSource>,
    rates: RateEstimator,
    liveness: LivenessClassifier,
    addresses: Box<dyn AddressResolver>,
    ip_tracker: IpChangeTracker,
    speed_test: Option<SpeedTestScheduler>,
    sink: Arc<dyn Sink>,
    metrics: Metrics,
}

impl Collector {
    pub fn new(config: &Config, parts: CollectorParts, metrics: Metrics) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_seconds.max(1)),
            applications: config.applications.clone(),
            thresholds: config.thresholds,
            gauges: parts.gauges,
            rates: RateEstimator::new(),
            liveness: parts.liveness,
            addresses: parts.addresses,
            ip_tracker: IpChangeTracker::new(),
            speed_test: parts.speed_test,
            sink: parts.sink,
            metrics,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    async fn resolve_public_address(&self) -> String {
        match self.addresses.public_address().await {
            Ok(ip) => ip.to_string(),
            Err(e) => {
                warn!(error = %e, "Error getting public IP");
                UNKNOWN_ADDRESS.to_string()
            }
        }
    }

    /// Assembles one sample. Only the gauge read can fail the tick; every
    /// other collaborator degrades to a sentinel or zero.
    #[instrument(skip(self))]
    pub async fn sample(&mut self) -> Result<Sample, CollectError> {
        let timestamp = Utc::now();
        let gauges = self.gauges.sample().await?;
        let throughput = self.rates.estimate(gauges.counters, Instant::now());

        let application_status = self.liveness.classify_all(&self.applications).await;

        let local_address = self
            .addresses
            .local_address()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string());
        let public_address = self.resolve_public_address().await;

        let ip_check = self.ip_tracker.check(&public_address);
        if ip_check.changed {
            warn!(
                previous = ip_check.previous.as_deref().unwrap_or_default(),
                current = %public_address,
                "Public IP changed"
            );
            self.metrics.ip_changes_total.increment(1);
        }

        let speed = match self.speed_test.as_mut() {
            Some(scheduler) => scheduler.maybe_run(Instant::now()).await,
            None => Default::default(),
        };

        Ok(Sample {
            timestamp,
            host_identity: self.gauges.host_identity(),
            cpu_percent: gauges.cpu_percent,
            memory_percent: gauges.memory_percent,
            disk_percent: gauges.disk_percent,
            bytes_sent_total: gauges.counters.bytes_sent,
            bytes_received_total: gauges.counters.bytes_received,
            upload_rate: throughput.upload_mbps,
            download_rate: throughput.download_mbps,
            local_address,
            public_address,
            application_status,
            speed_test_upload: speed.upload_mbps,
            speed_test_download: speed.download_mbps,
        })
    }

    fn report_thresholds(&self, sample: &Sample) {
        let alerts = alerts::evaluate_metrics(
            sample.cpu_percent,
            sample.memory_percent,
            sample.disk_percent,
            &self.thresholds,
        );
        for alert in alerts {
            match alert.level {
                AlertLevel::Critical => error!(host = %sample.host_identity, "{}", alert.message),
                AlertLevel::Warning => warn!(host = %sample.host_identity, "{}", alert.message),
            }
            self.metrics.increment_threshold_alert(alert.level);
        }
        for alert in alerts::check_services(&sample.application_status) {
            debug!(host = %sample.host_identity, "{}", alert.message);
        }
    }

    /// Runs one full tick: sample, evaluate thresholds, persist.
    ///
    /// Sink failures are logged and the sample is dropped; the returned
    /// sample is the one that was (or would have been) written.
    pub async fn tick(&mut self) -> Result<Sample, CollectError> {
        let started = Instant::now();
        self.metrics.ticks_total.increment(1);

        let sample = match self.sample().await {
            Ok(sample) => sample,
            Err(e) => {
                self.metrics.tick_failures_total.increment(1);
                return Err(e);
            }
        };
        self.report_thresholds(&sample);
        self.metrics.record_sample(&sample);

        if let Err(e) = self.sink.append(&sample) {
            self.metrics.sink_write_failures_total.increment(1);
            error!(sink = self.sink.name(), error = %e, "Error saving data");
        }

        self.metrics
            .tick_duration_seconds
            .record(started.elapsed().as_secs_f64());
        info!(
            host = %sample.host_identity,
            cpu = sample.cpu_percent,
            memory = sample.memory_percent,
            disk = sample.disk_percent,
            upload_mbps = sample.upload_rate,
            download_mbps = sample.download_rate,
            "Data collected successfully"
        );
        Ok(sample)
    }

    /// Ticks on the configured interval until shutdown is signalled.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            interval_seconds = self.interval.as_secs(),
            applications = self.applications.len(),
            "Starting data collection"
        );
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    info!("Collector received shutdown signal.");
                    break;
                }
                _ = timer.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "Error collecting data");
                    }
                }
            }
        }
        info!("Collector stopped.");
    }
}
