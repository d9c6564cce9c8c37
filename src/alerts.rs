//! Threshold, service and IP-change alert evaluation.
//!
//! The collector and the dashboard both evaluate alerts through this module,
//! so a value and a threshold always yield the same verdict in the log and on
//! screen.

use crate::config::ThresholdConfig;
use crate::core::{ApplicationStatus, Sample, UNKNOWN_ADDRESS};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Share of a limit above which a value is reported as a warning.
pub const WARNING_FRACTION: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Critical,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertLevel::Warning => write!(f, "warning"),
            AlertLevel::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
}

impl Alert {
    fn new(level: AlertLevel, message: String) -> Self {
        Self { level, message }
    }
}

/// Tier of `value` against `limit`: strictly above the limit is critical,
/// strictly above 80% of it is a warning.
pub fn evaluate_metric(value: f64, limit: f64) -> Option<AlertLevel> {
    if !value.is_finite() {
        return None;
    }
    if value > limit {
        Some(AlertLevel::Critical)
    } else if value > limit * WARNING_FRACTION {
        Some(AlertLevel::Warning)
    } else {
        None
    }
}

fn metric_alert(label: &str, value: f64, limit: f64) -> Option<Alert> {
    evaluate_metric(value, limit).map(|level| {
        let message = match level {
            AlertLevel::Critical => format!("{label} usage is critical: {value:.1}%"),
            AlertLevel::Warning => format!("{label} usage is high: {value:.1}%"),
        };
        Alert::new(level, message)
    })
}

/// Utilization alerts for CPU, memory and disk, in that order.
pub fn evaluate_metrics(
    cpu_percent: f64,
    memory_percent: f64,
    disk_percent: f64,
    thresholds: &ThresholdConfig,
) -> Vec<Alert> {
    [
        metric_alert("CPU", cpu_percent, thresholds.cpu_percent),
        metric_alert("Memory", memory_percent, thresholds.memory_percent),
        metric_alert("Disk", disk_percent, thresholds.disk_percent),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// A critical alert for every application that is not fully running.
pub fn check_services(statuses: &BTreeMap<String, ApplicationStatus>) -> Vec<Alert> {
    statuses
        .iter()
        .filter(|(_, status)| !status.is_running())
        .map(|(name, status)| {
            Alert::new(
                AlertLevel::Critical,
                format!("{name} is not running ({status})"),
            )
        })
        .collect()
}

fn is_real_address(address: &str) -> bool {
    let address = address.trim();
    !address.is_empty() && address != UNKNOWN_ADDRESS
}

/// Compares the public addresses of two consecutive persisted samples.
pub fn check_ip_change(previous: &str, latest: &str) -> Option<Alert> {
    if !is_real_address(previous) || !is_real_address(latest) || previous.trim() == latest.trim() {
        return None;
    }
    Some(Alert::new(
        AlertLevel::Warning,
        format!("Public IP changed from {} to {}", previous.trim(), latest.trim()),
    ))
}

/// Every alert raised by `latest`, with IP changes judged against `previous`.
pub fn evaluate_sample(
    latest: &Sample,
    previous: Option<&Sample>,
    thresholds: &ThresholdConfig,
) -> Vec<Alert> {
    let mut alerts = evaluate_metrics(
        latest.cpu_percent,
        latest.memory_percent,
        latest.disk_percent,
        thresholds,
    );
    alerts.extend(check_services(&latest.application_status));
    if let Some(previous) = previous {
        alerts.extend(check_ip_change(&previous.public_address, &latest.public_address));
    }
    alerts
}
