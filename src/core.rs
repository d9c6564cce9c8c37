//! Core domain types and service traits for HostWatch
//!
//! This module defines the sample record produced by every collector tick and
//! the trait contracts for the OS and network collaborators the collector
//! depends on. Each trait has a production implementation in `collector` and a
//! fake in `collector::test_utils`.

use crate::collector::speed_test::SpeedTestError;
use crate::network::PublicIpError;
use crate::sink::SinkError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;

/// Placeholder stored when a network identity cannot be determined.
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// Liveness verdict for a monitored application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Running,
    ProcessRunningPortClosed,
    PortActiveProcessStopped,
    Stopped,
}

impl ApplicationStatus {
    /// Combines the two liveness signals into a verdict.
    pub fn from_checks(process_running: bool, port_active: bool) -> Self {
        match (process_running, port_active) {
            (true, true) => Self::Running,
            (true, false) => Self::ProcessRunningPortClosed,
            (false, true) => Self::PortActiveProcessStopped,
            (false, false) => Self::Stopped,
        }
    }

    /// The label persisted in the sink and shown on the dashboard.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::ProcessRunningPortClosed => "Process Running (Port Closed)",
            Self::PortActiveProcessStopped => "Port Active (Process Stopped)",
            Self::Stopped => "Stopped",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognised application status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for ApplicationStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::Running,
            Self::ProcessRunningPortClosed,
            Self::PortActiveProcessStopped,
            Self::Stopped,
        ]
        .into_iter()
        .find(|status| status.label().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

/// One row produced per collector tick. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub host_identity: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub bytes_sent_total: u64,
    pub bytes_received_total: u64,
    /// Counter-derived throughput in Mbps.
    pub upload_rate: f64,
    pub download_rate: f64,
    pub local_address: String,
    pub public_address: String,
    pub application_status: BTreeMap<String, ApplicationStatus>,
    /// Most recent active benchmark in Mbps, cached between runs.
    pub speed_test_upload: f64,
    pub speed_test_download: f64,
}

/// Cumulative network counters since the interface came up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkCounters {
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Point-in-time utilization gauges read from the OS.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SystemGauges {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub counters: NetworkCounters,
}

/// Errors raised while reading OS gauges.
#[derive(Debug, Error)]
pub enum GaugeError {
    #[error("disk mount '{0}' not found")]
    DiskNotFound(String),
    #[error("host reported zero total memory")]
    NoMemory,
}

// =============================================================================
// Service Traits
// =============================================================================

/// Reads CPU, memory, disk and network counters from the host.
#[async_trait]
pub trait GaugeSource: Send + Sync {
    /// Returns the stable name of the sampled machine.
    fn host_identity(&self) -> String;

    /// Samples all gauges. May block for the CPU measurement window.
    async fn sample(&mut self) -> Result<SystemGauges, GaugeError>;
}

/// A snapshot view of the live process table.
pub trait ProcessTable: Send + Sync {
    /// Re-reads the process table. Processes that exit mid-scan are skipped.
    fn refresh(&mut self);

    /// Names of all processes seen by the last refresh.
    fn process_names(&self) -> Vec<String>;
}

/// Checks whether something accepts TCP connections on a local port.
#[async_trait]
pub trait PortProbe: Send + Sync {
    async fn is_active(&self, port: u16) -> bool;
}

/// Discovers the host's network identity.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// The address of the interface used for outbound traffic.
    fn local_address(&self) -> Option<IpAddr>;

    /// The address the outside world sees.
    async fn public_address(&self) -> Result<IpAddr, PublicIpError>;
}

/// Result of one active throughput benchmark, in Mbps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeedTestResult {
    pub upload_mbps: f64,
    pub download_mbps: f64,
}

/// Runs an active network benchmark end to end.
#[async_trait]
pub trait SpeedTestBackend: Send + Sync {
    async fn run(&self) -> Result<SpeedTestResult, SpeedTestError>;
}

/// Append-only destination for samples.
pub trait Sink: Send + Sync {
    /// A short name used for logging and metrics.
    fn name(&self) -> &str;

    /// Appends one sample. Existing rows are never rewritten.
    fn append(&self, sample: &Sample) -> Result<(), SinkError>;
}
