//! # Host Gauges
//!
//! `sysinfo`-backed implementations of the OS seams: utilization gauges,
//! cumulative interface counters and the process table.

use crate::core::{GaugeError, GaugeSource, NetworkCounters, ProcessTable, SystemGauges};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sysinfo::{Disks, Networks, System};

/// Window over which CPU usage is measured on each tick.
const CPU_MEASUREMENT_WINDOW: Duration = Duration::from_secs(1);

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round1(used as f64 / total as f64 * 100.0)
}

/// Reads gauges for the whole machine.
pub struct SysinfoGauges {
    system: System,
    disks: Disks,
    networks: Networks,
    disk_path: PathBuf,
}

impl SysinfoGauges {
    /// Creates a gauge source reporting disk usage for the mount holding
    /// `disk_path`.
    pub fn new(disk_path: impl Into<PathBuf>) -> Self {
        Self {
            system: System::new(),
            disks: Disks::new_with_refreshed_list(),
            networks: Networks::new_with_refreshed_list(),
            disk_path: disk_path.into(),
        }
    }

    fn disk_percent(&mut self) -> Result<f64, GaugeError> {
        self.disks.refresh_list();
        // The mount with the longest prefix of the configured path wins.
        self.disks
            .iter()
            .filter(|disk| self.disk_path.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(|disk| {
                let total = disk.total_space();
                percent(total.saturating_sub(disk.available_space()), total)
            })
            .ok_or_else(|| GaugeError::DiskNotFound(self.disk_path.display().to_string()))
    }

    fn network_counters(&mut self) -> NetworkCounters {
        self.networks.refresh_list();
        let mut counters = NetworkCounters::default();
        for (_interface, data) in &self.networks {
            counters.bytes_sent += data.total_transmitted();
            counters.bytes_received += data.total_received();
        }
        counters
    }

    pub fn disk_path(&self) -> &Path {
        &self.disk_path
    }
}

#[async_trait]
impl GaugeSource for SysinfoGauges {
    fn host_identity(&self) -> String {
        System::host_name().unwrap_or_else(|| "unknown-host".to_string())
    }

    async fn sample(&mut self) -> Result<SystemGauges, GaugeError> {
        // CPU usage is the difference between two refreshes.
        self.system.refresh_cpu();
        tokio::time::sleep(CPU_MEASUREMENT_WINDOW).await;
        self.system.refresh_cpu();
        let cpu_percent = round1(self.system.global_cpu_info().cpu_usage() as f64);

        self.system.refresh_memory();
        let total_memory = self.system.total_memory();
        if total_memory == 0 {
            return Err(GaugeError::NoMemory);
        }
        let memory_percent = percent(self.system.used_memory(), total_memory);

        let disk_percent = self.disk_percent()?;
        let counters = self.network_counters();

        Ok(SystemGauges {
            cpu_percent,
            memory_percent,
            disk_percent,
            counters,
        })
    }
}

/// The live process table.
pub struct SysinfoProcessTable {
    system: System,
}

impl SysinfoProcessTable {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SysinfoProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SysinfoProcessTable {
    fn refresh(&mut self) {
        // sysinfo drops processes that vanish between listing and reading.
        self.system.refresh_processes();
    }

    fn process_names(&self) -> Vec<String> {
        self.system
            .processes()
            .values()
            .map(|process| process.name().to_string())
            .collect()
    }
}
