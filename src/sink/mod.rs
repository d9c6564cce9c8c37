//! Persistence of samples in an append-only CSV table.
//!
//! The collector appends through [`CsvSink`]; the dashboard reads through
//! [`SampleStore`]. The two only share the file. Consumers look columns up by
//! name, so the column set may grow without breaking older readers.

pub mod csv_sink;
pub mod store;

pub use csv_sink::CsvSink;
pub use store::{HistoryRow, Record, SampleStore};

use crate::core::{ApplicationStatus, Sample};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

pub const COL_TIMESTAMP: &str = "timestamp";
pub const COL_HOST: &str = "computer_name";
pub const COL_CPU: &str = "cpu_usage";
pub const COL_MEMORY: &str = "memory_usage";
pub const COL_DISK: &str = "disk_usage";
pub const COL_BYTES_SENT: &str = "network_bytes_sent";
pub const COL_BYTES_RECV: &str = "network_bytes_recv";
pub const COL_UPLOAD: &str = "upload_speed_mbps";
pub const COL_DOWNLOAD: &str = "download_speed_mbps";
pub const COL_LOCAL_IP: &str = "local_ip";
pub const COL_PUBLIC_IP: &str = "public_ip";
pub const COL_SPEEDTEST_UPLOAD: &str = "speedtest_upload_mbps";
pub const COL_SPEEDTEST_DOWNLOAD: &str = "speedtest_download_mbps";

const STATUS_SUFFIX: &str = "_status";

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error on sink: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error on sink: {0}")]
    Csv(#[from] csv::Error),
}

/// Column holding the status of application `name`.
pub fn status_column(name: &str) -> String {
    format!("{name}{STATUS_SUFFIX}")
}

/// Application name encoded in a status column, if `column` is one.
pub fn application_from_column(column: &str) -> Option<&str> {
    column
        .strip_suffix(STATUS_SUFFIX)
        .filter(|name| !name.is_empty())
}

/// Serialises a timestamp losslessly.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// The ordered header for a sample with the given applications.
pub fn header_for(applications: impl IntoIterator<Item = impl AsRef<str>>) -> Vec<String> {
    let mut header: Vec<String> = [
        COL_TIMESTAMP,
        COL_HOST,
        COL_CPU,
        COL_MEMORY,
        COL_DISK,
        COL_BYTES_SENT,
        COL_BYTES_RECV,
        COL_UPLOAD,
        COL_DOWNLOAD,
        COL_LOCAL_IP,
        COL_PUBLIC_IP,
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();
    header.extend(applications.into_iter().map(|name| status_column(name.as_ref())));
    header.push(COL_SPEEDTEST_UPLOAD.to_string());
    header.push(COL_SPEEDTEST_DOWNLOAD.to_string());
    header
}

/// Flattens a sample into named fields.
pub fn sample_fields(sample: &Sample) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    let mut put = |k: &str, v: String| {
        fields.insert(k.to_string(), v);
    };
    put(COL_TIMESTAMP, format_timestamp(&sample.timestamp));
    put(COL_HOST, sample.host_identity.clone());
    put(COL_CPU, sample.cpu_percent.to_string());
    put(COL_MEMORY, sample.memory_percent.to_string());
    put(COL_DISK, sample.disk_percent.to_string());
    put(COL_BYTES_SENT, sample.bytes_sent_total.to_string());
    put(COL_BYTES_RECV, sample.bytes_received_total.to_string());
    put(COL_UPLOAD, sample.upload_rate.to_string());
    put(COL_DOWNLOAD, sample.download_rate.to_string());
    put(COL_LOCAL_IP, sample.local_address.clone());
    put(COL_PUBLIC_IP, sample.public_address.clone());
    put(COL_SPEEDTEST_UPLOAD, sample.speed_test_upload.to_string());
    put(COL_SPEEDTEST_DOWNLOAD, sample.speed_test_download.to_string());
    for (name, status) in &sample.application_status {
        fields.insert(status_column(name), status.label().to_string());
    }
    fields
}

/// Parses application statuses out of a flattened record. Unrecognised
/// values (for example "Unknown" written for a missing application) are
/// skipped.
pub fn statuses_from_fields<'a>(
    fields: impl IntoIterator<Item = (&'a String, &'a String)>,
) -> BTreeMap<String, ApplicationStatus> {
    fields
        .into_iter()
        .filter_map(|(column, value)| {
            let name = application_from_column(column)?;
            let status = value.parse().ok()?;
            Some((name.to_string(), status))
        })
        .collect()
}
