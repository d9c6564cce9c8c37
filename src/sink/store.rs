//! Read side of the CSV table, used by the dashboard.
//!
//! Every query is a filter over the whole table. The parsed table is cached
//! for a short TTL so that the several panels refreshed together by one
//! dashboard poll share a single read of the file.

use super::*;
use crate::core::{Sample, UNKNOWN_ADDRESS};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use moka::future::Cache;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// One row of the table with its timestamp parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub timestamp: DateTime<Utc>,
    pub fields: BTreeMap<String, String>,
}

impl Record {
    /// A field's value, treating empty cells as absent.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn host(&self) -> Option<&str> {
        self.get(COL_HOST)
    }

    fn number<T: std::str::FromStr>(&self, column: &str) -> Option<T> {
        self.get(column)?.parse().ok()
    }

    /// Application statuses recorded in this row.
    pub fn statuses(&self) -> BTreeMap<String, crate::core::ApplicationStatus> {
        statuses_from_fields(&self.fields)
    }

    /// Rebuilds the sample this row was written from.
    ///
    /// Returns `None` when a core column is missing or malformed. Speed test
    /// columns, absent from older tables, read as zero.
    pub fn to_sample(&self) -> Option<Sample> {
        Some(Sample {
            timestamp: self.timestamp,
            host_identity: self.host()?.to_string(),
            cpu_percent: self.number(COL_CPU)?,
            memory_percent: self.number(COL_MEMORY)?,
            disk_percent: self.number(COL_DISK)?,
            bytes_sent_total: self.number(COL_BYTES_SENT)?,
            bytes_received_total: self.number(COL_BYTES_RECV)?,
            upload_rate: self.number(COL_UPLOAD)?,
            download_rate: self.number(COL_DOWNLOAD)?,
            local_address: self.get(COL_LOCAL_IP).unwrap_or(UNKNOWN_ADDRESS).to_string(),
            public_address: self.get(COL_PUBLIC_IP).unwrap_or(UNKNOWN_ADDRESS).to_string(),
            application_status: self.statuses(),
            speed_test_upload: self.number(COL_SPEEDTEST_UPLOAD).unwrap_or(0.0),
            speed_test_download: self.number(COL_SPEEDTEST_DOWNLOAD).unwrap_or(0.0),
        })
    }
}

/// A point of a history chart: the timestamp and the requested fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    pub timestamp: DateTime<Utc>,
    pub values: BTreeMap<String, String>,
}

/// Parses the timestamps the collector writes (RFC 3339) as well as the
/// naive local ISO timestamps found in older tables.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Reads and sorts the whole table. Any failure yields an empty table.
fn load_table(path: &Path) -> Vec<Record> {
    if !path.exists() {
        error!(path = %path.display(), "Data file not found");
        return Vec::new();
    }

    let mut reader = match csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
    {
        Ok(reader) => reader,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Error reading data");
            return Vec::new();
        }
    };

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => {
            error!(path = %path.display(), error = %e, "Error reading CSV header");
            return Vec::new();
        }
    };

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for row in reader.records() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable row");
                skipped += 1;
                continue;
            }
        };
        let fields: BTreeMap<String, String> = headers
            .iter()
            .zip(row.iter())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        match fields.get(COL_TIMESTAMP).and_then(|raw| parse_timestamp(raw)) {
            Some(timestamp) => records.push(Record { timestamp, fields }),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(path = %path.display(), skipped, "Skipped rows without a valid timestamp");
    }

    records.sort_by_key(|r| r.timestamp);
    info!(path = %path.display(), rows = records.len(), "Data read from CSV");
    records
}

/// Query interface over the CSV table.
#[derive(Clone)]
pub struct SampleStore {
    path: PathBuf,
    cache: Cache<(), Arc<Vec<Record>>>,
}

impl SampleStore {
    /// Creates a store reading `path`, reusing a parsed copy for `ttl`.
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        let cache = Cache::builder().time_to_live(ttl).max_capacity(1).build();
        Self {
            path: path.into(),
            cache,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Forces the next query to re-read the file.
    pub async fn invalidate(&self) {
        self.cache.invalidate(&()).await;
    }

    async fn table(&self) -> Arc<Vec<Record>> {
        let path = self.path.clone();
        self.cache
            .get_with((), async move {
                let records = tokio::task::spawn_blocking(move || load_table(&path))
                    .await
                    .unwrap_or_else(|e| {
                        error!(error = %e, "CSV load task failed");
                        Vec::new()
                    });
                Arc::new(records)
            })
            .await
    }

    /// Distinct host identities, sorted.
    pub async fn hosts(&self) -> Vec<String> {
        let table = self.table().await;
        let hosts: BTreeSet<&str> = table.iter().filter_map(Record::host).collect();
        hosts.into_iter().map(str::to_string).collect()
    }

    /// The `n`-th most recent rows for a host, newest first.
    async fn recent_records(&self, host: &str, n: usize) -> Vec<Record> {
        let table = self.table().await;
        table
            .iter()
            .rev()
            .filter(|r| r.host() == Some(host))
            .take(n)
            .cloned()
            .collect()
    }

    /// The most recent raw row for a host.
    pub async fn latest_record(&self, host: &str) -> Option<Record> {
        self.recent_records(host, 1).await.into_iter().next()
    }

    /// The row before the most recent one for a host.
    pub async fn previous_record(&self, host: &str) -> Option<Record> {
        self.recent_records(host, 2).await.into_iter().nth(1)
    }

    /// The most recent sample for a host.
    pub async fn latest(&self, host: &str) -> Option<Sample> {
        self.latest_record(host).await?.to_sample()
    }

    /// The sample before the most recent one, used for change detection.
    pub async fn previous(&self, host: &str) -> Option<Sample> {
        self.previous_record(host).await?.to_sample()
    }

    /// Rows for a host within the last `window`, projected to `fields`.
    ///
    /// Requested fields the table does not have are ignored; if none of them
    /// exist the result is empty.
    pub async fn history(&self, host: &str, window: Duration, fields: &[&str]) -> Vec<HistoryRow> {
        let table = self.table().await;
        let cutoff = chrono::Duration::from_std(window)
            .ok()
            .and_then(|w| Utc::now().checked_sub_signed(w))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let rows: Vec<&Record> = table
            .iter()
            .filter(|r| r.host() == Some(host) && r.timestamp >= cutoff)
            .collect();

        let available: Vec<&str> = fields
            .iter()
            .copied()
            .filter(|f| rows.iter().any(|r| r.fields.contains_key(*f)))
            .collect();
        if available.is_empty() {
            if !rows.is_empty() {
                warn!(?fields, "No requested metrics found in data");
            }
            return Vec::new();
        }

        let history: Vec<HistoryRow> = rows
            .into_iter()
            .map(|r| HistoryRow {
                timestamp: r.timestamp,
                values: available
                    .iter()
                    .filter_map(|f| r.fields.get(*f).map(|v| (f.to_string(), v.clone())))
                    .collect(),
            })
            .collect();
        debug!(host, rows = history.len(), "Retrieved historical data");
        history
    }
}
