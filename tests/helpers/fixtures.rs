#![allow(dead_code)]
//! Sample builders and CSV fixtures shared by the integration tests.

use chrono::{DateTime, Duration, Utc};
use hostwatch::core::{ApplicationStatus, Sample, Sink};
use hostwatch::sink::CsvSink;
use std::collections::BTreeMap;
use std::path::Path;

/// A fully populated sample for `host` taken `age_secs` seconds ago.
pub fn sample(host: &str, age_secs: i64) -> Sample {
    let mut application_status = BTreeMap::new();
    application_status.insert("etims".to_string(), ApplicationStatus::Running);
    application_status.insert("sql_server".to_string(), ApplicationStatus::Running);
    Sample {
        timestamp: at(age_secs),
        host_identity: host.to_string(),
        cpu_percent: 23.4,
        memory_percent: 61.2,
        disk_percent: 48.9,
        bytes_sent_total: 1_234_567,
        bytes_received_total: 9_876_543,
        upload_rate: 0.42,
        download_rate: 3.17,
        local_address: "10.0.0.5".to_string(),
        public_address: "203.0.113.7".to_string(),
        application_status,
        speed_test_upload: 9.5,
        speed_test_download: 48.25,
    }
}

pub fn at(age_secs: i64) -> DateTime<Utc> {
    Utc::now() - Duration::seconds(age_secs)
}

/// Appends `samples` to a CSV table at `path` through the production sink.
pub fn write_samples(path: &Path, samples: &[Sample]) {
    let sink = CsvSink::new(path);
    for sample in samples {
        sink.append(sample).unwrap();
    }
}
