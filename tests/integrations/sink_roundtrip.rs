//! Samples written by the CSV sink and read back through the store.

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::fixtures::{sample, write_samples};
use hostwatch::core::{ApplicationStatus, Sink};
use hostwatch::sink::{CsvSink, SampleStore};
use std::time::Duration;
use tempfile::tempdir;

fn store(path: &std::path::Path) -> SampleStore {
    SampleStore::new(path, Duration::from_secs(5))
}

#[tokio::test]
async fn test_latest_equals_written_sample() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("server_data.csv");
    let written = sample("POS-01", 0);
    write_samples(&path, &[written.clone()]);

    let read = store(&path).latest("POS-01").await.unwrap();
    assert_eq!(read, written);
}

#[tokio::test]
async fn test_hosts_are_kept_apart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("server_data.csv");
    let mut other = sample("POS-02", 5);
    other.cpu_percent = 77.7;
    write_samples(&path, &[sample("POS-01", 10), other, sample("POS-01", 0)]);

    let store = store(&path);
    assert_eq!(store.hosts().await, vec!["POS-01", "POS-02"]);
    assert_eq!(store.latest("POS-02").await.unwrap().cpu_percent, 77.7);
    assert!(store.previous("POS-02").await.is_none());
    assert!(store.previous("POS-01").await.is_some());
}

#[tokio::test]
async fn test_registry_change_keeps_existing_header() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("server_data.csv");
    write_samples(&path, &[sample("POS-01", 10)]);

    // A later run monitors a different set of applications.
    let mut changed = sample("POS-01", 0);
    changed.application_status.remove("sql_server");
    changed
        .application_status
        .insert("tims".to_string(), ApplicationStatus::Stopped);
    CsvSink::new(&path).append(&changed).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let widths: Vec<usize> = contents.lines().map(|l| l.split(',').count()).collect();
    assert_eq!(widths.len(), 3);
    assert!(widths.iter().all(|w| *w == widths[0]));
    let header: Vec<&str> = contents.lines().next().unwrap().split(',').collect();
    assert!(header.contains(&"etims_status"));
    assert!(!header.contains(&"tims_status"));

    let latest = store(&path).latest("POS-01").await.unwrap();
    assert_eq!(latest.application_status.len(), 1);
    assert_eq!(latest.application_status["etims"], ApplicationStatus::Running);
}

#[tokio::test]
async fn test_unparseable_table_reads_as_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("server_data.csv");
    std::fs::write(&path, "this is not,a monitoring table\n1,2\n").unwrap();

    let store = store(&path);
    assert!(store.hosts().await.is_empty());
    assert!(store.latest("POS-01").await.is_none());
}
