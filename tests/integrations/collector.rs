//! End-to-end collector runs against scripted hosts.

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::app::{FakeHost, TestAppBuilder};
use hostwatch::cli::Command;
use hostwatch::collector::test_utils::MemorySink;
use hostwatch::collector::Collector;
use hostwatch::config::{ApplicationSpec, Config};
use hostwatch::core::{ApplicationStatus, NetworkCounters, SystemGauges, UNKNOWN_ADDRESS};
use hostwatch::internal_metrics::Metrics;
use hostwatch::sink::{CsvSink, SampleStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn gauges(cpu: f64, sent: u64, received: u64) -> SystemGauges {
    SystemGauges {
        cpu_percent: cpu,
        memory_percent: 55.0,
        disk_percent: 40.0,
        counters: NetworkCounters {
            bytes_sent: sent,
            bytes_received: received,
        },
    }
}

fn registry() -> BTreeMap<String, ApplicationSpec> {
    [("etims", "etims", 8000), ("sql_server", "sqlservr", 1433)]
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

#[tokio::test(start_paused = true)]
async fn test_app_collects_every_interval_until_shutdown() {
    let host = FakeHost::new("POS-01");
    host.gauges.push_reading(gauges(20.0, 0, 0));
    let sink = MemorySink::new();

    let app = TestAppBuilder::new(Command::Collect)
        .with_config(|c| {
            c.interval_seconds = 5;
            c.applications = registry();
        })
        .with_fake_host(&host, &sink)
        .start()
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(12_500)).await;
    app.shutdown(Duration::from_secs(5)).await.unwrap();

    let samples = sink.samples();
    assert_eq!(samples.len(), 3);
    for sample in &samples {
        assert_eq!(sample.host_identity, "POS-01");
        assert_eq!(sample.application_status.len(), 2);
        // No public address was scripted.
        assert_eq!(sample.public_address, UNKNOWN_ADDRESS);
    }
    assert!(samples.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[tokio::test]
async fn test_collector_survives_gauge_and_sink_failures() {
    let host = FakeHost::new("POS-01");
    let sink = MemorySink::new();
    let config = Config {
        applications: registry(),
        ..Default::default()
    };
    let mut collector = Collector::new(
        &config,
        host.parts(Arc::new(sink.clone())),
        Metrics::new_for_test(),
    );

    host.gauges.push_error(hostwatch::core::GaugeError::NoMemory);
    assert!(collector.tick().await.is_err());

    sink.set_failing(true);
    host.gauges.push_reading(gauges(10.0, 100, 100));
    assert!(collector.tick().await.is_ok());

    sink.set_failing(false);
    assert!(collector.tick().await.is_ok());
    assert_eq!(sink.samples().len(), 1);
}

#[tokio::test]
async fn test_liveness_states_flow_into_samples() {
    let host = FakeHost::new("POS-01");
    host.gauges.push_reading(gauges(10.0, 0, 0));
    host.processes.set_processes(&["sqlservr.exe", "explorer.exe"]);
    host.ports.set_open(&[8000]);
    let sink = MemorySink::new();
    let config = Config {
        applications: registry(),
        ..Default::default()
    };
    let mut collector = Collector::new(
        &config,
        host.parts(Arc::new(sink.clone())),
        Metrics::new_for_test(),
    );

    let sample = collector.tick().await.unwrap();
    assert_eq!(
        sample.application_status["etims"],
        ApplicationStatus::PortActiveProcessStopped
    );
    assert_eq!(
        sample.application_status["sql_server"],
        ApplicationStatus::ProcessRunningPortClosed
    );

    host.ports.set_open(&[8000, 1433]);
    host.processes.set_processes(&["etims", "sqlservr.exe"]);
    let sample = collector.tick().await.unwrap();
    assert!(sample.application_status.values().all(|s| s.is_running()));
}

#[tokio::test]
async fn test_collected_rows_are_queryable_with_ip_history() {
    let dir = tempdir().unwrap();
    let csv_path = dir.path().join("data").join("server_data.csv");

    let host = FakeHost::new("POS-01");
    host.gauges.push_reading(gauges(10.0, 0, 0));
    host.addresses.push_public(Some("203.0.113.7"));
    host.addresses.push_public(None);
    host.addresses.push_public(Some("198.51.100.2"));
    let config = Config {
        applications: registry(),
        ..Default::default()
    };
    let mut collector = Collector::new(
        &config,
        host.parts(Arc::new(CsvSink::new(&csv_path))),
        Metrics::new_for_test(),
    );
    for _ in 0..3 {
        collector.tick().await.unwrap();
    }

    let store = SampleStore::new(&csv_path, Duration::from_secs(5));
    assert_eq!(store.hosts().await, vec!["POS-01"]);
    let latest = store.latest("POS-01").await.unwrap();
    let previous = store.previous("POS-01").await.unwrap();
    assert_eq!(latest.public_address, "198.51.100.2");
    // The failed lookup is persisted as the sentinel.
    assert_eq!(previous.public_address, UNKNOWN_ADDRESS);

    let rows = store
        .history("POS-01", Duration::from_secs(600), &["cpu_usage"])
        .await;
    assert_eq!(rows.len(), 3);
}
