//! The dashboard API over a CSV table written by the sink.

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::app::{TestApp, TestAppBuilder};
use helpers::fixtures::{sample, write_samples};
use hostwatch::cli::Command;
use hostwatch::core::ApplicationStatus;
use serde_json::Value;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

/// Three samples for POS-01 with CPU at 50, 95 and 99 percent and a public
/// IP change between the last two, plus one sample for POS-02.
fn seed(path: &Path) {
    let mut samples = Vec::new();
    for (age, cpu) in [(30, 50.0), (20, 95.0), (10, 99.0)] {
        let mut s = sample("POS-01", age);
        s.cpu_percent = cpu;
        samples.push(s);
    }
    samples[2].public_address = "198.51.100.2".to_string();
    samples[2]
        .application_status
        .insert("sql_server".to_string(), ApplicationStatus::ProcessRunningPortClosed);
    samples.push(sample("POS-02", 5));
    write_samples(path, &samples);
}

async fn start_dashboard() -> (TempDir, TestApp) {
    let dir = tempdir().unwrap();
    let csv_path = dir.path().join("server_data.csv");
    seed(&csv_path);
    let app = TestAppBuilder::new(Command::Dashboard)
        .with_config(|c| {
            c.sink.path = csv_path.clone();
            c.dashboard.thresholds.cpu_percent = 90.0;
        })
        .start()
        .await
        .unwrap();
    (dir, app)
}

async fn get_json(url: String) -> Value {
    let response = reqwest::get(url).await.unwrap();
    assert!(response.status().is_success(), "status {}", response.status());
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_hosts_and_latest() {
    let (_dir, app) = start_dashboard().await;

    let hosts = get_json(app.dashboard_url("/api/hosts")).await;
    assert_eq!(hosts, serde_json::json!(["POS-01", "POS-02"]));

    let latest = get_json(app.dashboard_url("/api/hosts/POS-01/latest")).await;
    assert_eq!(latest["cpu"], "99.0%");
    assert_eq!(latest["public_ip"], "198.51.100.2");
    assert_eq!(latest["download"], "3.17 Mbps");
    assert_eq!(latest["gauges"]["cpu_usage"], 99.0);

    let missing = reqwest::get(app.dashboard_url("/api/hosts/POS-99/latest"))
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_history_projection() {
    let (_dir, app) = start_dashboard().await;

    let history = get_json(
        app.dashboard_url("/api/hosts/POS-01/history?window=3600&fields=cpu_usage,bogus"),
    )
    .await;
    assert_eq!(history["timestamps"].as_array().unwrap().len(), 3);
    assert_eq!(
        history["series"]["cpu_usage"],
        serde_json::json!([50.0, 95.0, 99.0])
    );
    assert!(history["series"].get("bogus").is_none());

    let empty = get_json(app.dashboard_url("/api/hosts/POS-01/history?fields=bogus")).await;
    assert!(empty["timestamps"].as_array().unwrap().is_empty());

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_services_and_alerts() {
    let (_dir, app) = start_dashboard().await;

    let services = get_json(app.dashboard_url("/api/hosts/POS-01/services")).await;
    let services = services.as_array().unwrap();
    assert_eq!(services.len(), 2);
    assert_eq!(services[1]["name"], "sql_server");
    assert_eq!(services[1]["running"], false);

    let alerts = get_json(app.dashboard_url("/api/hosts/POS-01/alerts")).await;
    let messages: Vec<(&str, &str)> = alerts
        .as_array()
        .unwrap()
        .iter()
        .map(|a| (a["level"].as_str().unwrap(), a["message"].as_str().unwrap()))
        .collect();
    assert_eq!(
        messages,
        vec![
            ("critical", "CPU usage is critical: 99.0%"),
            ("critical", "sql_server is not running (Process Running (Port Closed))"),
            ("warning", "Public IP changed from 203.0.113.7 to 198.51.100.2"),
        ]
    );

    let quiet = get_json(app.dashboard_url("/api/hosts/POS-02/alerts")).await;
    assert!(quiet.as_array().unwrap().is_empty());

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_export_and_page() {
    let (_dir, app) = start_dashboard().await;

    let response = reqwest::get(app.dashboard_url("/api/hosts/POS-01/export"))
        .await
        .unwrap();
    assert!(response.status().is_success());
    let disposition = response.headers()[reqwest::header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("hostwatch_POS-01_"));
    assert!(disposition.contains(".xlsx"));
    let body = response.bytes().await.unwrap();
    assert_eq!(&body[..2], b"PK");
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(body.to_vec())).unwrap();
    let mut workbook = String::new();
    archive
        .by_name("xl/workbook.xml")
        .unwrap()
        .read_to_string(&mut workbook)
        .unwrap();
    for sheet in ["System Metrics", "Services Status", "Network Info"] {
        assert!(workbook.contains(sheet), "missing sheet {sheet}");
    }
    let mut strings = String::new();
    archive
        .by_name("xl/sharedStrings.xml")
        .unwrap()
        .read_to_string(&mut strings)
        .unwrap();
    assert!(strings.contains("POS-01"));
    assert!(strings.contains("198.51.100.2"));
    assert!(strings.contains("Process Running (Port Closed)"));

    let missing = reqwest::get(app.dashboard_url("/api/hosts/POS-99/export"))
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

    let page = reqwest::get(app.dashboard_url("/")).await.unwrap().text().await.unwrap();
    assert!(page.contains("<title>HostWatch</title>"));

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}
