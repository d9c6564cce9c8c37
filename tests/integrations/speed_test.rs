//! The HTTP benchmark against a mock speedtest.net server.

use hostwatch::collector::speed_test::{HttpSpeedTest, SpeedTestError, SpeedTestServer};
use hostwatch::config::SpeedTestConfig;
use hostwatch::core::SpeedTestBackend;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> SpeedTestConfig {
    SpeedTestConfig {
        servers_url: format!("{}/servers", server.uri()),
        latency_samples: 2,
        download_sizes: vec![350, 750],
        upload_bytes: 200_000,
        request_timeout_ms: 5_000,
        ..SpeedTestConfig::default()
    }
}

fn server_entry(server: &MockServer, dir: &str) -> serde_json::Value {
    json!({
        "url": format!("{}/{dir}/upload.php", server.uri()),
        "name": dir,
        "sponsor": "Mock ISP",
    })
}

async fn mount_healthy(server: &MockServer, dir: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/{dir}/latency.txt")))
        .respond_with(ResponseTemplate::new(200).set_body_string("test=test"))
        .mount(server)
        .await;
    for size in [350, 750] {
        Mock::given(method("GET"))
            .and(path(format!("/{dir}/random{size}x{size}.jpg")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 250_000]))
            .mount(server)
            .await;
    }
    Mock::given(method("POST"))
        .and(path(format!("/{dir}/upload.php")))
        .respond_with(ResponseTemplate::new(200).set_body_string("size=200000"))
        .mount(server)
        .await;
}

async fn mount_server_list(server: &MockServer, list: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/servers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_benchmark_reports_positive_rates() {
    let server = MockServer::start().await;
    mount_server_list(&server, json!([server_entry(&server, "speedtest")])).await;
    mount_healthy(&server, "speedtest").await;

    let benchmark = HttpSpeedTest::new(&config_for(&server)).unwrap();
    let result = benchmark.run().await.unwrap();

    assert!(result.download_mbps > 0.0, "download {}", result.download_mbps);
    assert!(result.upload_mbps > 0.0, "upload {}", result.upload_mbps);
}

#[tokio::test]
async fn test_selects_the_responsive_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken/latency.txt"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_healthy(&server, "speedtest").await;

    let candidates: Vec<SpeedTestServer> = serde_json::from_value(json!([
        server_entry(&server, "broken"),
        server_entry(&server, "speedtest"),
    ]))
    .unwrap();

    let benchmark = HttpSpeedTest::new(&config_for(&server)).unwrap();
    let best = benchmark.select_best_server(&candidates).await.unwrap();
    assert_eq!(best.name, "speedtest");
    assert_eq!(best.base_url(), format!("{}/speedtest/", server.uri()));
}

#[tokio::test]
async fn test_empty_server_list() {
    let server = MockServer::start().await;
    mount_server_list(&server, json!([])).await;

    let benchmark = HttpSpeedTest::new(&config_for(&server)).unwrap();
    let err = benchmark.run().await.unwrap_err();
    assert!(matches!(err, SpeedTestError::NoServers), "got {err:?}");
}

#[tokio::test]
async fn test_unreachable_servers() {
    let server = MockServer::start().await;
    mount_server_list(&server, json!([server_entry(&server, "broken")])).await;
    Mock::given(method("GET"))
        .and(path("/broken/latency.txt"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let benchmark = HttpSpeedTest::new(&config_for(&server)).unwrap();
    let err = benchmark.run().await.unwrap_err();
    assert!(matches!(err, SpeedTestError::NoServers), "got {err:?}");
}

#[tokio::test]
async fn test_failed_download_is_a_network_error() {
    let server = MockServer::start().await;
    mount_server_list(&server, json!([server_entry(&server, "flaky")])).await;
    Mock::given(method("GET"))
        .and(path("/flaky/latency.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("test=test"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky/random350x350.jpg"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let benchmark = HttpSpeedTest::new(&config_for(&server)).unwrap();
    let err = benchmark.run().await.unwrap_err();
    assert!(matches!(err, SpeedTestError::Network(_)), "got {err:?}");
}

#[tokio::test]
async fn test_unavailable_server_list_is_a_config_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/servers"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let benchmark = HttpSpeedTest::new(&config_for(&server)).unwrap();
    let err = benchmark.fetch_servers().await.unwrap_err();
    assert!(matches!(err, SpeedTestError::Config(_)), "got {err:?}");
}
