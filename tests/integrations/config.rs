use clap::Parser;
use hostwatch::cli::Cli;
use hostwatch::config::Config;
use serial_test::serial;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Runs `test_fn` with a temporary config file carrying `suffix`.
fn with_config_file<F>(suffix: &str, content: &str, test_fn: F)
where
    F: FnOnce(PathBuf),
{
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    write!(file, "{}", content).unwrap();
    test_fn(file.path().to_path_buf());
}

fn cli(args: &[&str]) -> Cli {
    let mut argv = vec!["hostwatch"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

fn cli_with_file(path: &Path, args: &[&str]) -> Cli {
    let mut argv = vec!["--config", path.to_str().unwrap()];
    argv.extend_from_slice(args);
    cli(&argv)
}

#[test]
#[serial]
fn test_load_full_valid_config() {
    let toml_content = r#"
        log_level = "warn"
        interval_seconds = 30
        [applications.pos]
        process_name = "posd"
        port = 9000
        [thresholds]
        cpu_percent = 70.0
        memory_percent = 75.0
        disk_percent = 95.0
        [network]
        public_ip_url = "http://ip.example.test"
        request_timeout_ms = 1500
        [speed_test]
        interval_seconds = 900
        download_sizes = [350]
        [sink]
        path = "/var/lib/hostwatch/data.csv"
        [dashboard]
        listen_address = "127.0.0.1:8060"
        cache_seconds = 10
        [dashboard.thresholds]
        cpu_percent = 60.0
        [metrics]
        enabled = true
        [logging]
        file = "/var/log/hostwatch"
    "#;

    with_config_file(".toml", toml_content, |path| {
        let config = Config::load(&cli_with_file(&path, &[])).unwrap();

        assert_eq!(config.log_level, "warn");
        assert_eq!(config.interval_seconds, 30);
        assert_eq!(config.applications.len(), 1);
        assert_eq!(config.applications["pos"].process_name, "posd");
        assert_eq!(config.applications["pos"].port, 9000);
        assert_eq!(config.thresholds.cpu_percent, 70.0);
        assert_eq!(config.thresholds.disk_percent, 95.0);
        assert_eq!(config.network.public_ip_url, "http://ip.example.test");
        assert_eq!(config.network.request_timeout_ms, 1500);
        // Unset keys keep their defaults.
        assert_eq!(config.network.port_probe_timeout_ms, 500);
        assert!(config.speed_test.enabled);
        assert_eq!(config.speed_test.interval_seconds, 900);
        assert_eq!(config.speed_test.download_sizes, vec![350]);
        assert_eq!(config.sink.path, PathBuf::from("/var/lib/hostwatch/data.csv"));
        assert_eq!(config.dashboard.listen_address.port(), 8060);
        assert_eq!(config.dashboard.cache_seconds, 10);
        assert_eq!(config.dashboard.thresholds.cpu_percent, 60.0);
        assert_eq!(config.dashboard.thresholds.memory_percent, 90.0);
        assert!(config.metrics.enabled);
        assert_eq!(config.logging.file, Some(PathBuf::from("/var/log/hostwatch")));
    });
}

#[test]
#[serial]
fn test_load_yaml_and_json() {
    let yaml = "interval_seconds: 15\nspeed_test:\n  enabled: false\n";
    with_config_file(".yaml", yaml, |path| {
        let config = Config::load(&cli_with_file(&path, &[])).unwrap();
        assert_eq!(config.interval_seconds, 15);
        assert!(!config.speed_test.enabled);
        assert_eq!(config.applications.len(), 5);
    });

    let json = r#"{"sink": {"path": "samples.csv"}, "dashboard": {"refresh_seconds": 2}}"#;
    with_config_file(".json", json, |path| {
        let config = Config::load(&cli_with_file(&path, &[])).unwrap();
        assert_eq!(config.sink.path, PathBuf::from("samples.csv"));
        assert_eq!(config.dashboard.refresh_seconds, 2);
    });
}

#[test]
#[serial]
fn test_env_overrides_file_and_cli_overrides_env() {
    let toml_content = r#"
        interval_seconds = 30
        [speed_test]
        enabled = true
    "#;

    with_config_file(".toml", toml_content, |path| {
        std::env::set_var("HOSTWATCH_SPEED_TEST__ENABLED", "false");
        std::env::set_var("HOSTWATCH_INTERVAL_SECONDS", "45");

        let from_env = Config::load(&cli_with_file(&path, &[]));
        let from_cli = Config::load(&cli_with_file(&path, &["--interval", "5"]));

        std::env::remove_var("HOSTWATCH_SPEED_TEST__ENABLED");
        std::env::remove_var("HOSTWATCH_INTERVAL_SECONDS");

        let from_env = from_env.unwrap();
        assert!(!from_env.speed_test.enabled);
        assert_eq!(from_env.interval_seconds, 45);
        assert_eq!(from_cli.unwrap().interval_seconds, 5);
    });
}

#[test]
#[serial]
fn test_cli_flags() {
    let config = Config::load(&cli(&["--csv", "/tmp/hw.csv", "--debug", "dashboard"])).unwrap();
    assert_eq!(config.sink.path, PathBuf::from("/tmp/hw.csv"));
    assert!(config.debug_mode);
    assert_eq!(config.effective_log_level(), "debug");

    // Without --debug the file setting is kept.
    with_config_file(".toml", "debug_mode = true\n", |path| {
        let config = Config::load(&cli_with_file(&path, &[])).unwrap();
        assert!(config.debug_mode);
    });
}

#[test]
#[serial]
fn test_malformed_file_falls_back_to_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "interval_seconds = \"often\"").unwrap();

    let cli = cli_with_file(file.path(), &["--csv", "fallback.csv"]);
    assert!(Config::load(&cli).is_err());

    let (config, error) = Config::load_or_default(&cli);
    assert!(error.is_some());
    assert_eq!(config.interval_seconds, 10);
    assert_eq!(config.applications.len(), 5);
    assert_eq!(config.sink.path, PathBuf::from("fallback.csv"));
}
