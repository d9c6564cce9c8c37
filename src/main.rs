//! HostWatch - single-host resource and application health monitor.

use anyhow::Result;
use clap::Parser;
use hostwatch::{
    app::App,
    cli::{Cli, Command},
    config::Config,
    logging::init_logging,
};
use tokio::sync::watch;
use tracing::{error, info, warn};

fn log_config(config: &Config, mode: Command) {
    info!("-------------------- Configuration --------------------");
    info!("Mode: {:?}", mode);
    info!("Log Level: {}", config.effective_log_level());
    info!("Collection Interval: {}s", config.interval_seconds);
    info!("CSV Table: {}", config.sink.path.display());
    info!("Disk Path: {}", config.sink.disk_path.display());
    for (name, app) in &config.applications {
        info!("Application: {} (process '{}', port {})", name, app.process_name, app.port);
    }
    info!(
        "Thresholds: CPU {}%, Memory {}%, Disk {}%",
        config.thresholds.cpu_percent, config.thresholds.memory_percent, config.thresholds.disk_percent
    );
    info!("Public IP Service: {}", config.network.public_ip_url);
    if config.speed_test.enabled {
        info!("Speed Test: every {}s", config.speed_test.interval_seconds);
    } else {
        info!("Speed Test: Disabled");
    }
    if mode == Command::Dashboard {
        info!("Dashboard Address: {}", config.dashboard.listen_address);
        info!("Dashboard Refresh: {}s", config.dashboard.refresh_seconds);
    }
    if config.metrics.enabled {
        info!("Metrics Address: {}", config.metrics.listen_address);
    }
    info!("-------------------------------------------------------");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mode = cli.command.unwrap_or(Command::Collect);

    let (config, load_error) = Config::load_or_default(&cli);

    let _guards = init_logging(&config, "hostwatch")?;
    if let Some(e) = load_error {
        warn!(error = %e, "Failed to load configuration, using built-in defaults");
    }
    info!("HostWatch starting up...");
    log_config(&config, mode);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = App::builder(config, mode).build(shutdown_rx).await?;

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            return;
        }
        info!("Shutdown signal received. Shutting down gracefully...");
        let _ = shutdown_tx.send(true);
    });

    app.run().await?;
    info!("Exiting.");
    Ok(())
}
