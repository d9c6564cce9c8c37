//! The main application logic, decoupled from the entry point.

use crate::{
    cli::Command,
    collector::{Collector, CollectorParts},
    config::Config,
    dashboard::{DashboardServer, DashboardState},
    internal_metrics::{Metrics, MetricsBuilder},
    task_manager::TaskManager,
};
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{watch, Barrier};
use tracing::{debug, info, instrument};

/// A handle to the running application.
pub struct App {
    task_manager: TaskManager,
    metrics_addr: Option<SocketAddr>,
    dashboard_addr: Option<SocketAddr>,
    startup_barrier: Option<Arc<Barrier>>,
}

impl App {
    pub fn builder(config: Config, mode: Command) -> AppBuilder {
        AppBuilder::new(config, mode)
    }

    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_addr
    }

    /// The bound dashboard address, in dashboard mode.
    pub fn dashboard_addr(&self) -> Option<SocketAddr> {
        self.dashboard_addr
    }

    /// Waits for the shutdown signal and then for every task to finish.
    pub async fn run(self) -> Result<()> {
        if let Some(barrier) = &self.startup_barrier {
            barrier.wait().await;
        }

        let mut shutdown_rx = self.task_manager.get_shutdown_rx();
        shutdown_rx.changed().await.ok();
        info!("Shutdown signal received. Waiting for tasks to complete...");

        self.task_manager.shutdown().await;
        info!("All tasks shut down.");
        Ok(())
    }
}

/// Builder for the application, with overrides for tests.
pub struct AppBuilder {
    config: Config,
    mode: Command,
    collector_parts_override: Option<CollectorParts>,
    metrics_override: Option<Metrics>,
    startup_barrier: Option<Arc<Barrier>>,
}

impl AppBuilder {
    pub fn new(config: Config, mode: Command) -> Self {
        Self {
            config,
            mode,
            collector_parts_override: None,
            metrics_override: None,
            startup_barrier: None,
        }
    }

    /// Replaces the OS and network collaborators of the collector.
    pub fn collector_parts_override(mut self, parts: CollectorParts) -> Self {
        self.collector_parts_override = Some(parts);
        self
    }

    pub fn metrics_override(mut self, metrics: Metrics) -> Self {
        self.metrics_override = Some(metrics);
        self
    }

    pub fn startup_barrier(mut self, barrier: Arc<Barrier>) -> Self {
        self.startup_barrier = Some(barrier);
        self
    }

    /// Builds every component for the selected mode and spawns its tasks.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;
        let task_manager = TaskManager::new(shutdown_rx);

        let (metrics, metrics_server_info) = match self.metrics_override {
            Some(m) => (m, None),
            None => MetricsBuilder::new(config.metrics.clone()).build(&task_manager),
        };
        let metrics_addr = if let Some((server, addr)) = metrics_server_info {
            info!(%addr, "Metrics server listening");
            task_manager.spawn("MetricsServer", server.run());
            Some(addr)
        } else {
            None
        };

        let mut dashboard_addr = None;
        match self.mode {
            Command::Collect => {
                let parts = match self.collector_parts_override {
                    Some(parts) => parts,
                    None => CollectorParts::from_config(&config)?,
                };
                let collector = Collector::new(&config, parts, metrics);
                debug!(interval = ?collector.interval(), "Collector built");
                task_manager.spawn("Collector", collector.run(task_manager.get_shutdown_rx()));
            }
            Command::Dashboard => {
                let state = DashboardState::new(&config.dashboard, &config.sink.path);
                let (server, addr) = DashboardServer::bind(
                    config.dashboard.listen_address,
                    state,
                    task_manager.get_shutdown_rx(),
                )
                .await?;
                task_manager.spawn("Dashboard", server.run());
                dashboard_addr = Some(addr);
            }
        }

        Ok(App {
            task_manager,
            metrics_addr,
            dashboard_addr,
            startup_barrier: self.startup_barrier,
        })
    }
}
