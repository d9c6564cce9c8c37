//! # Dashboard
//!
//! An `axum` server over the CSV table. The page at `/` polls the JSON API on
//! its own timer; nothing here talks to the collector directly.

pub mod export;
pub mod handlers;
pub mod page;

use crate::config::{DashboardConfig, ThresholdConfig};
use crate::sink::SampleStore;
use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, trace};

/// State shared by all handlers.
pub struct DashboardState {
    pub store: SampleStore,
    pub thresholds: ThresholdConfig,
    pub refresh_seconds: u64,
    pub history_window: Duration,
}

impl DashboardState {
    pub fn new(config: &DashboardConfig, csv_path: &Path) -> Self {
        Self {
            store: SampleStore::new(csv_path, Duration::from_secs(config.cache_seconds)),
            thresholds: config.thresholds,
            refresh_seconds: config.refresh_seconds.max(1),
            history_window: Duration::from_secs(config.history_window_seconds),
        }
    }
}

/// All dashboard routes.
pub fn router(state: Arc<DashboardState>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/hosts", get(handlers::hosts))
        .route("/api/hosts/{host}/latest", get(handlers::latest))
        .route("/api/hosts/{host}/history", get(handlers::history))
        .route("/api/hosts/{host}/services", get(handlers::services))
        .route("/api/hosts/{host}/alerts", get(handlers::alerts))
        .route("/api/hosts/{host}/export", get(handlers::export))
        .with_state(state)
}

pub struct DashboardServer {
    listener: TcpListener,
    router: Router,
    shutdown_rx: watch::Receiver<bool>,
}

impl DashboardServer {
    /// Binds the listener. Port 0 picks a free port; see the returned address.
    pub async fn bind(
        address: SocketAddr,
        state: DashboardState,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(Self, SocketAddr)> {
        let listener = TcpListener::bind(address)
            .await
            .with_context(|| format!("listening on {address}"))?;
        let local_addr = listener.local_addr().context("getting local address")?;
        let server = Self {
            listener,
            router: router(Arc::new(state)),
            shutdown_rx,
        };
        Ok((server, local_addr))
    }

    /// Returns a future that serves until the shutdown signal.
    pub fn run(self) -> impl Future<Output = ()> {
        let Self {
            listener,
            router,
            mut shutdown_rx,
        } = self;

        async move {
            if let Ok(addr) = listener.local_addr() {
                info!(%addr, "Dashboard listening");
            }
            let shutdown = async move {
                let _ = shutdown_rx.changed().await;
                trace!("Dashboard received shutdown signal.");
            };
            if let Err(e) = axum::serve(listener, router.into_make_service())
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(error = %e, "Dashboard server error");
            }
            trace!("Dashboard task finished.");
        }
    }
}
