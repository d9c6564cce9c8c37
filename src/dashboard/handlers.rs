use super::export::{build_workbook, export_filename};
use super::{page, DashboardState};
use crate::alerts::{evaluate_sample, Alert};
use crate::formatting::{
    format_bytes, format_percent, format_rate, format_text, format_timestamp,
};
use crate::sink::*;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Json, Response};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

type AppState = State<Arc<DashboardState>>;

/// Series plotted when the request does not name any.
pub const DEFAULT_HISTORY_FIELDS: [&str; 5] = [COL_CPU, COL_MEMORY, COL_DISK, COL_UPLOAD, COL_DOWNLOAD];

fn no_data(host: &str) -> Response {
    (StatusCode::NOT_FOUND, format!("no data for host {host}")).into_response()
}

/// GET / - the dashboard page.
pub async fn index(State(state): AppState) -> Html<String> {
    Html(page::render(
        state.refresh_seconds,
        state.history_window.as_secs(),
    ))
}

/// GET /api/hosts
pub async fn hosts(State(state): AppState) -> Json<Vec<String>> {
    Json(state.store.hosts().await)
}

/// Latest values formatted for display, plus raw gauge values for the dials.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct LatestView {
    pub host: String,
    pub timestamp: String,
    pub cpu: String,
    pub memory: String,
    pub disk: String,
    pub upload: String,
    pub download: String,
    pub bytes_sent: String,
    pub bytes_received: String,
    pub speed_test_upload: String,
    pub speed_test_download: String,
    pub local_ip: String,
    pub public_ip: String,
    pub gauges: BTreeMap<String, Option<f64>>,
}

impl LatestView {
    fn from_record(host: &str, record: &Record) -> Self {
        let gauges = [COL_CPU, COL_MEMORY, COL_DISK]
            .iter()
            .map(|col| {
                let value = record.get(col).and_then(|v| v.parse().ok());
                (col.to_string(), value)
            })
            .collect();
        Self {
            host: host.to_string(),
            timestamp: format_timestamp(&record.timestamp),
            cpu: format_percent(record.get(COL_CPU)),
            memory: format_percent(record.get(COL_MEMORY)),
            disk: format_percent(record.get(COL_DISK)),
            upload: format_rate(record.get(COL_UPLOAD)),
            download: format_rate(record.get(COL_DOWNLOAD)),
            bytes_sent: format_bytes(record.get(COL_BYTES_SENT)),
            bytes_received: format_bytes(record.get(COL_BYTES_RECV)),
            speed_test_upload: format_rate(record.get(COL_SPEEDTEST_UPLOAD)),
            speed_test_download: format_rate(record.get(COL_SPEEDTEST_DOWNLOAD)),
            local_ip: format_text(record.get(COL_LOCAL_IP)),
            public_ip: format_text(record.get(COL_PUBLIC_IP)),
            gauges,
        }
    }
}

/// GET /api/hosts/{host}/latest
pub async fn latest(State(state): AppState, Path(host): Path<String>) -> Response {
    match state.store.latest_record(&host).await {
        Some(record) => Json(LatestView::from_record(&host, &record)).into_response(),
        None => no_data(&host),
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Window in seconds.
    pub window: Option<u64>,
    /// Comma separated column names.
    pub fields: Option<String>,
}

/// Chart series: one timestamp axis and one value list per field.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct HistorySeries {
    pub timestamps: Vec<DateTime<Utc>>,
    pub series: BTreeMap<String, Vec<Option<f64>>>,
}

impl HistorySeries {
    fn from_rows(rows: Vec<HistoryRow>) -> Self {
        let mut out = HistorySeries::default();
        // Short rows may lack fields, so every row contributes its columns.
        let fields: BTreeSet<String> = rows
            .iter()
            .flat_map(|r| r.values.keys().cloned())
            .collect();
        for row in rows {
            out.timestamps.push(row.timestamp);
            for field in &fields {
                let value = row.values.get(field).and_then(|v| v.trim().parse().ok());
                out.series.entry(field.clone()).or_default().push(value);
            }
        }
        out
    }
}

/// GET /api/hosts/{host}/history?window=SECS&fields=a,b
pub async fn history(
    State(state): AppState,
    Path(host): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Json<HistorySeries> {
    let window = query
        .window
        .map(Duration::from_secs)
        .unwrap_or(state.history_window);
    let requested: Vec<&str> = match query.fields.as_deref() {
        Some(fields) => fields
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .collect(),
        None => DEFAULT_HISTORY_FIELDS.to_vec(),
    };
    let rows = state.store.history(&host, window, &requested).await;
    debug!(%host, rows = rows.len(), "Serving history");
    Json(HistorySeries::from_rows(rows))
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ServiceView {
    pub name: String,
    pub status: String,
    pub running: bool,
}

/// GET /api/hosts/{host}/services
pub async fn services(State(state): AppState, Path(host): Path<String>) -> Response {
    let Some(record) = state.store.latest_record(&host).await else {
        return no_data(&host);
    };
    let views: Vec<ServiceView> = record
        .statuses()
        .into_iter()
        .map(|(name, status)| ServiceView {
            name,
            status: status.to_string(),
            running: status.is_running(),
        })
        .collect();
    Json(views).into_response()
}

/// GET /api/hosts/{host}/alerts
pub async fn alerts(State(state): AppState, Path(host): Path<String>) -> Json<Vec<Alert>> {
    let Some(latest) = state.store.latest(&host).await else {
        return Json(Vec::new());
    };
    let previous = state.store.previous(&host).await;
    let alerts = evaluate_sample(&latest, previous.as_ref(), &state.thresholds);
    if alerts.is_empty() {
        debug!(%host, "No active alerts");
    }
    Json(alerts)
}

/// GET /api/hosts/{host}/export
pub async fn export(State(state): AppState, Path(host): Path<String>) -> Response {
    let Some(record) = state.store.latest_record(&host).await else {
        warn!(%host, "Export requested for a host without data");
        return no_data(&host);
    };
    let filename = export_filename(&host, Local::now());

    match tokio::task::spawn_blocking(move || build_workbook(&record)).await {
        Ok(Ok(bytes)) => (
            StatusCode::OK,
            [
                (
                    header::CONTENT_TYPE,
                    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
                ),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{filename}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Ok(Err(e)) => {
            error!(error = %e, "Building export workbook");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(e) => {
            error!(error = %e, "Export task panicked");
            (StatusCode::INTERNAL_SERVER_ERROR, "task failed").into_response()
        }
    }
}
