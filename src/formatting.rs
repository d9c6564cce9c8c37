// src/formatting.rs

//! Display formatting for dashboard values.
//!
//! A value that was never recorded renders as [`NOT_AVAILABLE`]; a value that
//! is present but cannot be interpreted renders as [`FORMAT_ERROR`].

use chrono::{DateTime, Utc};

pub const NOT_AVAILABLE: &str = "N/A";
pub const FORMAT_ERROR: &str = "Error";

fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|v| !v.is_empty())
}

fn format_number(raw: Option<&str>, render: impl Fn(f64) -> String) -> String {
    let Some(raw) = present(raw) else {
        return NOT_AVAILABLE.to_string();
    };
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => render(value),
        _ => FORMAT_ERROR.to_string(),
    }
}

/// A utilization gauge, e.g. `42.5%`.
pub fn format_percent(raw: Option<&str>) -> String {
    format_number(raw, |v| format!("{v:.1}%"))
}

/// A throughput, e.g. `12.34 Mbps`.
pub fn format_rate(raw: Option<&str>) -> String {
    format_number(raw, |v| format!("{v:.2} Mbps"))
}

/// A byte counter scaled to a readable unit.
pub fn format_bytes(raw: Option<&str>) -> String {
    format_number(raw, |v| {
        const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
        let mut value = v;
        let mut unit = 0;
        while value >= 1024.0 && unit < UNITS.len() - 1 {
            value /= 1024.0;
            unit += 1;
        }
        if unit == 0 {
            format!("{value:.0} {}", UNITS[unit])
        } else {
            format!("{value:.2} {}", UNITS[unit])
        }
    })
}

pub fn format_text(raw: Option<&str>) -> String {
    present(raw).unwrap_or(NOT_AVAILABLE).to_string()
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}
