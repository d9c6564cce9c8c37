//! Spreadsheet snapshot of a host's most recent sample.
//!
//! Three sheets, each a header row over a single value row: "System Metrics",
//! "Services Status" and "Network Info".

use crate::formatting::NOT_AVAILABLE;
use crate::sink::*;
use chrono::{DateTime, Local};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

pub const SYSTEM_METRICS_SHEET: &str = "System Metrics";
pub const SERVICES_SHEET: &str = "Services Status";
pub const NETWORK_SHEET: &str = "Network Info";

const METRIC_COLUMNS: [&str; 11] = [
    COL_TIMESTAMP,
    COL_HOST,
    COL_CPU,
    COL_MEMORY,
    COL_DISK,
    COL_BYTES_SENT,
    COL_BYTES_RECV,
    COL_UPLOAD,
    COL_DOWNLOAD,
    COL_SPEEDTEST_UPLOAD,
    COL_SPEEDTEST_DOWNLOAD,
];

/// `hostwatch_<host>_<YYYYmmdd_HHMMSS>.xlsx`, with characters that are unsafe
/// in a file name replaced.
pub fn export_filename(host: &str, now: DateTime<Local>) -> String {
    let host: String = host
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect();
    format!("hostwatch_{}_{}.xlsx", host, now.format("%Y%m%d_%H%M%S"))
}

fn write_table(
    sheet: &mut Worksheet,
    header: &Format,
    cells: &[(String, Option<String>)],
) -> Result<(), XlsxError> {
    for (col, (name, value)) in cells.iter().enumerate() {
        let col = col as u16;
        sheet.write_string_with_format(0, col, name.as_str(), header)?;
        match value.as_deref() {
            Some(v) => match v.parse::<f64>() {
                Ok(number) if number.is_finite() => sheet.write_number(1, col, number)?,
                _ => sheet.write_string(1, col, v)?,
            },
            None => sheet.write_string(1, col, NOT_AVAILABLE)?,
        };
        sheet.set_column_width(col, (name.len().max(12) + 2) as f64)?;
    }
    Ok(())
}

/// Builds the workbook for `record` and returns the file bytes.
pub fn build_workbook(record: &Record) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let metrics: Vec<(String, Option<String>)> = METRIC_COLUMNS
        .iter()
        .map(|col| {
            let value = if *col == COL_TIMESTAMP {
                Some(format_timestamp(&record.timestamp))
            } else {
                record.get(col).map(str::to_string)
            };
            (col.to_string(), value)
        })
        .collect();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SYSTEM_METRICS_SHEET)?;
    write_table(sheet, &header, &metrics)?;

    // Raw cells, so a recorded "Unknown" is exported as written.
    let services: Vec<(String, Option<String>)> = record
        .fields
        .iter()
        .filter_map(|(column, value)| {
            let name = application_from_column(column)?;
            Some((name.to_string(), Some(value.clone()).filter(|v| !v.is_empty())))
        })
        .collect();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SERVICES_SHEET)?;
    write_table(sheet, &header, &services)?;

    let network: Vec<(String, Option<String>)> = [COL_LOCAL_IP, COL_PUBLIC_IP]
        .iter()
        .map(|col| (col.to_string(), record.get(col).map(str::to_string)))
        .collect();
    let sheet = workbook.add_worksheet();
    sheet.set_name(NETWORK_SHEET)?;
    write_table(sheet, &header, &network)?;

    workbook.save_to_buffer()
}
