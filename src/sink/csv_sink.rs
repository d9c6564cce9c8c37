//! Appends samples to a CSV file.

use super::{header_for, sample_fields, SinkError};
use crate::core::{Sample, Sink};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Append-only CSV sink.
///
/// A header is written when the file is new or empty. When the file already
/// has a header, every row is laid out according to that header: columns the
/// sample lacks are left empty and fields the header lacks are dropped, so the
/// table never becomes ragged when the application registry changes.
pub struct CsvSink {
    path: PathBuf,
    header: Mutex<Option<Vec<String>>>,
    warned_dropped: AtomicBool,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            header: Mutex::new(None),
            warned_dropped: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_existing_header(&self) -> Result<Vec<String>, SinkError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)?;
        Ok(reader.headers()?.iter().map(str::to_string).collect())
    }

    fn open(&self) -> Result<File, SinkError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(OpenOptions::new().create(true).append(true).open(&self.path)?)
    }
}

impl Sink for CsvSink {
    fn name(&self) -> &str {
        "csv"
    }

    fn append(&self, sample: &Sample) -> Result<(), SinkError> {
        let file = self.open()?;
        let is_empty = file.metadata()?.len() == 0;

        // After a panic mid-append the cached header is discarded and re-read.
        let mut cached = self.header.lock().unwrap_or_else(|poisoned| {
            warn!(path = %self.path.display(), "CSV header cache was poisoned, re-reading header");
            self.header.clear_poison();
            let mut guard = poisoned.into_inner();
            *guard = None;
            guard
        });
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        let header = if is_empty {
            let header = header_for(sample.application_status.keys());
            writer.write_record(&header)?;
            info!(path = %self.path.display(), columns = header.len(), "Created CSV table");
            cached.insert(header)
        } else {
            let header = match cached.take() {
                Some(header) => header,
                None => {
                    let header = self.read_existing_header()?;
                    debug!(path = %self.path.display(), ?header, "Appending to existing CSV table");
                    header
                }
            };
            cached.insert(header)
        };

        let mut fields = sample_fields(sample);
        let row: Vec<String> = header
            .iter()
            .map(|column| fields.remove(column).unwrap_or_default())
            .collect();
        if !fields.is_empty() && !self.warned_dropped.swap(true, Ordering::Relaxed) {
            warn!(
                path = %self.path.display(),
                dropped = ?fields.keys().collect::<Vec<_>>(),
                "CSV header lacks columns for some fields, they are not persisted"
            );
        }

        writer.write_record(&row)?;
        writer.flush()?;
        debug!(timestamp = %sample.timestamp, "Sample written to CSV");
        Ok(())
    }
}
