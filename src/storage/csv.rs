//! Append-only CSV storage.
use crate::core::{FieldSet, Storage, TagSet};
use crate::error::MeterError;
use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Appends one row per write to a CSV file.
///
/// The header `timestamp,measurement,<tag keys>,<field keys>` is written only when
/// the file does not exist yet, so it reflects the key set of the first write.
/// Later rows are appended as-is in their own key order; the header is never
/// re-derived, and a write with a different key set will not line up with it.
///
/// Appends are serialised, so processors sharing one storage never interleave
/// rows or write the header twice.
#[derive(Debug)]
pub struct CsvStorage {
    path: PathBuf,
    append: Mutex<()>,
}

impl CsvStorage {
    /// Storage appending to `path`. The file is created on the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append: Mutex::new(()),
        }
    }

    /// Target file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn storage_error(&self, e: impl std::fmt::Display) -> MeterError {
        MeterError::Storage(format!("CSV write to '{}' failed: {}", self.path.display(), e))
    }
}

impl Storage for CsvStorage {
    fn write(
        &self,
        measurement: &str,
        tags: &TagSet,
        fields: &FieldSet,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<(), MeterError> {
        let timestamp = timestamp.unwrap_or_else(Utc::now);
        let _guard = self
            .append
            .lock()
            .map_err(|_| self.storage_error("append lock poisoned"))?;
        let write_header = !self.path.exists();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.storage_error(e))?;
        let mut writer = csv::Writer::from_writer(file);

        if write_header {
            let header = ["timestamp", "measurement"]
                .into_iter()
                .chain(tags.keys().map(String::as_str))
                .chain(fields.keys().map(String::as_str));
            writer
                .write_record(header)
                .map_err(|e| self.storage_error(e))?;
        }

        let mut row = vec![timestamp.to_rfc3339(), measurement.to_string()];
        row.extend(tags.values().cloned());
        row.extend(fields.values().map(ToString::to_string));
        writer.write_record(&row).map_err(|e| self.storage_error(e))?;
        writer.flush().map_err(|e| self.storage_error(e))?;

        debug!(path = %self.path.display(), measurement, header = write_header, "csv write");
        Ok(())
    }
}
