//! Visit record export - writes finalized visits to file
//!
//! Records are written in JSONL format (one JSON object per line) to the
//! file specified in config, so every run leaves an inspectable artifact
//! for downstream tooling.

use crate::domain::visit::VisitRecord;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, error, info};

/// Export writer for finalized visit records
pub struct RecordExport {
    file_path: String,
}

impl RecordExport {
    pub fn new(file_path: &str) -> Self {
        info!(file_path = %file_path, "export_initialized");
        Self { file_path: file_path.to_string() }
    }

    /// Write a single record to the export file
    /// Returns true if successful, false otherwise
    pub fn write_record(&self, record: &VisitRecord) -> bool {
        let json = match serde_json::to_string(record) {
            Ok(json) => json,
            Err(e) => {
                error!(id = %record.id, error = %e, "record_serialize_failed");
                return false;
            }
        };

        match self.append_line(&json) {
            Ok(()) => {
                debug!(
                    id = %record.id,
                    area = %record.area_name,
                    duration_min = %record.duration_min,
                    "record_exported"
                );
                true
            }
            Err(e) => {
                error!(id = %record.id, error = %e, "record_export_failed");
                false
            }
        }
    }

    /// Append a line to the export file
    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let path = Path::new(&self.file_path);

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Write multiple records, returning the success count
    pub fn write_records(&self, records: &[VisitRecord]) -> usize {
        let mut success_count = 0;
        for record in records {
            if self.write_record(record) {
                success_count += 1;
            }
        }
        success_count
    }
}
