//! Observation source - recency-window and historical scans
//!
//! The transport that fills the source (AIS websocket, message queue) is an
//! external collaborator; this module only defines the scan contract the
//! drivers need, an in-memory implementation, and a JSONL file loader for
//! replay and backfill runs.

use crate::domain::error::EngineError;
use crate::domain::types::RawPosition;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// Queryable source of raw position reports
pub trait ObservationSource {
    /// Reports newer than `since`, in feed order, capped at `limit`
    fn recent(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<RawPosition>, EngineError>;

    /// The full history ordered by (vessel, timestamp), for backfill
    fn history(&self) -> Result<Vec<RawPosition>, EngineError>;
}

/// In-memory observation source
#[derive(Default)]
pub struct MemoryPositions {
    positions: RwLock<Vec<RawPosition>>,
}

impl MemoryPositions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load one report per line from a JSONL file. Unparseable lines are
    /// counted and skipped, not fatal; a missing file is fatal.
    pub fn from_jsonl_file<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let source = Self::new();
        let mut skipped = 0usize;
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RawPosition>(&line) {
                Ok(raw) => source.push(raw),
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!(file = %path.display(), skipped = %skipped, "positions_lines_skipped");
        }
        info!(
            file = %path.display(),
            loaded = %source.len(),
            "positions_loaded"
        );
        Ok(source)
    }

    pub fn push(&self, raw: RawPosition) {
        self.positions.write().push(raw);
    }

    pub fn len(&self) -> usize {
        self.positions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.read().is_empty()
    }
}

impl ObservationSource for MemoryPositions {
    fn recent(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<RawPosition>, EngineError> {
        // Reports without a timestamp cannot match a recency filter
        Ok(self
            .positions
            .read()
            .iter()
            .filter(|raw| raw.timestamp_utc.is_some_and(|ts| ts >= since))
            .take(limit)
            .cloned()
            .collect())
    }

    fn history(&self) -> Result<Vec<RawPosition>, EngineError> {
        let mut out: Vec<RawPosition> = self.positions.read().clone();
        out.sort_by_key(|raw| {
            (
                raw.mmsi.unwrap_or(i64::MAX),
                raw.timestamp_utc.map(|ts| ts.timestamp_millis()).unwrap_or(i64::MAX),
            )
        });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn line(vessel: i64, ts: &str) -> String {
        format!(
            r#"{{"mmsi": {vessel}, "timestamp_utc": "{ts}", "coordinates": {{"type": "Point", "coordinates": [0.0, 51.5]}}}}"#
        )
    }

    #[test]
    fn test_from_jsonl_skips_bad_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", line(1, "2024-03-01T09:00:00Z")).unwrap();
        writeln!(file, "not json at all").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "{}", line(2, "2024-03-01T09:01:00Z")).unwrap();
        file.flush().unwrap();

        let source = MemoryPositions::from_jsonl_file(file.path()).unwrap();
        assert_eq!(source.len(), 2);
    }

    #[test]
    fn test_from_jsonl_missing_file_is_fatal() {
        assert!(MemoryPositions::from_jsonl_file("/nonexistent/positions.jsonl").is_err());
    }

    #[test]
    fn test_recent_filters_by_window_and_limit() {
        let source = MemoryPositions::new();
        source.push(serde_json::from_str(&line(1, "2024-03-01T09:00:00Z")).unwrap());
        source.push(serde_json::from_str(&line(2, "2024-03-01T10:00:00Z")).unwrap());
        source.push(serde_json::from_str(&line(3, "2024-03-01T10:05:00Z")).unwrap());

        let since = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let recent = source.recent(since, 10).unwrap();
        assert_eq!(recent.len(), 2);

        let capped = source.recent(since, 1).unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[test]
    fn test_recent_excludes_reports_without_timestamp() {
        let source = MemoryPositions::new();
        source.push(
            serde_json::from_str(
                r#"{"mmsi": 1, "coordinates": {"type": "Point", "coordinates": [0.0, 51.5]}}"#,
            )
            .unwrap(),
        );
        let since = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        assert!(source.recent(since, 10).unwrap().is_empty());
    }

    #[test]
    fn test_history_orders_by_vessel_then_time() {
        let source = MemoryPositions::new();
        source.push(serde_json::from_str(&line(2, "2024-03-01T09:00:00Z")).unwrap());
        source.push(serde_json::from_str(&line(1, "2024-03-01T10:00:00Z")).unwrap());
        source.push(serde_json::from_str(&line(1, "2024-03-01T09:00:00Z")).unwrap());

        let ordered = source.history().unwrap();
        let keys: Vec<(i64, i64)> = ordered
            .iter()
            .map(|r| (r.mmsi.unwrap(), r.timestamp_utc.unwrap().timestamp()))
            .collect();
        assert!(keys.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(keys[0].0, 1);
    }
}
