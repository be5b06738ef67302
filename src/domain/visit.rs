//! Visit lifecycle data model
//!
//! Three stages, owned by different components:
//! - [`VisitState`] - live debounce state, owned by the state machine
//! - [`VisitRecord`] - immutable finalized visit, written by the finalizer,
//!   read-only input to the aggregator
//! - [`TrafficBucket`] - fixed-window arrival counter, owned by the aggregator

use crate::domain::types::{Coord, VesselId};
use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Evidence counters carried alongside the hit counts, for audit only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// Observations with the moored navigational status
    pub status_hits: u32,
    /// Observations below the slow-SOG threshold
    pub slow_hits: u32,
}

/// Live debounce state for one vessel in one geofencing domain.
///
/// At most one exists per (vessel, domain). Absence of a record is the
/// outside/idle state; `in_confirmed = false` is Tentative, `true` is
/// Confirmed. Destroyed the instant a visit finalizes or a tentative
/// candidacy is judged to be noise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitState {
    pub vessel: VesselId,
    /// Candidate area this vessel is being tracked against
    pub area_name: String,
    /// Candidate entry time (first inside observation of this candidacy)
    pub entered_at: DateTime<Utc>,
    pub last_seen_ts: DateTime<Utc>,
    pub first_coord: Coord,
    pub last_coord: Coord,
    pub in_confirmed: bool,
    pub inside_hits: u32,
    pub outside_hits: u32,
    pub evidence: Evidence,
}

/// A confirmed visit the state machine has judged complete.
///
/// Handed to the finalizer together with the exit evidence taken from the
/// observation that triggered the exit decision.
#[derive(Debug, Clone)]
pub struct CompletedVisit {
    pub state: VisitState,
    pub exit_ts: DateTime<Utc>,
    pub exit_coord: Coord,
}

/// Immutable record of one finalized visit, keyed by a deterministic id so
/// reprocessing the same entry can never create a duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub id: String,
    pub vessel: VesselId,
    pub area_name: String,
    pub entry_ts: DateTime<Utc>,
    pub exit_ts: DateTime<Utc>,
    /// Rounded whole minutes, clamped to >= 0
    pub duration_min: i64,
    /// Provenance of detection
    pub entry_method: String,
    pub first_coord: Coord,
    pub last_coord: Coord,
    /// None until the aggregator folds this record into a traffic bucket,
    /// then the bucket's window start. The null marker is the aggregator's
    /// exactly-once gate.
    pub aggregated_window: Option<DateTime<Utc>>,
}

/// Fixed-window arrival counter for one area. Unique per (area, window
/// start); only ever incremented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficBucket {
    pub area_name: String,
    pub window_start: DateTime<Utc>,
    pub arrivals: u64,
}

/// URL/file-safe deterministic slug: lowercase, runs of non-alphanumerics
/// collapsed to single hyphens.
pub fn slug(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_hyphen = false;
    for c in s.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    if out.is_empty() {
        "unknown-area".to_string()
    } else {
        out
    }
}

/// Deterministic visit record id: `{prefix}_{vessel}_{slug(area)}_{entry RFC3339 Z}`.
///
/// Stable across re-runs, so an upsert by this id makes reprocessing the
/// same entry idempotent.
pub fn deterministic_visit_id(
    prefix: &str,
    vessel: VesselId,
    area_name: &str,
    entry_ts: DateTime<Utc>,
) -> String {
    format!(
        "{}_{}_{}_{}",
        prefix,
        vessel,
        slug(area_name),
        entry_ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    )
}

/// Whole minutes from `a` to `b`, rounded to nearest
pub fn minutes_between(a: DateTime<Utc>, b: DateTime<Utc>) -> i64 {
    ((b - a).num_seconds() as f64 / 60.0).round() as i64
}

/// Floor a timestamp to the start of its day-aligned window of
/// `window_hours` (e.g. 6h windows start at 00:00, 06:00, 12:00, 18:00 UTC)
pub fn floor_to_window(ts: DateTime<Utc>, window_hours: u32) -> DateTime<Utc> {
    let window_hours = window_hours.clamp(1, 24);
    let h = (ts.hour() / window_hours) * window_hours;
    match ts.date_naive().and_hms_opt(h, 0, 0) {
        Some(dt) => dt.and_utc(),
        None => ts,
    }
}
