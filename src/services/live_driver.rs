//! Live driver - incremental pass over a sliding recent window
//!
//! Each invocation is a bounded batch job: scan observations newer than the
//! recency window, process them per vessel in timestamp order, persist the
//! resulting states, and return. Live state bridges across invocations
//! through the [`VisitStateStore`], so the same observation being scanned
//! by two overlapping windows only adds redundant corroborating hits.

use crate::domain::error::EngineError;
use crate::domain::types::Observation;
use crate::domain::visit::VisitRecord;
use crate::infra::metrics::Metrics;
use crate::io::positions::ObservationSource;
use crate::io::store::{VisitRecordStore, VisitStateStore};
use crate::services::finalizer::VisitFinalizer;
use crate::services::geofence::{DomainSpec, GeofenceIndex};
use crate::services::state_machine::{step, Classification, DebounceParams, Transition};
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Outcome counts of one driver pass
#[derive(Debug, Default)]
pub struct PassSummary {
    /// Raw reports returned by the window scan
    pub scanned: usize,
    /// Observations fed through the state machine
    pub processed: usize,
    /// Reports skipped for missing/invalid fields
    pub malformed: usize,
    /// Observations dropped after a persistent write conflict
    pub dropped: usize,
    /// Records finalized during this pass
    pub finalized: Vec<VisitRecord>,
}

/// Scheduled incremental visit detection for one geofencing domain
pub struct LiveDriver<'a> {
    domain: &'a DomainSpec,
    index: &'a GeofenceIndex,
    params: DebounceParams,
    states: &'a dyn VisitStateStore,
    records: &'a dyn VisitRecordStore,
    metrics: &'a Metrics,
    recent_window: Duration,
    scan_limit: usize,
}

impl<'a> LiveDriver<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        domain: &'a DomainSpec,
        index: &'a GeofenceIndex,
        params: DebounceParams,
        states: &'a dyn VisitStateStore,
        records: &'a dyn VisitRecordStore,
        metrics: &'a Metrics,
        recent_minutes: i64,
        scan_limit: usize,
    ) -> Self {
        Self {
            domain,
            index,
            params,
            states,
            records,
            metrics,
            recent_window: Duration::minutes(recent_minutes),
            scan_limit,
        }
    }

    /// One bounded pass. Infrastructure failures (window scan, store
    /// writes other than conflicts) abort the pass cleanly; the scheduler
    /// simply retries on the next interval.
    pub fn run_once(
        &self,
        source: &dyn ObservationSource,
        now: DateTime<Utc>,
    ) -> anyhow::Result<PassSummary> {
        let since = now - self.recent_window;
        let raws = source
            .recent(since, self.scan_limit)
            .with_context(|| format!("scanning recent observations for {}", self.domain.name))?;

        let mut summary = PassSummary { scanned: raws.len(), ..Default::default() };

        // Per-vessel timestamp order is required; ordering across vessels
        // is irrelevant.
        let mut by_vessel: BTreeMap<i64, Vec<Observation>> = BTreeMap::new();
        for raw in raws {
            match raw.into_observation(now) {
                Ok(obs) => by_vessel.entry(obs.vessel.0).or_default().push(obs),
                Err(_) => {
                    summary.malformed += 1;
                    self.metrics.record_malformed();
                }
            }
        }

        let finalizer = VisitFinalizer::new(self.domain, self.records, self.metrics)
            .with_state_store(self.states);

        for observations in by_vessel.values_mut() {
            observations.sort_by_key(|o| o.ts);
            for obs in observations.iter() {
                let class = match self.index.resolve(obs.coord, &self.domain.selector) {
                    Some(feature) => Classification::Inside(&feature.name),
                    None => Classification::Outside,
                };
                self.apply_with_retry(&finalizer, obs, class, &mut summary)?;
                summary.processed += 1;
                self.metrics.record_observation();
            }
        }

        info!(
            domain = %self.domain.name,
            scanned = %summary.scanned,
            processed = %summary.processed,
            malformed = %summary.malformed,
            dropped = %summary.dropped,
            finalized = %summary.finalized.len(),
            "live_pass_complete"
        );
        Ok(summary)
    }

    /// Read-modify-write for one observation, retried once with fresh state
    /// on a version conflict. A second conflict drops the observation for
    /// this pass; subsequent observations re-establish correct state.
    fn apply_with_retry(
        &self,
        finalizer: &VisitFinalizer<'_>,
        obs: &Observation,
        class: Classification<'_>,
        summary: &mut PassSummary,
    ) -> anyhow::Result<()> {
        for attempt in 0..2 {
            match self.apply_once(finalizer, obs, class, summary) {
                Ok(()) => return Ok(()),
                Err(EngineError::StoreConflict(vessel)) => {
                    self.metrics.record_store_conflict();
                    if attempt == 1 {
                        warn!(
                            domain = %self.domain.name,
                            vessel = %vessel,
                            "observation_dropped_after_conflict"
                        );
                        summary.dropped += 1;
                        return Ok(());
                    }
                }
                Err(other) => return Err(other).context("applying observation"),
            }
        }
        Ok(())
    }

    fn apply_once(
        &self,
        finalizer: &VisitFinalizer<'_>,
        obs: &Observation,
        class: Classification<'_>,
        summary: &mut PassSummary,
    ) -> Result<(), EngineError> {
        let current = self.states.find(obs.vessel)?;
        let (prior_state, prior_version) = match current {
            Some(v) => (Some(v.state), Some(v.version)),
            None => (None, None),
        };
        let had_prior = prior_state.is_some();
        let prior_confirmed = prior_state.as_ref().is_some_and(|s| s.in_confirmed);

        let Transition { state, completed } = step(&self.params, prior_state, obs, class);

        let finalized_now = completed.is_some();
        if let Some(visit) = completed {
            // Writes the record and deletes the live state
            summary.finalized.push(finalizer.finalize(&visit)?);
        }

        match state {
            Some(new_state) => {
                let confirmed_now = new_state.in_confirmed && !prior_confirmed;
                match prior_version {
                    // The finalizer already removed the old record, so a
                    // fresh candidacy after an exit is a plain put
                    Some(version) if !finalized_now => {
                        self.states.update(new_state, version)?;
                    }
                    _ => self.states.put(new_state)?,
                }
                if confirmed_now {
                    self.metrics.record_visit_confirmed();
                }
                if !had_prior {
                    self.metrics.record_state_created();
                }
            }
            None => {
                if had_prior && !finalized_now {
                    // Tentative candidacy judged to be noise
                    self.states.delete(obs.vessel)?;
                    self.metrics.record_state_discarded();
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Coord, VesselId};
    use crate::io::positions::MemoryPositions;
    use crate::io::store::{MemoryRecordStore, MemoryStateStore};
    use crate::services::geofence::{FeatureSelector, GeofenceFeature};
    use chrono::TimeZone;
    use geo::{polygon, MultiPolygon};

    fn harbor_index() -> GeofenceIndex {
        GeofenceIndex::new(vec![GeofenceFeature {
            name: "Harbor X".to_string(),
            kind: "Port".to_string(),
            group: None,
            geometry: MultiPolygon::new(vec![polygon![
                (x: 0.0, y: 0.0),
                (x: 1.0, y: 0.0),
                (x: 1.0, y: 1.0),
                (x: 0.0, y: 1.0),
                (x: 0.0, y: 0.0),
            ]]),
        }])
    }

    fn domain() -> DomainSpec {
        DomainSpec {
            name: "ports".to_string(),
            id_prefix: "pc".to_string(),
            selector: FeatureSelector::Category("Port".to_string()),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn raw(vessel: i64, minutes_ago: i64, lon: f64, lat: f64, moored: bool) -> String {
        let ts = now() - Duration::minutes(minutes_ago);
        let (sog, status) = if moored { (0.1, 5) } else { (8.0, 0) };
        format!(
            r#"{{"mmsi": {vessel}, "timestamp_utc": "{}", "coordinates": {{"type": "Point", "coordinates": [{lon}, {lat}]}}, "sog": {sog}, "nav_status": {status}}}"#,
            ts.to_rfc3339()
        )
    }

    fn source_from(lines: &[String]) -> MemoryPositions {
        let source = MemoryPositions::new();
        for line in lines {
            source.push(serde_json::from_str(line).unwrap());
        }
        source
    }

    #[test]
    fn test_live_pass_confirms_and_persists_state() {
        let index = harbor_index();
        let domain = domain();
        let states = MemoryStateStore::new();
        let records = MemoryRecordStore::new();
        let metrics = Metrics::new();
        let driver = LiveDriver::new(
            &domain,
            &index,
            DebounceParams::default(),
            &states,
            &records,
            &metrics,
            15,
            5000,
        );

        // One moored observation inside the harbor: born confirmed
        let source = source_from(&[raw(111, 5, 0.5, 0.5, true)]);
        let summary = driver.run_once(&source, now()).unwrap();

        assert_eq!(summary.processed, 1);
        assert!(summary.finalized.is_empty());
        let stored = states.find(VesselId(111)).unwrap().unwrap();
        assert!(stored.state.in_confirmed);
        assert_eq!(stored.state.area_name, "Harbor X");
    }

    #[test]
    fn test_state_bridges_across_passes_and_finalizes() {
        let index = harbor_index();
        let domain = domain();
        let states = MemoryStateStore::new();
        let records = MemoryRecordStore::new();
        let metrics = Metrics::new();
        let driver = LiveDriver::new(
            &domain,
            &index,
            DebounceParams::default(),
            &states,
            &records,
            &metrics,
            15,
            5000,
        );

        // First pass: confirm
        let source = source_from(&[raw(111, 10, 0.5, 0.5, true)]);
        driver.run_once(&source, now()).unwrap();

        // Second pass: three outside observations complete the exit
        let source = source_from(&[
            raw(111, 3, 5.0, 5.0, false),
            raw(111, 2, 5.0, 5.0, false),
            raw(111, 1, 5.0, 5.0, false),
        ]);
        let summary = driver.run_once(&source, now()).unwrap();

        assert_eq!(summary.finalized.len(), 1);
        assert!(states.find(VesselId(111)).unwrap().is_none());
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_duplicate_scan_does_not_duplicate_visits() {
        let index = harbor_index();
        let domain = domain();
        let states = MemoryStateStore::new();
        let records = MemoryRecordStore::new();
        let metrics = Metrics::new();
        let driver = LiveDriver::new(
            &domain,
            &index,
            DebounceParams::default(),
            &states,
            &records,
            &metrics,
            15,
            5000,
        );

        let lines = vec![
            raw(111, 10, 0.5, 0.5, true),
            raw(111, 3, 5.0, 5.0, false),
            raw(111, 2, 5.0, 5.0, false),
            raw(111, 1, 5.0, 5.0, false),
        ];
        let source = source_from(&lines);
        // The same window scanned twice (overlapping schedules)
        driver.run_once(&source, now()).unwrap();
        driver.run_once(&source, now()).unwrap();

        // Exactly one visit record by deterministic id
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_malformed_reports_are_skipped_not_fatal() {
        let index = harbor_index();
        let domain = domain();
        let states = MemoryStateStore::new();
        let records = MemoryRecordStore::new();
        let metrics = Metrics::new();
        let driver = LiveDriver::new(
            &domain,
            &index,
            DebounceParams::default(),
            &states,
            &records,
            &metrics,
            15,
            5000,
        );

        let source = MemoryPositions::new();
        source.push(serde_json::from_str(r#"{"mmsi": 111}"#).unwrap());
        source.push(serde_json::from_str(&raw(222, 1, 0.5, 0.5, false)).unwrap());

        let summary = driver.run_once(&source, now()).unwrap();
        assert_eq!(summary.malformed, 1);
        assert_eq!(summary.processed, 1);
        assert!(states.find(VesselId(222)).unwrap().is_some());
    }

    #[test]
    fn test_window_excludes_old_reports() {
        let index = harbor_index();
        let domain = domain();
        let states = MemoryStateStore::new();
        let records = MemoryRecordStore::new();
        let metrics = Metrics::new();
        let driver = LiveDriver::new(
            &domain,
            &index,
            DebounceParams::default(),
            &states,
            &records,
            &metrics,
            15,
            5000,
        );

        // 30 minutes old, outside the 15 minute window
        let source = source_from(&[raw(111, 30, 0.5, 0.5, true)]);
        let summary = driver.run_once(&source, now()).unwrap();
        assert_eq!(summary.scanned, 0);
        assert!(states.find(VesselId(111)).unwrap().is_none());
    }
}
