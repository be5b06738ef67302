//! Idempotent visit finalization
//!
//! Converts a completed visit into an immutable [`VisitRecord`] keyed by a
//! deterministic identifier, upserts it, and clears the live state. The
//! write-record-then-delete-state ordering is a two-step commit: a crash
//! between the steps leaves state plus a matching already-written record,
//! and the next pass re-derives the same id so the replace is a no-op.

use crate::domain::error::EngineError;
use crate::domain::visit::{deterministic_visit_id, minutes_between, CompletedVisit, VisitRecord};
use crate::infra::metrics::Metrics;
use crate::io::store::{VisitRecordStore, VisitStateStore};
use crate::services::geofence::DomainSpec;
use tracing::info;

/// Detection provenance tag stamped on every record
const ENTRY_METHOD: &str = "geo+status";

/// Writes finalized visits for one geofencing domain
pub struct VisitFinalizer<'a> {
    domain: &'a DomainSpec,
    records: &'a dyn VisitRecordStore,
    /// Live state to clear after the record write; the backfill pass owns
    /// its state in memory and runs without one
    states: Option<&'a dyn VisitStateStore>,
    metrics: &'a Metrics,
}

impl<'a> VisitFinalizer<'a> {
    pub fn new(
        domain: &'a DomainSpec,
        records: &'a dyn VisitRecordStore,
        metrics: &'a Metrics,
    ) -> Self {
        Self { domain, records, states: None, metrics }
    }

    pub fn with_state_store(mut self, states: &'a dyn VisitStateStore) -> Self {
        self.states = Some(states);
        self
    }

    /// Build the immutable record for a completed visit. Pure; exposed for
    /// tests and for recovery checks.
    pub fn build_record(&self, visit: &CompletedVisit) -> VisitRecord {
        let duration_min = minutes_between(visit.state.entered_at, visit.exit_ts).max(0);
        VisitRecord {
            id: deterministic_visit_id(
                &self.domain.id_prefix,
                visit.state.vessel,
                &visit.state.area_name,
                visit.state.entered_at,
            ),
            vessel: visit.state.vessel,
            area_name: visit.state.area_name.clone(),
            entry_ts: visit.state.entered_at,
            exit_ts: visit.exit_ts,
            duration_min,
            entry_method: ENTRY_METHOD.to_string(),
            first_coord: visit.state.first_coord,
            last_coord: visit.exit_coord,
            aggregated_window: None,
        }
    }

    /// Upsert the record by deterministic id, then delete the live state
    pub fn finalize(&self, visit: &CompletedVisit) -> Result<VisitRecord, EngineError> {
        let record = self.build_record(visit);
        self.records.upsert(record.clone())?;
        if let Some(states) = self.states {
            states.delete(visit.state.vessel)?;
        }
        self.metrics.record_visit_finalized();
        info!(
            domain = %self.domain.name,
            vessel = %record.vessel,
            area = %record.area_name,
            duration_min = %record.duration_min,
            id = %record.id,
            "visit_finalized"
        );
        Ok(record)
    }
}
