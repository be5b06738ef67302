//! Backfill driver - one ordered streaming pass over the full history
//!
//! Seeds or repairs visit history episodically. State lives in a single
//! in-memory map scoped to the call frame and discarded at the end of the
//! run; nothing is persisted between observations. The transition rules and
//! the idempotent finalizer are the same ones the live driver uses, so a
//! backfill over the same observations produces the same record set.

use crate::domain::types::VesselId;
use crate::domain::visit::{VisitRecord, VisitState};
use crate::infra::metrics::Metrics;
use crate::io::positions::ObservationSource;
use crate::io::store::VisitRecordStore;
use crate::services::finalizer::VisitFinalizer;
use crate::services::geofence::{DomainSpec, GeofenceIndex};
use crate::services::state_machine::{step, Classification, DebounceParams, Transition};
use anyhow::Context;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use tracing::info;

/// Outcome counts of one backfill run
#[derive(Debug, Default)]
pub struct BackfillSummary {
    pub processed: usize,
    pub malformed: usize,
    pub finalized: Vec<VisitRecord>,
    /// Vessels still holding an unresolved candidacy at end of history
    /// (possibly still in port; intentionally not finalized)
    pub open_states: usize,
}

/// Historical visit detection for one geofencing domain
pub struct BackfillDriver<'a> {
    domain: &'a DomainSpec,
    index: &'a GeofenceIndex,
    params: DebounceParams,
    records: &'a dyn VisitRecordStore,
    metrics: &'a Metrics,
}

impl<'a> BackfillDriver<'a> {
    pub fn new(
        domain: &'a DomainSpec,
        index: &'a GeofenceIndex,
        params: DebounceParams,
        records: &'a dyn VisitRecordStore,
        metrics: &'a Metrics,
    ) -> Self {
        Self { domain, index, params, records, metrics }
    }

    /// Single pass over the source's (vessel, timestamp)-ordered history
    pub fn run(
        &self,
        source: &dyn ObservationSource,
        now: DateTime<Utc>,
    ) -> anyhow::Result<BackfillSummary> {
        let raws = source
            .history()
            .with_context(|| format!("streaming history for {}", self.domain.name))?;

        let mut summary = BackfillSummary::default();
        // Per-vessel state for this run only; dropped when we return
        let mut states: FxHashMap<VesselId, VisitState> = FxHashMap::default();
        let finalizer = VisitFinalizer::new(self.domain, self.records, self.metrics);

        for raw in raws {
            let obs = match raw.into_observation(now) {
                Ok(obs) => obs,
                Err(_) => {
                    summary.malformed += 1;
                    self.metrics.record_malformed();
                    continue;
                }
            };

            let class = match self.index.resolve(obs.coord, &self.domain.selector) {
                Some(feature) => Classification::Inside(&feature.name),
                None => Classification::Outside,
            };

            let prior = states.remove(&obs.vessel);
            let had_prior = prior.is_some();
            let Transition { state, completed } = step(&self.params, prior, &obs, class);

            if let Some(visit) = completed {
                summary.finalized.push(finalizer.finalize(&visit)?);
            } else if had_prior && state.is_none() {
                self.metrics.record_state_discarded();
            }
            if let Some(new_state) = state {
                if !had_prior {
                    self.metrics.record_state_created();
                }
                states.insert(obs.vessel, new_state);
            }

            summary.processed += 1;
            self.metrics.record_observation();
        }

        summary.open_states = states.len();
        info!(
            domain = %self.domain.name,
            processed = %summary.processed,
            malformed = %summary.malformed,
            finalized = %summary.finalized.len(),
            open_states = %summary.open_states,
            "backfill_complete"
        );
        Ok(summary)
    }
}
