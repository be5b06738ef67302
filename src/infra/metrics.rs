//! Lock-free metrics collection and periodic reporting
//!
//! Counters are plain atomics so the per-observation hot path never takes a
//! lock. All atomics use Relaxed ordering intentionally - these are
//! statistical counters only, never used for coordination or logic.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Lock-free counters for the engine's batch jobs
#[derive(Default)]
pub struct Metrics {
    /// Observations fed through the state machine (monotonic)
    observations_processed: AtomicU64,
    /// Observations skipped for missing/invalid fields (monotonic)
    malformed_skipped: AtomicU64,
    /// Tentative candidacies opened
    states_created: AtomicU64,
    /// Tentative candidacies dropped as noise
    states_discarded: AtomicU64,
    /// Tentative states promoted to confirmed
    visits_confirmed: AtomicU64,
    /// Completed visits written as records
    visits_finalized: AtomicU64,
    /// Visit records folded into traffic buckets
    records_aggregated: AtomicU64,
    /// Optimistic store writes that hit a version conflict
    store_conflicts: AtomicU64,
}

/// Point-in-time snapshot of all counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSummary {
    pub observations_processed: u64,
    pub malformed_skipped: u64,
    pub states_created: u64,
    pub states_discarded: u64,
    pub visits_confirmed: u64,
    pub visits_finalized: u64,
    pub records_aggregated: u64,
    pub store_conflicts: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            observations = %self.observations_processed,
            malformed = %self.malformed_skipped,
            states_created = %self.states_created,
            states_discarded = %self.states_discarded,
            confirmed = %self.visits_confirmed,
            finalized = %self.visits_finalized,
            aggregated = %self.records_aggregated,
            conflicts = %self.store_conflicts,
            "metrics_report"
        );
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_observation(&self) {
        self.observations_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_state_created(&self) {
        self.states_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_state_discarded(&self) {
        self.states_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_visit_confirmed(&self) {
        self.visits_confirmed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_visit_finalized(&self) {
        self.visits_finalized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_aggregated(&self, n: u64) {
        self.records_aggregated.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_store_conflict(&self) {
        self.store_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    /// Consistent-enough snapshot for logging; counters keep running
    pub fn snapshot(&self) -> MetricsSummary {
        MetricsSummary {
            observations_processed: self.observations_processed.load(Ordering::Relaxed),
            malformed_skipped: self.malformed_skipped.load(Ordering::Relaxed),
            states_created: self.states_created.load(Ordering::Relaxed),
            states_discarded: self.states_discarded.load(Ordering::Relaxed),
            visits_confirmed: self.visits_confirmed.load(Ordering::Relaxed),
            visits_finalized: self.visits_finalized.load(Ordering::Relaxed),
            records_aggregated: self.records_aggregated.load(Ordering::Relaxed),
            store_conflicts: self.store_conflicts.load(Ordering::Relaxed),
        }
    }
}
