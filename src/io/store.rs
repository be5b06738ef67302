//! Keyed document stores behind traits
//!
//! The engine only needs point operations from its store: find-by-key,
//! upsert-by-key (full replace), delete-by-key, and a couple of filtered
//! scans. A production deployment binds these traits to a document
//! database; the in-memory implementations here back the live daemon, the
//! backfill pass, and the tests.

use crate::domain::error::EngineError;
use crate::domain::types::VesselId;
use crate::domain::visit::{TrafficBucket, VisitRecord, VisitState};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// A stored [`VisitState`] plus its optimistic-concurrency version
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedState {
    pub state: VisitState,
    pub version: u64,
}

/// One live state record per vessel within a domain's keyspace
pub trait VisitStateStore {
    fn find(&self, vessel: VesselId) -> Result<Option<VersionedState>, EngineError>;
    /// Keyed upsert (full replace); resets the version counter
    fn put(&self, state: VisitState) -> Result<(), EngineError>;
    /// Versioned replace. Fails with [`EngineError::StoreConflict`] when the
    /// stored version no longer matches `expected_version`.
    fn update(&self, state: VisitState, expected_version: u64) -> Result<(), EngineError>;
    fn delete(&self, vessel: VesselId) -> Result<(), EngineError>;
}

/// Append/replace store of finalized visit records, keyed by deterministic id
pub trait VisitRecordStore {
    /// Upsert-by-id, full replace. Re-finalizing an identical entry is a
    /// no-op replace, never a duplicate insert.
    fn upsert(&self, record: VisitRecord) -> Result<(), EngineError>;
    fn get(&self, id: &str) -> Result<Option<VisitRecord>, EngineError>;
    /// Records not yet folded into a traffic bucket (`aggregated_window`
    /// still null)
    fn unaggregated(&self) -> Result<Vec<VisitRecord>, EngineError>;
    fn all(&self) -> Result<Vec<VisitRecord>, EngineError>;
    fn mark_aggregated(&self, id: &str, window: DateTime<Utc>) -> Result<(), EngineError>;
}

/// Arrival counters keyed by (area, window start)
pub trait TrafficStore {
    /// Atomic increment-with-upsert; the accumulator is commutative so no
    /// transactional locking is required of implementations
    fn increment(&self, area: &str, window_start: DateTime<Utc>, by: u64)
        -> Result<(), EngineError>;
    fn get(&self, area: &str, window_start: DateTime<Utc>)
        -> Result<Option<TrafficBucket>, EngineError>;
    fn all(&self) -> Result<Vec<TrafficBucket>, EngineError>;
    /// Drop every bucket (full traffic rebuild only). Returns the number
    /// removed.
    fn clear(&self) -> Result<usize, EngineError>;
}

/// In-memory state store with per-record version counters
#[derive(Default)]
pub struct MemoryStateStore {
    inner: RwLock<FxHashMap<i64, VersionedState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl VisitStateStore for MemoryStateStore {
    fn find(&self, vessel: VesselId) -> Result<Option<VersionedState>, EngineError> {
        Ok(self.inner.read().get(&vessel.0).cloned())
    }

    fn put(&self, state: VisitState) -> Result<(), EngineError> {
        self.inner
            .write()
            .insert(state.vessel.0, VersionedState { state, version: 0 });
        Ok(())
    }

    fn update(&self, state: VisitState, expected_version: u64) -> Result<(), EngineError> {
        let mut map = self.inner.write();
        match map.get_mut(&state.vessel.0) {
            Some(entry) if entry.version == expected_version => {
                entry.state = state;
                entry.version += 1;
                Ok(())
            }
            _ => Err(EngineError::StoreConflict(state.vessel)),
        }
    }

    fn delete(&self, vessel: VesselId) -> Result<(), EngineError> {
        self.inner.write().remove(&vessel.0);
        Ok(())
    }
}

/// In-memory visit record store keyed by deterministic id
#[derive(Default)]
pub struct MemoryRecordStore {
    inner: RwLock<FxHashMap<String, VisitRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl VisitRecordStore for MemoryRecordStore {
    fn upsert(&self, record: VisitRecord) -> Result<(), EngineError> {
        self.inner.write().insert(record.id.clone(), record);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<VisitRecord>, EngineError> {
        Ok(self.inner.read().get(id).cloned())
    }

    fn unaggregated(&self) -> Result<Vec<VisitRecord>, EngineError> {
        let mut out: Vec<VisitRecord> = self
            .inner
            .read()
            .values()
            .filter(|r| r.aggregated_window.is_none())
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    fn all(&self) -> Result<Vec<VisitRecord>, EngineError> {
        let mut out: Vec<VisitRecord> = self.inner.read().values().cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    fn mark_aggregated(&self, id: &str, window: DateTime<Utc>) -> Result<(), EngineError> {
        if let Some(record) = self.inner.write().get_mut(id) {
            record.aggregated_window = Some(window);
        }
        Ok(())
    }
}

/// In-memory traffic bucket store keyed by (area, window start)
#[derive(Default)]
pub struct MemoryTrafficStore {
    inner: RwLock<FxHashMap<(String, DateTime<Utc>), u64>>,
}

impl MemoryTrafficStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrafficStore for MemoryTrafficStore {
    fn increment(
        &self,
        area: &str,
        window_start: DateTime<Utc>,
        by: u64,
    ) -> Result<(), EngineError> {
        let mut map = self.inner.write();
        *map.entry((area.to_string(), window_start)).or_insert(0) += by;
        Ok(())
    }

    fn get(
        &self,
        area: &str,
        window_start: DateTime<Utc>,
    ) -> Result<Option<TrafficBucket>, EngineError> {
        Ok(self
            .inner
            .read()
            .get(&(area.to_string(), window_start))
            .map(|&arrivals| TrafficBucket {
                area_name: area.to_string(),
                window_start,
                arrivals,
            }))
    }

    fn all(&self) -> Result<Vec<TrafficBucket>, EngineError> {
        let mut out: Vec<TrafficBucket> = self
            .inner
            .read()
            .iter()
            .map(|((area, window), &arrivals)| TrafficBucket {
                area_name: area.clone(),
                window_start: *window,
                arrivals,
            })
            .collect();
        out.sort_by(|a, b| (&a.area_name, a.window_start).cmp(&(&b.area_name, b.window_start)));
        Ok(out)
    }

    fn clear(&self) -> Result<usize, EngineError> {
        let mut map = self.inner.write();
        let n = map.len();
        map.clear();
        Ok(n)
    }
}
