//! Error taxonomy for the engine core
//!
//! Per-observation errors ([`EngineError::MalformedObservation`]) are counted
//! and skipped by the drivers; everything else aborts the current batch
//! invocation and is retried on the next scheduled run.

use crate::domain::types::VesselId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or invalid coordinate pair / vessel key. Skip the single
    /// observation; never fatal, never mutates state.
    #[error("malformed observation: {0}")]
    MalformedObservation(&'static str),

    /// Geofence catalog could not be loaded or queried. Fatal for the
    /// current batch invocation.
    #[error("geofence catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// Concurrent write to the same vessel key. Retried once with fresh
    /// state; a persistent conflict drops the observation for this pass.
    #[error("write conflict on vessel {0}")]
    StoreConflict(VesselId),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
