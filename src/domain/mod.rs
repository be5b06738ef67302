//! Domain models - core business types and visit lifecycle model
//!
//! This module contains the canonical data types used throughout the system:
//! - `Observation` - one timestamped position report for a vessel
//! - `VisitState` - live debounce state for one (vessel, domain)
//! - `VisitRecord` - immutable finalized visit with deterministic id
//! - `TrafficBucket` - fixed-window arrival counts for reporting
//! - `EngineError` - the engine's error taxonomy

pub mod error;
pub mod types;
pub mod visit;

// Re-export commonly used types at module level
pub use error::EngineError;
pub use types::{Coord, Observation, VesselId};
pub use visit::{CompletedVisit, TrafficBucket, VisitRecord, VisitState};
