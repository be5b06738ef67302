//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `store` - keyed document stores behind traits (in-memory impls here)
//! - `catalog` - GeoJSON geofence catalog loader
//! - `positions` - observation source contract, JSONL loader
//! - `export` - visit record output to file (JSONL format)

pub mod catalog;
pub mod export;
pub mod positions;
pub mod store;

// Re-export commonly used types
pub use catalog::load_geofences;
pub use export::RecordExport;
pub use positions::{MemoryPositions, ObservationSource};
pub use store::{
    MemoryRecordStore, MemoryStateStore, MemoryTrafficStore, TrafficStore, VisitRecordStore,
    VisitStateStore,
};
