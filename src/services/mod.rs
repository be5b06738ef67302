//! Services - business logic and state management
//!
//! This module contains the core visit detection pipeline:
//! - `geofence` - named-polygon catalog index and domain selectors
//! - `state_machine` - debounced entry/exit transitions (pure functions)
//! - `finalizer` - idempotent visit record writes
//! - `aggregator` - fixed-window traffic bucketing
//! - `live_driver` - scheduled incremental passes over recent observations
//! - `backfill` - one-shot ordered pass over the full history

pub mod aggregator;
pub mod backfill;
pub mod finalizer;
pub mod geofence;
pub mod live_driver;
pub mod state_machine;

// Re-export commonly used types
pub use aggregator::TrafficAggregator;
pub use backfill::BackfillDriver;
pub use finalizer::VisitFinalizer;
pub use geofence::{DomainSpec, FeatureSelector, GeofenceFeature, GeofenceIndex};
pub use live_driver::LiveDriver;
pub use state_machine::{step, Classification, DebounceParams, Transition};
