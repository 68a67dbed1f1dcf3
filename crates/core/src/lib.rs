//! Pure domain logic for zone occupancy analytics.
//!
//! Everything in this crate is synchronous and side-effect free:
//! geometry tests, detection/zone/analysis models, the multi-zone
//! report combiner, and job status transitions. Async orchestration
//! lives in `zonewatch-engine`.

pub mod analysis;
pub mod detection;
pub mod error;
pub mod geometry;
pub mod job;
pub mod types;
pub mod zone;

pub use error::CoreError;
