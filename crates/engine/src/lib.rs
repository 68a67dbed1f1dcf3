//! Zone occupancy analytics engine.
//!
//! Reconciles three asynchronous time bases — the video playback
//! clock, detection-frame arrival, and backend job completion — into
//! consistent per-zone and combined occupancy statistics:
//!
//! - [`store::ZoneStore`] — registry of zone definitions and their
//!   latest analysis, volatile or backed by the durable directory.
//! - [`sync::DetectionSynchronizer`] — maps a playback clock reading
//!   to the nearest cached detection frame via a locality cursor.
//! - [`sampler::LiveSampler`] — fixed-cadence, single-flight capture
//!   and detect loop for live sources.
//! - [`monitor::JobMonitorRegistry`] — bounded polling of backend
//!   processing jobs, one monitor per feed.
//! - [`aggregate::ZoneAnalysisAggregator`] — sequential per-zone
//!   analysis with a combined multi-zone report.
//! - [`session::FeedSession`] — one feed's components wired together.
//!
//! External collaborators (detector, analysis service, job status
//! service, durable zone directory, frame grabber) are consumed
//! through the contracts in [`traits`].

pub mod aggregate;
pub mod config;
pub mod error;
pub mod monitor;
pub mod sampler;
pub mod session;
pub mod store;
pub mod sync;
pub mod traits;

pub use config::EngineConfig;
pub use error::EngineError;
