//! HTTP implementations of the engine's collaborator contracts.
//!
//! [`BackendApi`] wraps the analytics backend's REST surface; the
//! `collaborators` module adapts it (plus a snapshot-based frame
//! grabber) to the traits `zonewatch-engine` consumes.

pub mod api;
pub mod collaborators;

pub use api::{BackendApi, BackendApiError};
pub use collaborators::{backend_collaborators, SnapshotGrabber};
