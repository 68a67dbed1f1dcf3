//! HTTP surface for the zone occupancy engine.
//!
//! Exposes the per-feed engine sessions (zones, playback
//! synchronization, live sampling, analysis, job monitoring) as a
//! JSON REST API.

pub mod config;
pub mod error;
pub mod router;
pub mod routes;
pub mod state;
