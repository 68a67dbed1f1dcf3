//! In-process event bus for engine notifications.
//!
//! Side-channel signals (transport failures swallowed by the polling
//! loops, job status changes, analysis outcomes) are published here
//! so the presentation layer can surface them without any loop ever
//! blocking on a consumer.

pub mod bus;

pub use bus::{EngineEvent, EventBus};
