use std::sync::Arc;

use zonewatch_engine::session::SessionRegistry;
use zonewatch_events::EventBus;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Per-feed engine sessions.
    pub registry: Arc<SessionRegistry>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Engine event bus.
    pub event_bus: Arc<EventBus>,
}
