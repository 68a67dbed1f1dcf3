use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zonewatch_api::config::ServerConfig;
use zonewatch_api::router::build_app_router;
use zonewatch_api::state::AppState;
use zonewatch_client::{backend_collaborators, BackendApi, SnapshotGrabber};
use zonewatch_engine::session::SessionRegistry;
use zonewatch_engine::EngineConfig;
use zonewatch_events::EventBus;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zonewatch_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let engine_config = EngineConfig::from_env();

    // --- Backend client ---
    let mut backend = BackendApi::new(config.backend_api_url.clone());
    if let Some(token) = config.backend_api_token.clone() {
        backend = backend.with_token(token);
    }
    let backend = Arc::new(backend);
    tracing::info!(backend = %config.backend_api_url, "Backend client created");

    let frame_grabber = Arc::new(SnapshotGrabber::new(config.snapshot_url.clone()));

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    // --- Session registry ---
    let registry = Arc::new(SessionRegistry::new(
        backend_collaborators(backend, frame_grabber),
        Arc::clone(&event_bus),
        engine_config,
    ));
    tracing::info!("Session registry created");

    // --- App state ---
    let state = AppState {
        registry: Arc::clone(&registry),
        config: Arc::new(config.clone()),
        event_bus: Arc::clone(&event_bus),
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
