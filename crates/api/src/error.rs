use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use zonewatch_core::CoreError;
use zonewatch_engine::EngineError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`EngineError`] for engine/domain errors and adds
/// HTTP-specific variants. Implements [`IntoResponse`] to produce
/// consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// An engine-level error (domain validation, transport, analysis).
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The requested resource does not exist.
    #[error("{0} not found")]
    NotFound(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<CoreError> for AppError {
    fn from(e: CoreError) -> Self {
        AppError::Engine(EngineError::Core(e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Engine(engine) => match engine {
                EngineError::Core(core) => match core {
                    CoreError::NotFound { entity, id } => (
                        StatusCode::NOT_FOUND,
                        "NOT_FOUND",
                        format!("{entity} with id {id} not found"),
                    ),
                    CoreError::GeometryInvalid(msg) => {
                        (StatusCode::BAD_REQUEST, "GEOMETRY_INVALID", msg.clone())
                    }
                    CoreError::GeometryTooSmall {
                        width,
                        height,
                        min_extent,
                    } => (
                        StatusCode::BAD_REQUEST,
                        "GEOMETRY_TOO_SMALL",
                        format!(
                            "zone extent {width:.0}x{height:.0}px is below the \
                             {min_extent:.0}px minimum"
                        ),
                    ),
                    CoreError::Validation(msg) => {
                        (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                    }
                },
                EngineError::Transport(e) => {
                    tracing::error!(error = %e, "Backend call failed");
                    (
                        StatusCode::BAD_GATEWAY,
                        "BACKEND_UNAVAILABLE",
                        "The analytics backend could not be reached".to_string(),
                    )
                }
                EngineError::AllAnalysesFailed { total, .. } => (
                    StatusCode::BAD_GATEWAY,
                    "ANALYSIS_FAILED",
                    format!("all {total} zone analyses failed"),
                ),
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{what} not found"),
            ),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
