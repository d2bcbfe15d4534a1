//! HTTP server for the interactive assistant session.

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use super::models::{ApiResponse, AskRequest, AskResponse, ClockStatus, ClockUpdate};
use crate::assistant::Assistant;

/// Shared application state: one assistant session per process.
///
/// The clock has a single writer (the polling endpoint) and a single reader
/// (prompt construction); the lock is held only for the duration of one
/// update or one question.
#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<RwLock<Assistant>>,
}

/// Configure and start the HTTP server.
pub async fn start_http_server(assistant: Assistant, port: u16) -> Result<()> {
    info!("🚀 Starting assistant server on port {}", port);

    let app_state = AppState {
        assistant: Arc::new(RwLock::new(assistant)),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let app = Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/clock",
            get(clock_status_handler).post(clock_update_handler),
        )
        .route("/api/ask", post(ask_handler))
        .with_state(app_state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("🌐 Assistant listening on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(ApiResponse::success("ok")))
}

/// Report the last observed playback position.
async fn clock_status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let seconds = state.assistant.read().await.playback_position();
    (
        StatusCode::OK,
        Json(ApiResponse::success(ClockStatus { seconds })),
    )
}

/// Accept a polled clock reading. Stale values are ignored by the session
/// clock, so late-arriving updates are harmless.
async fn clock_update_handler(
    State(state): State<AppState>,
    Json(update): Json<ClockUpdate>,
) -> impl IntoResponse {
    let mut assistant = state.assistant.write().await;
    assistant.observe_clock(update.seconds);
    let seconds = assistant.playback_position();
    (
        StatusCode::OK,
        Json(ApiResponse::success(ClockStatus { seconds })),
    )
}

/// Answer a question at the current (or an explicit) playback position.
/// LLM failures are returned inline; the session stays alive.
async fn ask_handler(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> impl IntoResponse {
    if request.question.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<AskResponse>::error(
                "question must not be empty".to_string(),
            )),
        );
    }

    let assistant = state.assistant.read().await;
    match assistant.ask(&request.question, request.seconds).await {
        Ok(answer) => (
            StatusCode::OK,
            Json(ApiResponse::success(AskResponse { answer })),
        ),
        Err(e) => {
            warn!("Assistant answer failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(ApiResponse::<AskResponse>::error(e.to_string())),
            )
        }
    }
}
