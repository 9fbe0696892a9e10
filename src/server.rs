//! HTTP API server: axum router and request handlers.
//!
//! The server runs on the tokio async runtime while the animator runs on a
//! plain `std::thread`. Both share the board through `SharedBoard`; each
//! handler holds the board lock only for the CPU-bound section updates.
//!
//! ## Rust concepts
//! - `async fn` and `.await` for non-blocking I/O
//! - axum extractors: `State`, `Json`
//! - `Arc` for sharing state across async tasks
//! - `tower-http` middleware for CORS and request tracing

use crate::animator::{AnimatorState, AnimatorStatus, SharedAnimatorStatus};
use crate::protocol::{
    BoardSectionsUpdateRequest, BoardSectionsUpdateResponse, ContentMessage, MovementMessage,
    PixelMessage, SectionUpdateRequest,
};
use crate::renderer::FrameSnapshot;
use crate::updater::{self, SectionOperationStatus, SectionStatus};
use crate::{BoardConfig, SectionArea, SharedBoard, Shutdown, lock_board};
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use serde::Serialize;
use std::sync::PoisonError;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// ── App State ────────────────────────────────────────────────────────

/// Shared application state, passed to every handler via axum's `State` extractor.
///
/// Everything inside is an `Arc` (or `Copy`), so axum can cheaply clone it
/// for each request.
#[derive(Clone)]
pub struct AppState {
    /// The board, shared with the animator thread
    pub board: SharedBoard,
    pub config: BoardConfig,
    /// Animator loop status (animator writes, handlers read)
    pub animator: SharedAnimatorStatus,
    /// Latest emulator frame, when the image renderer is active
    pub snapshot: Option<FrameSnapshot>,
    /// Raised to stop the whole server
    pub shutdown: Shutdown,
}

// ── OpenAPI Documentation ────────────────────────────────────────────

#[derive(OpenApi)]
#[openapi(
    paths(
        post_board_sections,
        get_status,
        get_frame,
        post_shutdown,
    ),
    components(schemas(
        BoardSectionsUpdateRequest,
        BoardSectionsUpdateResponse,
        SectionUpdateRequest,
        ContentMessage,
        PixelMessage,
        MovementMessage,
        SectionOperationStatus,
        SectionStatus,
        BoardStatus,
        SectionArea,
        AnimatorStatus,
        AnimatorState,
    )),
    tags(
        (name = "board", description = "Board section updates"),
        (name = "system", description = "System status and control"),
    ),
    info(
        title = "Departure Board API",
        version = env!("CARGO_PKG_VERSION"),
        description = "HTTP API for updating the sections of a departure board display"
    )
)]
pub struct ApiDoc;

// ── Response types ───────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, utoipa::ToSchema)]
pub struct BoardStatus {
    /// Display width in pixels
    pub width: u32,
    /// Display height in pixels
    pub height: u32,
    /// Animator tick step in milliseconds
    pub tick_ms: u64,
    /// Section areas, in section index order
    pub sections: Vec<SectionArea>,
    pub animator: AnimatorStatus,
    /// Server version
    pub version: String,
}

// ── Router ───────────────────────────────────────────────────────────

/// Build the axum router with all API endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(
            SwaggerUi::new("/docs")
                .url("/api-docs/openapi.json", ApiDoc::openapi())
                .config(utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"]).validator_url("none")),
        )
        .route("/api/v1/board/sections", post(post_board_sections))
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/frame.png", get(get_frame))
        .route("/api/v1/shutdown", post(post_shutdown))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Handlers ─────────────────────────────────────────────────────────

/// POST /api/v1/board/sections: update content and movement of sections
///
/// Unknown section indices are reported per entry as `SECTION_NOT_EXISTS`;
/// the other entries are still applied. Out-of-range values reject the
/// whole batch before anything is applied.
#[utoipa::path(
    post,
    path = "/api/v1/board/sections",
    tag = "board",
    request_body = BoardSectionsUpdateRequest,
    responses(
        (status = 200, description = "Per-section update status", body = BoardSectionsUpdateResponse),
        (status = 422, description = "Malformed request body or out-of-range values")
    )
)]
async fn post_board_sections(
    State(state): State<AppState>,
    Json(req): Json<BoardSectionsUpdateRequest>,
) -> Result<Json<BoardSectionsUpdateResponse>, (StatusCode, String)> {
    let updates = req.into_updates().map_err(|e| {
        tracing::warn!("Rejected board update: {}", e);
        (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
    })?;

    let status = updater::update_sections(&state.board, updates);
    Ok(Json(BoardSectionsUpdateResponse { status }))
}

/// GET /api/v1/status: board layout and animation loop state
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "system",
    responses(
        (status = 200, description = "Current board status", body = BoardStatus)
    )
)]
async fn get_status(State(state): State<AppState>) -> Json<BoardStatus> {
    let sections = lock_board(&state.board)
        .sections()
        .iter()
        .map(|s| s.area())
        .collect();
    let animator = state
        .animator
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();

    Json(BoardStatus {
        width: state.config.width,
        height: state.config.height,
        tick_ms: state.config.tick_ms,
        sections,
        animator,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /api/v1/frame.png: latest emulator frame
#[utoipa::path(
    get,
    path = "/api/v1/frame.png",
    tag = "system",
    responses(
        (status = 200, description = "Latest frame as PNG", body = [u8], content_type = "image/png"),
        (status = 404, description = "No emulator frame available")
    )
)]
async fn get_frame(State(state): State<AppState>) -> Result<impl IntoResponse, (StatusCode, String)> {
    let snapshot = state.snapshot.as_ref().ok_or((
        StatusCode::NOT_FOUND,
        "Frame snapshots need the image renderer".to_string(),
    ))?;

    let png = snapshot
        .to_png()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("PNG encoding failed: {e}")))?
        .ok_or((StatusCode::NOT_FOUND, "No frame rendered yet".to_string()))?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

/// POST /api/v1/shutdown: stop the animator and the server
#[utoipa::path(
    post,
    path = "/api/v1/shutdown",
    tag = "system",
    responses(
        (status = 202, description = "Shutdown started"),
    )
)]
async fn post_shutdown(State(state): State<AppState>) -> StatusCode {
    tracing::info!("Shutdown requested over HTTP");
    state.shutdown.trigger();
    StatusCode::ACCEPTED
}

/// Resolves once `shutdown` is raised, for axum's graceful shutdown.
pub async fn wait_for_shutdown(shutdown: Shutdown) {
    let _ = tokio::task::spawn_blocking(move || shutdown.wait()).await;
}
