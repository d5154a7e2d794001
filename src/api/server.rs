//! Router setup and shared handler context.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::mpv::MpvClient;
use crate::overlay::OverlayScheduler;

/// Shared application context passed to all handlers.
#[derive(Clone)]
pub struct AppContext {
  pub player: Arc<MpvClient>,
  pub overlays: Arc<OverlayScheduler>,
}

/// A panicking handler answers with a 500 for that one request; the server
/// keeps serving.
fn handle_panic(_err: Box<dyn std::any::Any + Send + 'static>) -> axum::response::Response {
  log::error!("Handler panicked");
  (
    StatusCode::INTERNAL_SERVER_ERROR,
    Json(json!({ "success": false, "error": "Internal error" })),
  )
    .into_response()
}

/// Build the API router. Kept free of the listening socket so tests can
/// drive it directly.
pub fn router(ctx: AppContext) -> Router {
  Router::new()
    .route("/api/play", post(handlers::play))
    .route("/api/pause", post(handlers::pause))
    .route("/api/next", post(handlers::next))
    .route("/api/previous", post(handlers::previous))
    .route("/api/seek-forward", post(handlers::seek_forward))
    .route("/api/seek-backward", post(handlers::seek_backward))
    .route("/api/volume", post(handlers::volume))
    .route("/api/status", get(handlers::status))
    .route("/api/show-overlay", post(handlers::show_overlay))
    .route("/api/hide-overlay", post(handlers::hide_overlay))
    .route("/api/play-interrupt-ad", post(handlers::play_interrupt_ad))
    .with_state(ctx)
    .layer(CatchPanicLayer::custom(handle_panic))
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive())
}
