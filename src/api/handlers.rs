//! HTTP request handlers.
//!
//! Each handler validates its body eagerly, forwards to the player facade or
//! the overlay scheduler, and answers with `{"success": true, ...}`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::ApiError;
use super::server::AppContext;
use crate::mpv::PlayerStatus;
use crate::overlay::{Geometry, OverlayContent, OverlayRequest, SlotId, SlotView};

const DEFAULT_SEEK_SECONDS: f64 = 30.0;

fn ok() -> Json<Value> {
  Json(json!({ "success": true }))
}

/// Accept a JSON body or no body at all; anything that fails to parse is
/// the client's fault.
fn optional_body<T: Default>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
  match body {
    Ok(Json(value)) => Ok(value),
    Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
    Err(rejection) => Err(ApiError::Validation(rejection.body_text())),
  }
}

/// Require a JSON body, mapping extractor rejections into the uniform
/// error shape instead of axum's default rejection response.
fn required_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
  match body {
    Ok(Json(value)) => Ok(value),
    Err(rejection) => Err(ApiError::Validation(rejection.body_text())),
  }
}

// ============================================================================
// Playback control
// ============================================================================

/// POST /api/play
pub async fn play(State(ctx): State<AppContext>) -> Result<Json<Value>, ApiError> {
  ctx.player.play().await?;
  Ok(ok())
}

/// POST /api/pause
pub async fn pause(State(ctx): State<AppContext>) -> Result<Json<Value>, ApiError> {
  ctx.player.pause().await?;
  Ok(ok())
}

/// POST /api/next
pub async fn next(State(ctx): State<AppContext>) -> Result<Json<Value>, ApiError> {
  ctx.player.next().await?;
  Ok(ok())
}

/// POST /api/previous
pub async fn previous(State(ctx): State<AppContext>) -> Result<Json<Value>, ApiError> {
  ctx.player.previous().await?;
  Ok(ok())
}

#[derive(Debug, Default, Deserialize)]
pub struct SeekBody {
  seconds: Option<f64>,
}

fn seek_amount(body: SeekBody) -> Result<f64, ApiError> {
  let seconds = body.seconds.unwrap_or(DEFAULT_SEEK_SECONDS);
  if !seconds.is_finite() || seconds <= 0.0 {
    return Err(ApiError::Validation(
      "seconds must be a positive number".to_string(),
    ));
  }
  Ok(seconds)
}

/// POST /api/seek-forward - body `{"seconds": n}`, defaults to 30.
pub async fn seek_forward(
  State(ctx): State<AppContext>,
  body: Result<Json<SeekBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
  let seconds = seek_amount(optional_body(body)?)?;
  ctx.player.seek_relative(seconds).await?;
  Ok(ok())
}

/// POST /api/seek-backward - body `{"seconds": n}`, defaults to 30.
pub async fn seek_backward(
  State(ctx): State<AppContext>,
  body: Result<Json<SeekBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
  let seconds = seek_amount(optional_body(body)?)?;
  ctx.player.seek_relative(-seconds).await?;
  Ok(ok())
}

#[derive(Debug, Deserialize)]
pub struct VolumeBody {
  volume: f64,
}

/// POST /api/volume - out-of-range values are clamped, not rejected.
pub async fn volume(
  State(ctx): State<AppContext>,
  body: Result<Json<VolumeBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
  let body = required_body(body)?;
  if !body.volume.is_finite() {
    return Err(ApiError::Validation("volume must be a number".to_string()));
  }
  let applied = ctx.player.set_volume(body.volume).await?;
  Ok(Json(json!({ "success": true, "volume": applied })))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
  #[serde(flatten)]
  player: PlayerStatus,
  overlays: Vec<SlotView>,
}

/// GET /api/status - never fails; a dead engine reports `connected: false`.
pub async fn status(State(ctx): State<AppContext>) -> Json<StatusResponse> {
  Json(StatusResponse {
    player: ctx.player.status().await,
    overlays: ctx.overlays.visible(),
  })
}

// ============================================================================
// Overlays
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ShowOverlayBody {
  position: String,
  #[serde(rename = "type")]
  kind: String,
  content: String,
  duration: Option<f64>,
  #[serde(default)]
  scroll: bool,
  width: Option<u32>,
  height: Option<u32>,
}

/// POST /api/show-overlay
pub async fn show_overlay(
  State(ctx): State<AppContext>,
  body: Result<Json<ShowOverlayBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
  let body = required_body(body)?;
  let slot: SlotId = body.position.parse()?;
  let content = OverlayContent::parse(&body.kind, &body.content, body.scroll)?;
  let geometry = Geometry {
    width: body.width,
    height: body.height,
  };
  let request = OverlayRequest::new(slot, content, geometry, body.duration)?;
  ctx.overlays.show(request);
  Ok(ok())
}

#[derive(Debug, Default, Deserialize)]
pub struct HideOverlayBody {
  position: Option<String>,
}

/// POST /api/hide-overlay - omitting `position` hides every slot.
pub async fn hide_overlay(
  State(ctx): State<AppContext>,
  body: Result<Json<HideOverlayBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
  let body = optional_body(body)?;
  match body.position {
    Some(position) => {
      let slot: SlotId = position.parse()?;
      ctx.overlays.hide(slot);
    }
    None => ctx.overlays.hide_all(),
  }
  Ok(ok())
}

#[derive(Debug, Deserialize)]
pub struct InterruptBody {
  file: String,
}

/// POST /api/play-interrupt-ad
pub async fn play_interrupt_ad(
  State(ctx): State<AppContext>,
  body: Result<Json<InterruptBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
  let body = required_body(body)?;
  if body.file.trim().is_empty() {
    return Err(ApiError::Validation("file must not be empty".to_string()));
  }
  ctx.overlays.play_interrupt(body.file).await?;
  Ok(ok())
}
