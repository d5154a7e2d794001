//! API error responses.
//!
//! The dispatcher is the only layer that turns internal errors into wire
//! responses. Every error body carries `{"success": false, "error": ...}`;
//! the status code separates the client's fault (400) from the engine being
//! unreachable (503), a reply timeout (504), and everything else (500).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::mpv::{IpcError, MpvError};
use crate::overlay::{InterruptError, OverlayError};

/// Externally visible request failure.
#[derive(Debug)]
pub enum ApiError {
  /// Bad or missing request fields.
  Validation(String),
  /// Engine socket absent, refused, or the session is down.
  Unavailable(String),
  /// The engine accepted the connection but never replied in time.
  Timeout,
  /// Another interrupt clip is already playing.
  InterruptBusy,
  /// Anything else; the request fails but the process keeps serving.
  Internal(String),
}

impl ApiError {
  fn status(&self) -> StatusCode {
    match self {
      ApiError::Validation(_) => StatusCode::BAD_REQUEST,
      ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
      ApiError::InterruptBusy => StatusCode::CONFLICT,
      ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn reason(&self) -> String {
    match self {
      ApiError::Validation(msg) => msg.clone(),
      ApiError::Unavailable(msg) => msg.clone(),
      ApiError::Timeout => "Engine did not reply in time".to_string(),
      ApiError::InterruptBusy => "An interrupt is already playing".to_string(),
      ApiError::Internal(msg) => msg.clone(),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let reason = self.reason();
    if status.is_server_error() {
      log::error!("Request failed ({}): {}", status, reason);
    } else {
      log::info!("Request rejected ({}): {}", status, reason);
    }
    let body = Json(json!({ "success": false, "error": reason }));
    (status, body).into_response()
  }
}

impl From<OverlayError> for ApiError {
  fn from(e: OverlayError) -> Self {
    ApiError::Validation(e.to_string())
  }
}

impl From<MpvError> for ApiError {
  fn from(e: MpvError) -> Self {
    match e {
      MpvError::NotConnected => ApiError::Unavailable("Engine is not connected".to_string()),
      MpvError::Process(e) => ApiError::Unavailable(e.to_string()),
      MpvError::Ipc(IpcError::Timeout) => ApiError::Timeout,
      MpvError::Ipc(e) => ApiError::Unavailable(e.to_string()),
      MpvError::CommandFailed(reason) => {
        ApiError::Internal(format!("Engine rejected command: {}", reason))
      }
    }
  }
}

impl From<InterruptError> for ApiError {
  fn from(e: InterruptError) -> Self {
    match e {
      InterruptError::Busy => ApiError::InterruptBusy,
      InterruptError::Player(e) => e.into(),
      InterruptError::ResumeFailed(e) => {
        ApiError::Internal(format!("Interrupt played but resume failed: {}", e))
      }
    }
  }
}
