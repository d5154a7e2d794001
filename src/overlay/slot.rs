//! Overlay slot domain types and request validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverlayError {
  #[error("Unknown overlay position: {0}")]
  InvalidSlot(String),
  #[error("Unknown overlay content type: {0}")]
  InvalidKind(String),
  #[error("Overlay content must not be empty")]
  EmptyContent,
  #[error("Overlay duration must be positive")]
  InvalidDuration,
}

/// A named overlay region with independent visibility and timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotId {
  Bottom,
  Side,
}

impl FromStr for SlotId {
  type Err = OverlayError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "bottom" => Ok(SlotId::Bottom),
      "side" => Ok(SlotId::Side),
      other => Err(OverlayError::InvalidSlot(other.to_string())),
    }
  }
}

impl fmt::Display for SlotId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SlotId::Bottom => write!(f, "bottom"),
      SlotId::Side => write!(f, "side"),
    }
  }
}

/// What a slot renders. File existence for path-based kinds is the drawing
/// surface's concern; a missing file surfaces later as a render failure.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayContent {
  Text { body: String, scroll: bool },
  Image { path: String },
  VideoClip { path: String },
}

impl OverlayContent {
  /// Parse a content kind + payload pair as received from the API.
  pub fn parse(kind: &str, payload: &str, scroll: bool) -> Result<Self, OverlayError> {
    if payload.trim().is_empty() {
      return Err(OverlayError::EmptyContent);
    }
    match kind {
      "text" => Ok(OverlayContent::Text {
        body: payload.to_string(),
        scroll,
      }),
      "image" => Ok(OverlayContent::Image {
        path: payload.to_string(),
      }),
      "video-clip" => Ok(OverlayContent::VideoClip {
        path: payload.to_string(),
      }),
      other => Err(OverlayError::InvalidKind(other.to_string())),
    }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      OverlayContent::Text { .. } => "text",
      OverlayContent::Image { .. } => "image",
      OverlayContent::VideoClip { .. } => "video-clip",
    }
  }
}

/// Width/height hints forwarded to the drawing surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
  pub width: Option<u32>,
  pub height: Option<u32>,
}

/// A validated request to show content in a slot.
#[derive(Debug, Clone)]
pub struct OverlayRequest {
  pub slot: SlotId,
  pub content: OverlayContent,
  pub geometry: Geometry,
  /// None = visible until explicitly hidden.
  pub duration: Option<Duration>,
}

impl OverlayRequest {
  pub fn new(
    slot: SlotId,
    content: OverlayContent,
    geometry: Geometry,
    duration_secs: Option<f64>,
  ) -> Result<Self, OverlayError> {
    let duration = match duration_secs {
      Some(secs) if secs > 0.0 => Some(Duration::from_secs_f64(secs)),
      Some(_) => return Err(OverlayError::InvalidDuration),
      None => None,
    };
    Ok(Self {
      slot,
      content,
      geometry,
      duration,
    })
  }
}
