//! MPV JSON IPC protocol types.
//!
//! Reference: https://mpv.io/manual/master/#json-ipc

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

/// Global request ID counter for unique command identification.
static REQUEST_ID: AtomicI64 = AtomicI64::new(1);

/// Generate a unique request ID for MPV commands.
pub fn next_request_id() -> i64 {
  REQUEST_ID.fetch_add(1, Ordering::SeqCst)
}

/// Command sent to MPV via IPC.
#[derive(Debug, Clone, Serialize)]
pub struct MpvCommand {
  pub command: Vec<serde_json::Value>,
  pub request_id: i64,
}

impl MpvCommand {
  /// Create a new command with auto-generated request ID.
  pub fn new(args: Vec<serde_json::Value>) -> Self {
    Self {
      command: args,
      request_id: next_request_id(),
    }
  }

  /// Set pause state.
  pub fn set_pause(paused: bool) -> Self {
    Self::new(vec!["set_property".into(), "pause".into(), paused.into()])
  }

  /// Seek relative to the current position (signed seconds).
  pub fn seek_relative(seconds: f64) -> Self {
    Self::new(vec!["seek".into(), seconds.into(), "relative".into()])
  }

  /// Advance to the next playlist entry.
  pub fn playlist_next() -> Self {
    Self::new(vec!["playlist-next".into()])
  }

  /// Go back to the previous playlist entry.
  pub fn playlist_prev() -> Self {
    Self::new(vec!["playlist-prev".into()])
  }

  /// Set volume (0-100).
  pub fn set_volume(volume: f64) -> Self {
    Self::new(vec!["set_property".into(), "volume".into(), volume.into()])
  }

  /// Get a property value.
  pub fn get_property(name: &str) -> Self {
    Self::new(vec!["get_property".into(), name.into()])
  }

  /// Quit MPV. The engine saves its resume position on the way out.
  pub fn quit() -> Self {
    Self::new(vec!["quit".into()])
  }
}

/// Response from MPV for a command.
#[derive(Debug, Clone, Deserialize)]
pub struct MpvResponse {
  /// "success" or error message.
  pub error: String,
  /// Response data (command-specific).
  pub data: Option<serde_json::Value>,
  /// Matching request ID.
  pub request_id: i64,
}

impl MpvResponse {
  /// Check if the command succeeded.
  pub fn is_success(&self) -> bool {
    self.error == "success"
  }
}

/// Event sent by MPV (property changes, playback events, etc.).
#[derive(Debug, Clone, Deserialize)]
pub struct MpvEvent {
  /// Event type (e.g., "property-change", "end-file", "file-loaded").
  pub event: String,
  /// Event data.
  pub data: Option<serde_json::Value>,
  /// Reason for end-file events (e.g., "eof", "stop", "quit", "error").
  pub reason: Option<String>,
}

/// Typed property values from MPV.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
  Bool(bool),
  Number(f64),
  String(String),
  Null,
}

impl From<serde_json::Value> for PropertyValue {
  fn from(value: serde_json::Value) -> Self {
    match value {
      serde_json::Value::Bool(b) => PropertyValue::Bool(b),
      serde_json::Value::Number(n) => PropertyValue::Number(n.as_f64().unwrap_or(0.0)),
      serde_json::Value::String(s) => PropertyValue::String(s),
      serde_json::Value::Null => PropertyValue::Null,
      other => PropertyValue::String(other.to_string()),
    }
  }
}

/// Message received from MPV IPC (either response or event).
#[derive(Debug, Clone)]
pub enum MpvMessage {
  Response(MpvResponse),
  Event(MpvEvent),
}

impl MpvMessage {
  /// Parse a JSON line from MPV.
  pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
    // Replies carry a request_id; everything else on the socket is an event
    if line.contains("request_id") {
      let response: MpvResponse = serde_json::from_str(line)?;
      Ok(MpvMessage::Response(response))
    } else {
      let event: MpvEvent = serde_json::from_str(line)?;
      Ok(MpvMessage::Event(event))
    }
  }
}
