//! Kiosk media playback daemon.
//!
//! Drives an external MPV engine over its JSON IPC socket, schedules
//! time-bounded screen overlays on top of the video output, and exposes an
//! HTTP control API for both.

pub mod api;
pub mod config;
pub mod mpv;
pub mod overlay;

pub use config::{AppConfig, ConfigError};
