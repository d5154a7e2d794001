//! Overlay module - slot scheduling on top of the playback engine.
//!
//! Architecture:
//! - `slot.rs` - Slot identifiers, content kinds, request validation
//! - `surface.rs` - Channel boundary to the drawing surface
//! - `scheduler.rs` - Slot table, expiry timers, interrupt orchestration

mod scheduler;
mod slot;
mod surface;

pub use scheduler::{InterruptError, OverlayScheduler, SlotView};
pub use slot::{Geometry, OverlayContent, OverlayError, OverlayRequest, SlotId};
pub use surface::{
  channel as surface_channel, run_headless, SurfaceCommand, SurfaceEvent, SurfaceHandle,
};
