//! Drawing surface boundary.
//!
//! The scheduler never draws anything itself. It marshals render commands
//! onto the surface's own task through a channel, and the surface reports
//! back over an event channel. This keeps slot bookkeeping lock-cheap and
//! lets the rendering backend be swapped out (the built-in one is a headless
//! logger used on systems without a compositor, and by the tests).

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::slot::{Geometry, OverlayContent, SlotId};

/// Render instruction sent to the surface task.
#[derive(Debug, Clone)]
pub enum SurfaceCommand {
  Show {
    slot: SlotId,
    content: OverlayContent,
    geometry: Geometry,
  },
  Hide {
    slot: SlotId,
  },
  /// Take over the full screen with an interrupt clip.
  ShowInterrupt {
    path: String,
  },
  HideInterrupt,
}

/// Feedback from the surface back to the scheduler.
#[derive(Debug, Clone)]
pub enum SurfaceEvent {
  /// The surface could not render a slot (missing file, decode failure).
  RenderFailed { slot: SlotId, reason: String },
  /// An interrupt clip finished playing on its own.
  InterruptFinished,
}

/// Cheap handle for submitting render commands.
///
/// Sends are synchronous and non-blocking so the scheduler can issue them
/// while holding its slot table lock. A closed surface is logged, not
/// propagated; slot bookkeeping stays consistent either way.
#[derive(Clone)]
pub struct SurfaceHandle {
  tx: mpsc::UnboundedSender<SurfaceCommand>,
}

impl SurfaceHandle {
  pub fn send(&self, cmd: SurfaceCommand) {
    if self.tx.send(cmd).is_err() {
      log::warn!("Surface channel closed, render command dropped");
    }
  }
}

/// Create a surface command channel.
pub fn channel() -> (SurfaceHandle, mpsc::UnboundedReceiver<SurfaceCommand>) {
  let (tx, rx) = mpsc::unbounded_channel();
  (SurfaceHandle { tx }, rx)
}

/// Run the headless surface: consume render commands and log them.
///
/// Useful on machines without a compositor and as the default backend in
/// tests. Never emits `RenderFailed`; the event sender is kept so a real
/// backend can slot in with the same signature.
pub async fn run_headless(
  mut commands: mpsc::UnboundedReceiver<SurfaceCommand>,
  events: async_channel::Sender<SurfaceEvent>,
  cancel: CancellationToken,
) {
  log::debug!("Headless surface started");

  loop {
    tokio::select! {
      _ = cancel.cancelled() => {
        log::debug!("Headless surface stopping");
        break;
      }
      cmd = commands.recv() => {
        let Some(cmd) = cmd else {
          log::debug!("Surface command channel closed");
          break;
        };
        match cmd {
          SurfaceCommand::Show { slot, content, geometry } => {
            log::info!(
              "Surface show slot={} kind={} geometry={:?}",
              slot,
              content.kind(),
              geometry
            );
          }
          SurfaceCommand::Hide { slot } => {
            log::info!("Surface hide slot={}", slot);
          }
          SurfaceCommand::ShowInterrupt { path } => {
            log::info!("Surface interrupt start: {}", path);
          }
          SurfaceCommand::HideInterrupt => {
            log::info!("Surface interrupt end");
          }
        }
      }
    }
  }

  drop(events);
}
