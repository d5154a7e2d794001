//! Overlay slot scheduler.
//!
//! Owns the slot table: what each slot currently shows, its expiry deadline,
//! and the timer that will hide it. Showing into an occupied slot replaces
//! its content and cancels the old timer. Timers carry a generation number;
//! a timer only hides the slot if the generation still matches under the
//! table lock, so a replace can never be undone by a stale timer firing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::slot::{Geometry, OverlayContent, OverlayRequest, SlotId};
use super::surface::{SurfaceCommand, SurfaceEvent, SurfaceHandle};
use crate::mpv::{MpvClient, MpvError};

/// Source of timer generations, shared by all slots.
static GENERATION: AtomicU64 = AtomicU64::new(0);

fn next_generation() -> u64 {
  GENERATION.fetch_add(1, Ordering::Relaxed)
}

#[derive(Error, Debug)]
pub enum InterruptError {
  #[error("An interrupt is already playing")]
  Busy,
  #[error("Player error: {0}")]
  Player(#[from] MpvError),
  #[error("Failed to resume playback after interrupt: {0}")]
  ResumeFailed(MpvError),
}

/// What one slot currently shows.
struct SlotState {
  content: OverlayContent,
  geometry: Geometry,
  /// When the slot auto-hides; None = until explicitly hidden.
  deadline: Option<tokio::time::Instant>,
  generation: u64,
  timer: Option<JoinHandle<()>>,
}

/// Read-only view of a slot for status reporting.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SlotView {
  pub slot: SlotId,
  pub kind: &'static str,
  /// Seconds until auto-hide; None = indefinite.
  pub remaining: Option<f64>,
}

/// Schedules overlay content into slots and orchestrates interrupts.
pub struct OverlayScheduler {
  slots: Arc<Mutex<HashMap<SlotId, SlotState>>>,
  surface: SurfaceHandle,
  player: Arc<MpvClient>,
  /// Held for the duration of an interrupt; try_lock failure means busy.
  interrupt_guard: tokio::sync::Mutex<()>,
  /// Completion signal armed while an interrupt plays.
  interrupt_done: Arc<Mutex<Option<oneshot::Sender<()>>>>,
  /// Ceiling on interrupt playback when the surface never reports completion.
  interrupt_max: Duration,
  cancel: CancellationToken,
  _listener_handle: JoinHandle<()>,
}

impl OverlayScheduler {
  /// Create a scheduler wired to a surface and the playback engine.
  ///
  /// Spawns a listener draining surface events for the scheduler's lifetime.
  pub fn new(
    surface: SurfaceHandle,
    events: async_channel::Receiver<SurfaceEvent>,
    player: Arc<MpvClient>,
    interrupt_max: Duration,
  ) -> Self {
    let interrupt_done: Arc<Mutex<Option<oneshot::Sender<()>>>> = Arc::new(Mutex::new(None));
    let cancel = CancellationToken::new();

    let listener_done = interrupt_done.clone();
    let listener_cancel = cancel.clone();
    let listener_handle = tokio::spawn(async move {
      Self::event_loop(events, listener_done, listener_cancel).await;
    });

    Self {
      slots: Arc::new(Mutex::new(HashMap::new())),
      surface,
      player,
      interrupt_guard: tokio::sync::Mutex::new(()),
      interrupt_done,
      interrupt_max,
      cancel,
      _listener_handle: listener_handle,
    }
  }

  async fn event_loop(
    events: async_channel::Receiver<SurfaceEvent>,
    interrupt_done: Arc<Mutex<Option<oneshot::Sender<()>>>>,
    cancel: CancellationToken,
  ) {
    loop {
      tokio::select! {
        _ = cancel.cancelled() => break,
        event = events.recv() => {
          let Ok(event) = event else { break };
          match event {
            SurfaceEvent::RenderFailed { slot, reason } => {
              log::error!("Render failed for slot {}: {}", slot, reason);
            }
            SurfaceEvent::InterruptFinished => {
              if let Some(tx) = interrupt_done.lock().take() {
                let _ = tx.send(());
              } else {
                log::debug!("Interrupt finished with no interrupt in flight");
              }
            }
          }
        }
      }
    }
  }

  /// Show content in a slot, replacing whatever it held.
  ///
  /// Replacement cancels the old expiry timer; the new duration (if any)
  /// starts from now regardless of what the previous content had left.
  pub fn show(&self, request: OverlayRequest) {
    let generation = next_generation();
    let deadline = request
      .duration
      .map(|d| tokio::time::Instant::now() + d);

    {
      let mut slots = self.slots.lock();
      if let Some(old) = slots.remove(&request.slot) {
        if let Some(timer) = old.timer {
          timer.abort();
        }
        log::debug!(
          "Replacing slot {} ({} -> {})",
          request.slot,
          old.content.kind(),
          request.content.kind()
        );
      }

      let timer = deadline.map(|deadline| {
        let slot = request.slot;
        let slots = self.slots.clone();
        let surface = self.surface.clone();
        tokio::spawn(async move {
          tokio::time::sleep_until(deadline).await;
          // Re-check under the lock: a replace may have raced the wakeup
          let mut slots = slots.lock();
          match slots.get(&slot) {
            Some(state) if state.generation == generation => {
              slots.remove(&slot);
              log::info!("Slot {} expired", slot);
              surface.send(SurfaceCommand::Hide { slot });
            }
            _ => {
              log::debug!("Expiry timer for slot {} superseded", slot);
            }
          }
        })
      });

      slots.insert(
        request.slot,
        SlotState {
          content: request.content.clone(),
          geometry: request.geometry,
          deadline,
          generation,
          timer,
        },
      );
    }

    log::info!(
      "Showing {} in slot {} (duration: {:?})",
      request.content.kind(),
      request.slot,
      request.duration
    );
    self.surface.send(SurfaceCommand::Show {
      slot: request.slot,
      content: request.content,
      geometry: request.geometry,
    });
  }

  /// Hide a slot. Hiding an empty slot is a no-op.
  pub fn hide(&self, slot: SlotId) {
    let removed = {
      let mut slots = self.slots.lock();
      slots.remove(&slot)
    };

    match removed {
      Some(state) => {
        if let Some(timer) = state.timer {
          timer.abort();
        }
        log::info!("Hiding slot {}", slot);
        self.surface.send(SurfaceCommand::Hide { slot });
      }
      None => {
        log::debug!("Hide requested for empty slot {}", slot);
      }
    }
  }

  /// Hide every visible slot.
  pub fn hide_all(&self) {
    let removed: Vec<(SlotId, SlotState)> = {
      let mut slots = self.slots.lock();
      slots.drain().collect()
    };

    for (slot, state) in removed {
      if let Some(timer) = state.timer {
        timer.abort();
      }
      self.surface.send(SurfaceCommand::Hide { slot });
    }
  }

  /// Snapshot the visible slots for status reporting.
  pub fn visible(&self) -> Vec<SlotView> {
    let now = tokio::time::Instant::now();
    let slots = self.slots.lock();
    let mut views: Vec<SlotView> = slots
      .iter()
      .map(|(slot, state)| SlotView {
        slot: *slot,
        kind: state.content.kind(),
        remaining: state
          .deadline
          .map(|d| d.saturating_duration_since(now).as_secs_f64()),
      })
      .collect();
    views.sort_by_key(|v| v.slot.to_string());
    views
  }

  /// Play an interrupt clip: pause the program, clear overlays, show the
  /// clip fullscreen, then resume and restore the overlays that were up.
  ///
  /// Only one interrupt may run at a time; a second request fails fast with
  /// `Busy` rather than queueing. Restored slots keep the time they had
  /// left, not their original duration.
  pub async fn play_interrupt(&self, path: String) -> Result<(), InterruptError> {
    let _guard = self
      .interrupt_guard
      .try_lock()
      .map_err(|_| InterruptError::Busy)?;

    log::info!("Interrupt starting: {}", path);
    self.player.pause().await?;

    // Snapshot what is up, with remaining time, then clear the screen
    let saved = self.snapshot_and_clear();

    let (done_tx, done_rx) = oneshot::channel();
    {
      let mut pending = self.interrupt_done.lock();
      *pending = Some(done_tx);
    }

    self.surface.send(SurfaceCommand::ShowInterrupt { path });

    tokio::select! {
      result = done_rx => {
        if result.is_err() {
          log::warn!("Interrupt completion channel dropped, ending interrupt");
        }
      }
      _ = tokio::time::sleep(self.interrupt_max) => {
        log::warn!("Interrupt hit its {:?} ceiling, forcing end", self.interrupt_max);
        self.interrupt_done.lock().take();
      }
    }

    self.surface.send(SurfaceCommand::HideInterrupt);

    let resume = self.player.play().await;

    // Restore overlays even if resume failed; the screen should not stay bare
    for request in saved {
      self.show(request);
    }

    resume.map_err(InterruptError::ResumeFailed)?;
    log::info!("Interrupt finished, playback resumed");
    Ok(())
  }

  /// Drain the slot table into restore requests carrying remaining time.
  fn snapshot_and_clear(&self) -> Vec<OverlayRequest> {
    let now = tokio::time::Instant::now();
    let drained: Vec<(SlotId, SlotState)> = {
      let mut slots = self.slots.lock();
      slots.drain().collect()
    };

    let mut saved = Vec::with_capacity(drained.len());
    for (slot, state) in drained {
      if let Some(timer) = state.timer {
        timer.abort();
      }
      let remaining = state.deadline.map(|d| d.saturating_duration_since(now));
      if let Some(r) = remaining {
        if r.is_zero() {
          // Would have expired during the interrupt anyway
          self.surface.send(SurfaceCommand::Hide { slot });
          continue;
        }
      }
      self.surface.send(SurfaceCommand::Hide { slot });
      saved.push(OverlayRequest {
        slot,
        content: state.content,
        geometry: state.geometry,
        duration: remaining,
      });
    }
    saved
  }

  /// Stop the event listener and clear the screen.
  pub fn shutdown(&self) {
    self.cancel.cancel();
    self.hide_all();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::mpv::EngineSettings;
  use crate::overlay::surface;
  use tokio::sync::mpsc::UnboundedReceiver;

  fn scheduler() -> (
    OverlayScheduler,
    UnboundedReceiver<SurfaceCommand>,
    async_channel::Sender<SurfaceEvent>,
  ) {
    let (handle, commands) = surface::channel();
    let (event_tx, event_rx) = async_channel::unbounded();
    let player = Arc::new(MpvClient::new(EngineSettings::default()));
    let sched = OverlayScheduler::new(handle, event_rx, player, Duration::from_secs(60));
    (sched, commands, event_tx)
  }

  fn text(body: &str) -> OverlayContent {
    OverlayContent::Text {
      body: body.to_string(),
      scroll: false,
    }
  }

  fn request(slot: SlotId, body: &str, duration: Option<f64>) -> OverlayRequest {
    OverlayRequest::new(slot, text(body), Geometry::default(), duration).unwrap()
  }

  #[tokio::test]
  async fn test_show_and_hide() {
    let (sched, mut commands, _events) = scheduler();

    sched.show(request(SlotId::Bottom, "hello", None));
    assert!(matches!(
      commands.recv().await.unwrap(),
      SurfaceCommand::Show { slot: SlotId::Bottom, .. }
    ));
    assert_eq!(sched.visible().len(), 1);

    sched.hide(SlotId::Bottom);
    assert!(matches!(
      commands.recv().await.unwrap(),
      SurfaceCommand::Hide { slot: SlotId::Bottom }
    ));
    assert!(sched.visible().is_empty());
  }

  #[tokio::test]
  async fn test_hide_empty_slot_is_noop() {
    let (sched, mut commands, _events) = scheduler();
    sched.hide(SlotId::Side);
    // No Hide command may be issued for a slot that shows nothing
    assert!(commands.try_recv().is_err());
  }

  #[tokio::test(start_paused = true)]
  async fn test_slot_expires_after_duration() {
    let (sched, mut commands, _events) = scheduler();

    sched.show(request(SlotId::Bottom, "short-lived", Some(5.0)));
    let _ = commands.recv().await.unwrap();

    tokio::time::advance(Duration::from_secs(6)).await;
    // Let the timer task run
    tokio::task::yield_now().await;

    assert!(matches!(
      commands.recv().await.unwrap(),
      SurfaceCommand::Hide { slot: SlotId::Bottom }
    ));
    assert!(sched.visible().is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_replace_cancels_old_timer() {
    let (sched, mut commands, _events) = scheduler();

    sched.show(request(SlotId::Bottom, "first", Some(5.0)));
    let _ = commands.recv().await.unwrap();

    // Replace with indefinite content before the first expires
    tokio::time::advance(Duration::from_secs(2)).await;
    sched.show(request(SlotId::Bottom, "second", None));
    let _ = commands.recv().await.unwrap();

    // Well past the first deadline: the slot must still be visible
    tokio::time::advance(Duration::from_secs(10)).await;
    tokio::task::yield_now().await;

    assert!(commands.try_recv().is_err());
    let visible = sched.visible();
    assert_eq!(visible.len(), 1);
    assert!(visible[0].remaining.is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn test_slots_are_independent() {
    let (sched, mut commands, _events) = scheduler();

    sched.show(request(SlotId::Bottom, "ticker", Some(5.0)));
    sched.show(request(SlotId::Side, "banner", None));
    let _ = commands.recv().await.unwrap();
    let _ = commands.recv().await.unwrap();

    tokio::time::advance(Duration::from_secs(6)).await;
    tokio::task::yield_now().await;

    assert!(matches!(
      commands.recv().await.unwrap(),
      SurfaceCommand::Hide { slot: SlotId::Bottom }
    ));
    let visible = sched.visible();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].slot, SlotId::Side);
  }

  #[tokio::test]
  async fn test_hide_all_clears_everything() {
    let (sched, mut commands, _events) = scheduler();

    sched.show(request(SlotId::Bottom, "a", None));
    sched.show(request(SlotId::Side, "b", None));
    let _ = commands.recv().await.unwrap();
    let _ = commands.recv().await.unwrap();

    sched.hide_all();
    let mut hidden = 0;
    while let Ok(cmd) = commands.try_recv() {
      assert!(matches!(cmd, SurfaceCommand::Hide { .. }));
      hidden += 1;
    }
    assert_eq!(hidden, 2);
    assert!(sched.visible().is_empty());
  }
}
