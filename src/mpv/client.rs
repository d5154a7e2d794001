//! High-level player facade over the MPV engine session.

use std::path::{Path, PathBuf};
use std::process::Child;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use super::ipc::{IpcError, MpvIpc};
use super::process::{
  cleanup_socket, session_socket_path, spawn_engine, wait_for_socket, ProcessError,
};
use super::protocol::{MpvCommand, MpvResponse, PropertyValue};

#[derive(Error, Debug)]
pub enum MpvError {
  #[error("Process error: {0}")]
  Process(#[from] ProcessError),
  #[error("IPC error: {0}")]
  Ipc(#[from] IpcError),
  #[error("MPV command failed: {0}")]
  CommandFailed(String),
  #[error("Not connected")]
  NotConnected,
}

/// Read-only playback snapshot, recomputed on each query.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerStatus {
  pub playing: bool,
  pub position: f64,
  pub volume: f64,
  pub connected: bool,
}

impl PlayerStatus {
  fn disconnected() -> Self {
    Self {
      playing: false,
      position: 0.0,
      volume: 100.0,
      connected: false,
    }
  }
}

/// Timing knobs for engine startup and IPC.
#[derive(Debug, Clone)]
pub struct EngineSettings {
  /// Custom MPV executable path (None = auto-detect).
  pub mpv_path: Option<PathBuf>,
  /// Additional MPV command-line arguments.
  pub extra_args: Vec<String>,
  /// Budget for the IPC socket to appear after spawning.
  pub startup_wait: Duration,
  /// Connect attempts once the socket exists.
  pub connect_retries: u32,
  /// Per-command reply timeout.
  pub reply_timeout: Duration,
}

impl Default for EngineSettings {
  fn default() -> Self {
    Self {
      mpv_path: None,
      extra_args: Vec::new(),
      startup_wait: Duration::from_secs(10),
      connect_retries: 10,
      reply_timeout: Duration::from_secs(5),
    }
  }
}

/// High-level MPV client owning the engine session.
pub struct MpvClient {
  settings: EngineSettings,
  process: Arc<Mutex<Option<Child>>>,
  ipc: Arc<Mutex<Option<Arc<MpvIpc>>>>,
  socket_path: Arc<Mutex<Option<String>>>,
}

impl MpvClient {
  /// Create a new MPV client.
  pub fn new(settings: EngineSettings) -> Self {
    Self {
      settings,
      process: Arc::new(Mutex::new(None)),
      ipc: Arc::new(Mutex::new(None)),
      socket_path: Arc::new(Mutex::new(None)),
    }
  }

  /// Launch the engine against a media directory and connect to its IPC
  /// socket. Any prior session is released first.
  pub async fn start(&self, media_dir: &Path) -> Result<(), MpvError> {
    if self.is_connected() {
      log::info!("Restarting engine session");
      self.shutdown().await;
    }

    let socket = session_socket_path();
    let mut child = spawn_engine(
      self.settings.mpv_path.as_ref(),
      media_dir,
      &socket,
      &self.settings.extra_args,
    )?;

    if let Err(e) = wait_for_socket(&socket, &mut child, self.settings.startup_wait).await {
      log::error!("Engine socket never became ready: {}", e);
      let _ = child.kill();
      let _ = child.wait();
      cleanup_socket(&socket);
      return Err(e.into());
    }

    {
      let mut process = self.process.lock();
      *process = Some(child);
    }

    match self.connect_to(&socket).await {
      Ok(()) => {
        log::info!("MPV client connected on {}", socket);
        Ok(())
      }
      Err(e) => {
        // No partially-initialized session may stay reachable
        self.release_process().await;
        cleanup_socket(&socket);
        Err(e)
      }
    }
  }

  /// Connect to an already-listening engine socket without spawning a
  /// process (attach mode; also the seam the integration tests use).
  pub async fn connect_to(&self, socket_path: &str) -> Result<(), MpvError> {
    let conn = MpvIpc::connect(
      socket_path,
      self.settings.connect_retries,
      self.settings.reply_timeout,
    )
    .await?;

    {
      let mut ipc = self.ipc.lock();
      *ipc = Some(Arc::new(conn));
    }
    {
      let mut path = self.socket_path.lock();
      *path = Some(socket_path.to_string());
    }
    Ok(())
  }

  /// Check if an IPC session is live.
  pub fn is_connected(&self) -> bool {
    self.ipc.lock().is_some()
  }

  fn get_ipc(&self) -> Result<Arc<MpvIpc>, MpvError> {
    let guard = self.ipc.lock();
    guard.clone().ok_or(MpvError::NotConnected)
  }

  /// Send a command to MPV, mapping an engine-reported error to a failure.
  async fn send(&self, cmd: MpvCommand) -> Result<MpvResponse, MpvError> {
    let ipc = self.get_ipc()?;
    let response = ipc.send_command(cmd).await?;

    if !response.is_success() {
      return Err(MpvError::CommandFailed(response.error));
    }

    Ok(response)
  }

  /// Resume playback.
  pub async fn play(&self) -> Result<(), MpvError> {
    self.send(MpvCommand::set_pause(false)).await?;
    Ok(())
  }

  /// Pause playback.
  pub async fn pause(&self) -> Result<(), MpvError> {
    self.send(MpvCommand::set_pause(true)).await?;
    Ok(())
  }

  /// Skip to the next playlist entry.
  pub async fn next(&self) -> Result<(), MpvError> {
    self.send(MpvCommand::playlist_next()).await?;
    Ok(())
  }

  /// Skip to the previous playlist entry.
  pub async fn previous(&self) -> Result<(), MpvError> {
    self.send(MpvCommand::playlist_prev()).await?;
    Ok(())
  }

  /// Seek relative to the current position (negative = backward).
  pub async fn seek_relative(&self, seconds: f64) -> Result<(), MpvError> {
    self.send(MpvCommand::seek_relative(seconds)).await?;
    Ok(())
  }

  /// Set volume, clamping to 0-100. Returns the applied value.
  pub async fn set_volume(&self, volume: f64) -> Result<f64, MpvError> {
    let clamped = volume.clamp(0.0, 100.0);
    if clamped != volume {
      log::info!("Clamping volume {} -> {}", volume, clamped);
    }
    self.send(MpvCommand::set_volume(clamped)).await?;
    Ok(clamped)
  }

  /// Get a property value.
  pub async fn get_property(&self, name: &str) -> Result<PropertyValue, MpvError> {
    let response = self.send(MpvCommand::get_property(name)).await?;
    Ok(
      response
        .data
        .map(PropertyValue::from)
        .unwrap_or(PropertyValue::Null),
    )
  }

  /// Assemble a playback status snapshot.
  ///
  /// A dead or absent connection yields `connected: false` defaults instead
  /// of an error, so status queries never fail the caller.
  pub async fn status(&self) -> PlayerStatus {
    if !self.is_connected() {
      return PlayerStatus::disconnected();
    }

    let paused = match self.get_property("pause").await {
      Ok(PropertyValue::Bool(b)) => b,
      Ok(_) => true,
      Err(e) => {
        log::warn!("Status query failed, reporting disconnected: {}", e);
        return PlayerStatus::disconnected();
      }
    };

    let position = match self.get_property("time-pos").await {
      Ok(PropertyValue::Number(n)) => n,
      _ => 0.0,
    };

    let volume = match self.get_property("volume").await {
      Ok(PropertyValue::Number(n)) => n,
      _ => 100.0,
    };

    PlayerStatus {
      playing: !paused,
      position,
      volume,
      connected: true,
    }
  }

  /// Shut the session down: ask the engine to quit so it saves its resume
  /// position, wait briefly, then terminate whatever is left.
  pub async fn shutdown(&self) {
    log::info!("Shutting down engine session");

    // Best-effort clean quit over IPC
    let sent_quit = if self.is_connected() {
      self.send(MpvCommand::quit()).await.is_ok()
    } else {
      false
    };

    // Release the connection handle
    {
      let mut ipc = self.ipc.lock();
      if let Some(conn) = ipc.take() {
        conn.close();
      }
    }

    if sent_quit {
      // Give the engine a moment to exit cleanly
      for _ in 0..15 {
        let exited = {
          let mut process = self.process.lock();
          match process.as_mut() {
            Some(child) => child.try_wait().map(|s| s.is_some()).unwrap_or(true),
            None => true,
          }
        };
        if exited {
          break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
      }
    }

    self.release_process().await;

    if let Some(socket) = self.socket_path.lock().take() {
      cleanup_socket(&socket);
    }

    log::info!("Engine session released");
  }

  /// Kill and reap the engine process, off the async runtime.
  async fn release_process(&self) {
    let child = {
      let mut process = self.process.lock();
      process.take()
    };

    if let Some(mut child) = child {
      let pid = child.id();
      log::info!("Terminating MPV process (pid: {:?})", pid);

      let result = tokio::task::spawn_blocking(move || {
        let kill_result = child.kill();
        let wait_result = child.wait();
        (kill_result, wait_result)
      })
      .await;

      match result {
        Ok((kill_result, wait_result)) => {
          if let Err(e) = kill_result {
            log::debug!("kill() failed (already exited?): {}", e);
          }
          match wait_result {
            Ok(status) => log::info!("MPV process exited with: {}", status),
            Err(e) => log::error!("wait() failed: {}", e),
          }
        }
        Err(e) => {
          log::error!("spawn_blocking panicked during process cleanup: {}", e);
        }
      }
    }
  }
}

// Need to implement Clone manually because Child doesn't implement Clone
impl Clone for MpvClient {
  fn clone(&self) -> Self {
    Self {
      settings: self.settings.clone(),
      process: self.process.clone(),
      ipc: self.ipc.clone(),
      socket_path: self.socket_path.clone(),
    }
  }
}
