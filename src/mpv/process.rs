//! MPV engine detection and process spawning.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
  #[error("MPV executable not found")]
  NotFound,
  #[error("Media directory does not exist: {0}")]
  MediaDirMissing(PathBuf),
  #[error("Failed to spawn MPV: {0}")]
  SpawnFailed(#[from] std::io::Error),
  #[error("MPV exited during startup with status {0}")]
  EngineExited(String),
  #[error("IPC socket did not appear within {0:?}")]
  SocketTimeout(Duration),
}

/// Generate a fresh IPC socket/pipe path unique to one engine session.
pub fn session_socket_path() -> String {
  let id = uuid::Uuid::new_v4();
  #[cfg(windows)]
  {
    format!(r"\\.\pipe\signage-mpv-{id}")
  }
  #[cfg(not(windows))]
  {
    format!("/tmp/signage-mpv-{id}.sock")
  }
}

/// Find MPV executable in common locations.
pub fn find_mpv() -> Option<PathBuf> {
  // Check PATH first
  if let Ok(path) = which::which("mpv") {
    return Some(path);
  }

  // Platform-specific common locations
  #[cfg(windows)]
  {
    let common_paths = [
      r"C:\Program Files\mpv\mpv.exe",
      r"C:\Program Files (x86)\mpv\mpv.exe",
      r"C:\mpv\mpv.exe",
    ];
    for path in common_paths {
      let p = PathBuf::from(path);
      if p.exists() {
        return Some(p);
      }
    }
  }

  #[cfg(target_os = "macos")]
  {
    let common_paths = [
      "/usr/local/bin/mpv",
      "/opt/homebrew/bin/mpv",
      "/Applications/mpv.app/Contents/MacOS/mpv",
    ];
    for path in common_paths {
      let p = PathBuf::from(path);
      if p.exists() {
        return Some(p);
      }
    }
  }

  #[cfg(target_os = "linux")]
  {
    let common_paths = ["/usr/bin/mpv", "/usr/local/bin/mpv"];
    for path in common_paths {
      let p = PathBuf::from(path);
      if p.exists() {
        return Some(p);
      }
    }
  }

  None
}

/// Spawn the MPV engine fullscreen against a media directory, with the IPC
/// server bound to `socket_path`.
///
/// The engine scans the directory into a playlist and autoplays it;
/// `--save-position-on-quit` makes a clean quit resume where it left off.
pub fn spawn_engine(
  mpv_path: Option<&PathBuf>,
  media_dir: &Path,
  socket_path: &str,
  extra_args: &[String],
) -> Result<Child, ProcessError> {
  let mpv_exe = mpv_path
    .cloned()
    .or_else(find_mpv)
    .ok_or(ProcessError::NotFound)?;

  if !media_dir.is_dir() {
    return Err(ProcessError::MediaDirMissing(media_dir.to_path_buf()));
  }

  cleanup_socket(socket_path);

  log::info!(
    "Spawning MPV: {:?} media_dir={:?} ipc={}",
    mpv_exe,
    media_dir,
    socket_path
  );
  if !extra_args.is_empty() {
    log::info!("Extra MPV args: {:?}", extra_args);
  }

  let mut cmd = Command::new(&mpv_exe);
  cmd
    .arg(media_dir)
    .arg(format!("--input-ipc-server={}", socket_path))
    .arg("--fullscreen=yes")
    .arg("--save-position-on-quit=yes")
    .arg("--keep-open=no")
    .arg("--idle=no")
    .arg("--no-terminal");

  // Add user-specified extra arguments
  for arg in extra_args {
    cmd.arg(arg);
  }

  let child = cmd
    .stdin(Stdio::null())
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    .spawn()?;

  Ok(child)
}

/// Poll until the engine's IPC socket appears, up to `budget`.
///
/// Fails fast if the engine process exits while we are waiting, so a broken
/// launch does not burn the whole wait budget.
pub async fn wait_for_socket(
  socket_path: &str,
  child: &mut Child,
  budget: Duration,
) -> Result<(), ProcessError> {
  let deadline = tokio::time::Instant::now() + budget;

  loop {
    if socket_exists(socket_path) {
      return Ok(());
    }

    if let Some(status) = child.try_wait()? {
      return Err(ProcessError::EngineExited(status.to_string()));
    }

    if tokio::time::Instant::now() >= deadline {
      return Err(ProcessError::SocketTimeout(budget));
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
  }
}

fn socket_exists(socket_path: &str) -> bool {
  #[cfg(windows)]
  {
    // Named pipes have no filesystem presence to poll; rely on connect retries
    let _ = socket_path;
    true
  }
  #[cfg(not(windows))]
  {
    Path::new(socket_path).exists()
  }
}

/// Remove a stale socket file, best effort.
pub fn cleanup_socket(socket_path: &str) {
  #[cfg(not(windows))]
  {
    let _ = std::fs::remove_file(socket_path);
  }
  // Windows named pipes are cleaned up automatically
  #[cfg(windows)]
  let _ = socket_path;
}
