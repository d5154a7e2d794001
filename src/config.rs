//! Application configuration.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mpv::EngineSettings;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("Failed to read config file {path}: {source}")]
  Read {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("Failed to parse config file {path}: {source}")]
  Parse {
    path: PathBuf,
    source: toml::de::Error,
  },
  #[error("Invalid configuration: {0}")]
  Invalid(String),
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppConfig {
  /// Directory the engine scans into its playlist.
  #[serde(default = "default_media_dir")]
  pub media_dir: PathBuf,

  /// Custom MPV executable path (None = auto-detect).
  #[serde(default)]
  pub mpv_path: Option<String>,

  /// Additional MPV command-line arguments.
  #[serde(default)]
  pub mpv_args: Vec<String>,

  /// Address the API server binds to.
  #[serde(default = "default_bind")]
  pub bind: IpAddr,

  /// Port the API server listens on.
  #[serde(default = "default_port")]
  pub port: u16,

  /// Budget for the engine IPC socket to appear, in seconds.
  #[serde(default = "default_startup_wait")]
  pub startup_wait_secs: u64,

  /// IPC connect attempts once the socket exists.
  #[serde(default = "default_connect_retries")]
  pub connect_retries: u32,

  /// Per-command IPC reply timeout, in seconds.
  #[serde(default = "default_reply_timeout")]
  pub reply_timeout_secs: u64,

  /// Ceiling on interrupt clip playback, in seconds.
  #[serde(default = "default_interrupt_max")]
  pub interrupt_max_secs: u64,
}

fn default_media_dir() -> PathBuf {
  PathBuf::from("media")
}

fn default_bind() -> IpAddr {
  IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
  5000
}

fn default_startup_wait() -> u64 {
  10
}

fn default_connect_retries() -> u32 {
  10
}

fn default_reply_timeout() -> u64 {
  5
}

fn default_interrupt_max() -> u64 {
  60
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      media_dir: default_media_dir(),
      mpv_path: None,
      mpv_args: Vec::new(),
      bind: default_bind(),
      port: default_port(),
      startup_wait_secs: default_startup_wait(),
      connect_retries: default_connect_retries(),
      reply_timeout_secs: default_reply_timeout(),
      interrupt_max_secs: default_interrupt_max(),
    }
  }
}

impl AppConfig {
  /// Default config file location, under the platform config directory.
  pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("signage-player").join("config.toml"))
  }

  /// Load configuration from a TOML file.
  ///
  /// An explicitly named file must exist; the default-location file is
  /// optional and its absence yields the defaults.
  pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
    let (path, required) = match path {
      Some(p) => (p.to_path_buf(), true),
      None => match Self::default_path() {
        Some(p) => (p, false),
        None => return Ok(Self::default()),
      },
    };

    let text = match std::fs::read_to_string(&path) {
      Ok(text) => text,
      Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
        log::debug!("No config file at {:?}, using defaults", path);
        return Ok(Self::default());
      }
      Err(source) => return Err(ConfigError::Read { path, source }),
    };

    let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
      path: path.clone(),
      source,
    })?;
    config.validate()?;
    log::info!("Loaded config from {:?}", path);
    Ok(config)
  }

  /// Validate configuration values.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.startup_wait_secs == 0 {
      return Err(ConfigError::Invalid(
        "startup-wait-secs must be at least 1".to_string(),
      ));
    }
    if self.connect_retries == 0 {
      return Err(ConfigError::Invalid(
        "connect-retries must be at least 1".to_string(),
      ));
    }
    if self.reply_timeout_secs == 0 {
      return Err(ConfigError::Invalid(
        "reply-timeout-secs must be at least 1".to_string(),
      ));
    }
    if self.interrupt_max_secs == 0 {
      return Err(ConfigError::Invalid(
        "interrupt-max-secs must be at least 1".to_string(),
      ));
    }
    Ok(())
  }

  /// Engine timing knobs derived from this config.
  pub fn engine_settings(&self) -> EngineSettings {
    EngineSettings {
      mpv_path: self
        .mpv_path
        .as_ref()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from),
      extra_args: self.mpv_args.clone(),
      startup_wait: Duration::from_secs(self.startup_wait_secs),
      connect_retries: self.connect_retries,
      reply_timeout: Duration::from_secs(self.reply_timeout_secs),
    }
  }

  pub fn interrupt_max(&self) -> Duration {
    Duration::from_secs(self.interrupt_max_secs)
  }
}
