//! Signage player entry point.
//!
//! Launches the MPV engine against the media directory, wires the overlay
//! scheduler to a drawing surface, and serves the control API until SIGINT
//! or SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use signage_player::api::{self, AppContext};
use signage_player::mpv::MpvClient;
use signage_player::overlay::{self, OverlayScheduler};
use signage_player::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "signage-player")]
#[command(about = "Kiosk media playback daemon with overlay scheduling")]
#[command(version)]
struct Args {
  /// Config file path (default: platform config directory)
  #[arg(short, long, env = "SIGNAGE_CONFIG")]
  config: Option<PathBuf>,

  /// Media directory override
  #[arg(short, long, env = "SIGNAGE_MEDIA_DIR")]
  media_dir: Option<PathBuf>,

  /// API port override
  #[arg(short, long, env = "SIGNAGE_PORT")]
  port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "signage_player=info,tower_http=info".into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let args = Args::parse();

  let mut config = AppConfig::load(args.config.as_deref()).context("Failed to load config")?;
  if let Some(media_dir) = args.media_dir {
    config.media_dir = media_dir;
  }
  if let Some(port) = args.port {
    config.port = port;
  }

  log::info!("Starting signage player");
  log::info!("Media directory: {}", config.media_dir.display());

  let player = Arc::new(MpvClient::new(config.engine_settings()));
  player
    .start(&config.media_dir)
    .await
    .context("Failed to start playback engine")?;

  // Drawing surface: headless backend consuming render commands on its own
  // task, reporting back over the event channel
  let (surface, surface_commands) = overlay::surface_channel();
  let (event_tx, event_rx) = async_channel::unbounded();
  let surface_cancel = CancellationToken::new();
  let surface_task = tokio::spawn(overlay::run_headless(
    surface_commands,
    event_tx,
    surface_cancel.clone(),
  ));

  let overlays = Arc::new(OverlayScheduler::new(
    surface,
    event_rx,
    player.clone(),
    config.interrupt_max(),
  ));

  let ctx = AppContext {
    player: player.clone(),
    overlays: overlays.clone(),
  };
  let app = api::router(ctx);

  let addr = SocketAddr::new(config.bind, config.port);
  log::info!("Starting HTTP server on {}", addr);
  let listener = tokio::net::TcpListener::bind(addr)
    .await
    .with_context(|| format!("Failed to bind to {}", addr))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

  log::info!("Shutting down");
  overlays.shutdown();
  player.shutdown().await;
  surface_cancel.cancel();
  let _ = surface_task.await;
  log::info!("Shutdown complete");
  Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = signal::ctrl_c().await {
      log::error!("Failed to install Ctrl+C handler: {}", e);
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
      Ok(mut term) => {
        term.recv().await;
      }
      Err(e) => {
        log::error!("Failed to install SIGTERM handler: {}", e);
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => log::info!("Received Ctrl+C"),
    _ = terminate => log::info!("Received SIGTERM"),
  }
}
