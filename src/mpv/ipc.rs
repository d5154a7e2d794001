//! Async IPC connection to MPV.
//!
//! The engine speaks a request/response protocol over one connection, so
//! commands are sent strictly serially: a single outstanding request at a
//! time, correlated by request ID. Replies that do not match the outstanding
//! ID are logged and discarded; unsolicited engine events are parsed and
//! dropped so they can never be mistaken for replies.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::protocol::{MpvCommand, MpvMessage, MpvResponse};

#[derive(Error, Debug)]
pub enum IpcError {
  #[error("Connection failed: {0}")]
  ConnectionFailed(String),
  #[error("Write failed: {0}")]
  WriteFailed(#[from] std::io::Error),
  #[error("Command timeout")]
  Timeout,
  #[error("Disconnected")]
  Disconnected,
}

/// Pending request waiting for response.
type PendingRequest = oneshot::Sender<Result<MpvResponse, IpcError>>;

/// The single outstanding request slot shared between sender and reader.
struct IpcState {
  pending: Option<(i64, PendingRequest)>,
}

/// Writer channel message.
enum WriteMessage {
  Command(Vec<u8>),
  Close,
}

/// MPV IPC connection.
pub struct MpvIpc {
  state: Arc<Mutex<IpcState>>,
  write_tx: async_channel::Sender<WriteMessage>,
  /// Serializes send/await cycles so only one request is ever outstanding.
  send_lock: tokio::sync::Mutex<()>,
  reply_timeout: Duration,
  _reader_handle: JoinHandle<()>,
  _writer_handle: JoinHandle<()>,
}

impl MpvIpc {
  /// Connect to the MPV IPC socket/pipe with bounded retry.
  pub async fn connect(
    path: &str,
    retry_count: u32,
    reply_timeout: Duration,
  ) -> Result<Self, IpcError> {
    let mut last_error = None;

    for attempt in 0..retry_count {
      if attempt > 0 {
        tokio::time::sleep(Duration::from_millis(100 * (attempt as u64 + 1))).await;
      }

      match Self::try_connect(path, reply_timeout).await {
        Ok(ipc) => return Ok(ipc),
        Err(e) => {
          log::debug!("IPC connect attempt {} failed: {}", attempt + 1, e);
          last_error = Some(e);
        }
      }
    }

    Err(last_error.unwrap_or_else(|| IpcError::ConnectionFailed("Unknown error".into())))
  }

  #[cfg(windows)]
  async fn try_connect(path: &str, reply_timeout: Duration) -> Result<Self, IpcError> {
    use tokio::net::windows::named_pipe::ClientOptions;

    let client = ClientOptions::new()
      .open(path)
      .map_err(|e| IpcError::ConnectionFailed(format!("Failed to open pipe: {}", e)))?;

    let (reader, writer) = tokio::io::split(client);
    Self::setup(reader, writer, reply_timeout)
  }

  #[cfg(not(windows))]
  async fn try_connect(path: &str, reply_timeout: Duration) -> Result<Self, IpcError> {
    use tokio::net::UnixStream;

    let stream = UnixStream::connect(path)
      .await
      .map_err(|e| IpcError::ConnectionFailed(e.to_string()))?;

    let (reader, writer) = tokio::io::split(stream);
    Self::setup(reader, writer, reply_timeout)
  }

  fn setup<R, W>(reader: R, writer: W, reply_timeout: Duration) -> Result<Self, IpcError>
  where
    R: tokio::io::AsyncRead + Send + Unpin + 'static,
    W: tokio::io::AsyncWrite + Send + Unpin + 'static,
  {
    let state = Arc::new(Mutex::new(IpcState { pending: None }));

    let (write_tx, write_rx) = async_channel::unbounded::<WriteMessage>();

    // Spawn reader task
    let reader_state = state.clone();
    let reader_handle = tokio::spawn(async move {
      Self::reader_loop(reader, reader_state).await;
    });

    // Spawn writer task
    let writer_handle = tokio::spawn(async move {
      Self::writer_loop(writer, write_rx).await;
    });

    Ok(Self {
      state,
      write_tx,
      send_lock: tokio::sync::Mutex::new(()),
      reply_timeout,
      _reader_handle: reader_handle,
      _writer_handle: writer_handle,
    })
  }

  async fn reader_loop<R: tokio::io::AsyncRead + Unpin>(reader: R, state: Arc<Mutex<IpcState>>) {
    log::debug!("MPV IPC reader loop started");
    let mut buf_reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
      line.clear();
      match buf_reader.read_line(&mut line).await {
        Ok(0) => {
          log::info!("MPV IPC connection closed");
          break;
        }
        Ok(_) => {
          let trimmed = line.trim();
          if trimmed.is_empty() {
            continue;
          }

          match MpvMessage::parse(trimmed) {
            Ok(MpvMessage::Response(response)) => {
              let mut state = state.lock();
              match state.pending.take() {
                Some((id, tx)) if id == response.request_id => {
                  let _ = tx.send(Ok(response));
                }
                Some(other) => {
                  // Stale reply from a timed-out request; keep waiting for ours
                  log::warn!(
                    "Discarding uncorrelated MPV response request_id={} (outstanding={})",
                    response.request_id,
                    other.0
                  );
                  state.pending = Some(other);
                }
                None => {
                  log::warn!(
                    "Discarding MPV response request_id={} with no outstanding request",
                    response.request_id
                  );
                }
              }
            }
            Ok(MpvMessage::Event(event)) => {
              log::debug!("MPV event: {} (reason={:?})", event.event, event.reason);
            }
            Err(e) => {
              log::warn!("Failed to parse MPV message: {} - {}", e, trimmed);
            }
          }
        }
        Err(e) => {
          log::error!("MPV IPC read error: {}", e);
          break;
        }
      }
    }

    // Fail the outstanding request so its sender is not left hanging
    if let Some((id, tx)) = state.lock().pending.take() {
      log::warn!("Connection lost with request_id={} outstanding", id);
      let _ = tx.send(Err(IpcError::Disconnected));
    }
  }

  async fn writer_loop<W: tokio::io::AsyncWrite + Unpin>(
    mut writer: W,
    write_rx: async_channel::Receiver<WriteMessage>,
  ) {
    log::debug!("MPV IPC writer loop started");

    while let Ok(msg) = write_rx.recv().await {
      match msg {
        WriteMessage::Command(data) => {
          if let Err(e) = writer.write_all(&data).await {
            log::error!("MPV IPC write error: {}", e);
            break;
          }
          if let Err(e) = writer.write_all(b"\n").await {
            log::error!("MPV IPC write newline error: {}", e);
            break;
          }
          if let Err(e) = writer.flush().await {
            log::error!("MPV IPC flush error: {}", e);
            break;
          }
        }
        WriteMessage::Close => {
          log::info!("MPV IPC writer closing");
          break;
        }
      }
    }
  }

  /// Send a command to MPV and wait for its reply.
  ///
  /// Requests are serialized: concurrent callers queue on the send lock and
  /// reach the engine in a strict per-connection order.
  pub async fn send_command(&self, cmd: MpvCommand) -> Result<MpvResponse, IpcError> {
    let _permit = self.send_lock.lock().await;

    let request_id = cmd.request_id;
    let (tx, rx) = oneshot::channel();

    {
      let mut state = self.state.lock();
      state.pending = Some((request_id, tx));
    }

    let json = serde_json::to_string(&cmd).map_err(|e| IpcError::WriteFailed(e.into()))?;
    log::debug!("Sending MPV command: {}", json);

    if self
      .write_tx
      .send(WriteMessage::Command(json.into_bytes()))
      .await
      .is_err()
    {
      self.state.lock().pending = None;
      return Err(IpcError::Disconnected);
    }

    match tokio::time::timeout(self.reply_timeout, rx).await {
      Ok(Ok(result)) => result,
      Ok(Err(_)) => {
        log::error!("MPV IPC reply channel closed unexpectedly");
        Err(IpcError::Disconnected)
      }
      Err(_) => {
        log::error!(
          "MPV command timeout after {:?}, request_id={}",
          self.reply_timeout,
          request_id
        );
        // Clear the slot so a late reply is discarded instead of matched
        let mut state = self.state.lock();
        if matches!(state.pending, Some((id, _)) if id == request_id) {
          state.pending = None;
        }
        Err(IpcError::Timeout)
      }
    }
  }

  /// Close the connection; idempotent.
  pub fn close(&self) {
    let _ = self.write_tx.send_blocking(WriteMessage::Close);
  }
}
