//! Programmable stand-in for the MPV engine.
//!
//! Listens on a unix socket, records every command line it receives, and
//! answers the way the real engine would: one newline-terminated JSON reply
//! per command, correlated by request_id. Reply behavior is switchable so
//! tests can exercise timeouts and engine-reported failures.

#![cfg(unix)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, WriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;

/// How the engine answers incoming commands.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReplyMode {
  /// Success replies, with property data where known.
  Normal,
  /// Swallow commands without answering, to force timeouts.
  Mute,
  /// Fail the next command with an engine error, then back to Normal.
  FailNext,
}

type SharedWriter = Arc<tokio::sync::Mutex<Option<WriteHalf<UnixStream>>>>;

pub struct FakeEngine {
  pub socket_path: String,
  _dir: tempfile::TempDir,
  commands: Arc<Mutex<Vec<Value>>>,
  properties: Arc<Mutex<HashMap<String, Value>>>,
  mode: Arc<Mutex<ReplyMode>>,
  writer: SharedWriter,
  _accept_handle: JoinHandle<()>,
}

impl FakeEngine {
  /// Bind a fresh socket and start accepting connections.
  pub fn spawn() -> Self {
    let dir = tempfile::tempdir().expect("tempdir");
    let socket_path = dir
      .path()
      .join("engine.sock")
      .to_string_lossy()
      .into_owned();

    let listener = UnixListener::bind(&socket_path).expect("bind fake engine socket");

    let commands: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let mut initial = HashMap::new();
    initial.insert("pause".to_string(), json!(false));
    initial.insert("time-pos".to_string(), json!(12.5));
    initial.insert("volume".to_string(), json!(80.0));
    let properties = Arc::new(Mutex::new(initial));
    let mode = Arc::new(Mutex::new(ReplyMode::Normal));
    let writer: SharedWriter = Arc::new(tokio::sync::Mutex::new(None));

    let accept_commands = commands.clone();
    let accept_properties = properties.clone();
    let accept_mode = mode.clone();
    let accept_writer = writer.clone();
    let accept_handle = tokio::spawn(async move {
      while let Ok((stream, _)) = listener.accept().await {
        let (read_half, write_half) = tokio::io::split(stream);
        *accept_writer.lock().await = Some(write_half);

        let commands = accept_commands.clone();
        let properties = accept_properties.clone();
        let mode = accept_mode.clone();
        let writer = accept_writer.clone();
        tokio::spawn(async move {
          Self::serve_connection(read_half, writer, commands, properties, mode).await;
        });
      }
    });

    Self {
      socket_path,
      _dir: dir,
      commands,
      properties,
      mode,
      writer,
      _accept_handle: accept_handle,
    }
  }

  async fn serve_connection(
    read_half: tokio::io::ReadHalf<UnixStream>,
    writer: SharedWriter,
    commands: Arc<Mutex<Vec<Value>>>,
    properties: Arc<Mutex<HashMap<String, Value>>>,
    mode: Arc<Mutex<ReplyMode>>,
  ) {
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
      line.clear();
      match reader.read_line(&mut line).await {
        Ok(0) | Err(_) => break,
        Ok(_) => {}
      }
      let trimmed = line.trim();
      if trimmed.is_empty() {
        continue;
      }

      let Ok(parsed) = serde_json::from_str::<Value>(trimmed) else {
        continue;
      };
      commands.lock().push(parsed.clone());

      let request_id = parsed["request_id"].as_i64().unwrap_or(0);
      let reply = {
        let mut mode = mode.lock();
        match *mode {
          ReplyMode::Mute => None,
          ReplyMode::FailNext => {
            *mode = ReplyMode::Normal;
            Some(json!({
              "error": "error running command",
              "data": null,
              "request_id": request_id,
            }))
          }
          ReplyMode::Normal => {
            let args = parsed["command"].as_array().cloned().unwrap_or_default();
            let name = args.first().and_then(Value::as_str).unwrap_or("");
            let data = match name {
              "get_property" => {
                let prop = args.get(1).and_then(Value::as_str).unwrap_or("");
                properties.lock().get(prop).cloned().unwrap_or(Value::Null)
              }
              "set_property" => {
                if let (Some(prop), Some(value)) =
                  (args.get(1).and_then(Value::as_str), args.get(2))
                {
                  properties.lock().insert(prop.to_string(), value.clone());
                }
                Value::Null
              }
              _ => Value::Null,
            };
            Some(json!({
              "error": "success",
              "data": data,
              "request_id": request_id,
            }))
          }
        }
      };

      if let Some(reply) = reply {
        let mut guard = writer.lock().await;
        if let Some(w) = guard.as_mut() {
          let mut bytes = reply.to_string().into_bytes();
          bytes.push(b'\n');
          if w.write_all(&bytes).await.is_err() {
            break;
          }
        }
      }
    }
  }

  /// Commands received so far, in arrival order.
  pub fn received(&self) -> Vec<Value> {
    self.commands.lock().clone()
  }

  pub fn set_mode(&self, mode: ReplyMode) {
    *self.mode.lock() = mode;
  }

  pub fn set_property(&self, name: &str, value: Value) {
    self.properties.lock().insert(name.to_string(), value);
  }

  /// Push an arbitrary line to the connected client (events, stale replies).
  pub async fn send_raw(&self, line: &str) {
    for _ in 0..50 {
      {
        let mut guard = self.writer.lock().await;
        if let Some(w) = guard.as_mut() {
          w.write_all(line.as_bytes()).await.expect("raw write");
          w.write_all(b"\n").await.expect("raw newline");
          return;
        }
      }
      tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("no client connected");
  }

  /// Wait until at least `count` commands have arrived.
  pub async fn wait_for_commands(&self, count: usize) -> Vec<Value> {
    for _ in 0..50 {
      let received = self.received();
      if received.len() >= count {
        return received;
      }
      tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
      "fake engine saw {} commands, expected {}",
      self.received().len(),
      count
    );
  }
}
