//! MPV IPC module - spawns and controls the external MPV engine via JSON IPC.
//!
//! Architecture:
//! - `process.rs` - MPV binary detection, per-session socket paths, spawning
//! - `ipc.rs` - Async IPC connection with a strictly serial request slot
//! - `protocol.rs` - JSON command/response/event types and serialization
//! - `client.rs` - High-level player facade with command methods

mod client;
mod ipc;
mod process;
mod protocol;

pub use client::{EngineSettings, MpvClient, MpvError, PlayerStatus};
pub use ipc::IpcError;
pub use process::ProcessError;
pub use protocol::PropertyValue;
