//! API module - the externally reachable command dispatcher.
//!
//! Architecture:
//! - `server.rs` - Router construction and shared handler context
//! - `handlers.rs` - Per-endpoint validation and dispatch
//! - `error.rs` - Internal error to response-code mapping

mod error;
mod handlers;
mod server;

pub use error::ApiError;
pub use server::{router, AppContext};
