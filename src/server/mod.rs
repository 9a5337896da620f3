//! Server transport and connection lifecycle
//!
//! The accept loop, per-connection sessions and their configuration. The
//! transport is deliberately thin: one persistent TCP connection per client,
//! newline-delimited JSON text frames in both directions.

pub mod config;
pub mod listener;
pub mod session;

pub use config::ServerConfig;
pub use listener::Server;
pub use session::{Session, SessionPhase, SessionState};
