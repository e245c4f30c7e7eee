//! HTTP server: accept loop, configuration and per-connection streams

pub mod config;
pub mod listener;
pub mod session;

pub use config::ServerConfig;
pub use listener::MjpegServer;
pub use session::{SessionContext, StreamSession};
