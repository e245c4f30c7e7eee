//! HTTP surface
//!
//! - Route table and viewer page, served by an axum [`Router`](axum::Router)
//! - Multipart framing for the JPEG stream

pub mod multipart;
pub mod route;

pub use route::{router, AppState};
