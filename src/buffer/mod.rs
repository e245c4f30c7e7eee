//! Latest-frame buffer shared by the producer and every streaming session
//!
//! The buffer holds at most one frame: the most recent one. Publishing
//! replaces it and wakes every waiting session. There is no backlog, so a
//! slow session skips frames instead of accumulating them.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<FrameBuffer>
//!                 ┌──────────────────────────┐
//!                 │ slot: watch::Sender<     │
//!                 │   Option<Frame>          │
//!                 │ >                        │
//!                 └────────────┬─────────────┘
//!                              │
//!       ┌──────────────────────┼──────────────────────┐
//!       │                      │                      │
//!       ▼                      ▼                      ▼
//!  [FrameSource]         [StreamSession]        [StreamSession]
//!  write_frame()         await_next(last)       await_next(last)
//!       │                      │                      │
//!       └──► publish() ──► notify all ──► write part ──► TCP
//! ```
//!
//! # Zero-Copy Design
//!
//! Frames carry `bytes::Bytes`, so every session that wakes on the same
//! publish shares one reference-counted allocation.

pub mod frame;
pub mod store;

pub use frame::{Frame, FrameId};
pub use store::{FrameBuffer, FrameSink};
