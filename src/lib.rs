//! Motion-JPEG over HTTP
//!
//! Serves the most recent JPEG frame from a single producer to any number of
//! browser connections as a `multipart/x-mixed-replace` stream.
//!
//! ```text
//!  [FrameSource] --write_frame--> [FrameBuffer] --await_next--> [StreamSession] --> TCP
//!                                      |                 \----> [StreamSession] --> TCP
//!                                      |                  \---> [StreamSession] --> TCP
//!                                single slot, latest value
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mjpeg_rs::source::{Recording, SourceConfig, TestPattern};
//! use mjpeg_rs::{MjpegServer, ServerConfig};
//!
//! # async fn example() -> mjpeg_rs::Result<()> {
//! let server = MjpegServer::new(ServerConfig::default().port(8000));
//!
//! let source = TestPattern::new(SourceConfig::default());
//! let _recording = Recording::start(Box::new(source), server.buffer().clone())?;
//!
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod error;
pub mod http;
pub mod server;
pub mod source;
pub mod stats;

pub use buffer::{Frame, FrameBuffer, FrameId, FrameSink};
pub use error::{Error, Result};
pub use server::{MjpegServer, ServerConfig};
