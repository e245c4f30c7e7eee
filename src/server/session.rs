//! Per-connection streaming state
//!
//! A [`StreamSession`] is the body of one `/stream.mjpg` response: it waits
//! for a frame newer than the last one it produced, encodes it as one
//! multipart part and repeats. The stream ends on server shutdown. When the
//! peer hangs up or a write fails, the connection drops the body and with it
//! the session, which is where the session is accounted for.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::response::Response;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::buffer::{FrameBuffer, FrameId};
use crate::http::multipart;
use crate::stats::{ServerStats, SessionStats};

/// Connection identity handed to request handlers
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Unique session ID
    pub session_id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Cancelled when the server shuts down
    pub shutdown: CancellationToken,
}

impl SessionContext {
    pub fn new(session_id: u64, peer_addr: SocketAddr, shutdown: CancellationToken) -> Self {
        Self {
            session_id,
            peer_addr,
            shutdown,
        }
    }
}

/// One client's MJPEG stream
pub struct StreamSession {
    context: SessionContext,
    buffer: Arc<FrameBuffer>,
    server_stats: Arc<ServerStats>,
    stats: SessionStats,
    last_seen: Option<FrameId>,
}

impl StreamSession {
    pub fn new(
        context: SessionContext,
        buffer: Arc<FrameBuffer>,
        server_stats: Arc<ServerStats>,
    ) -> Self {
        server_stats.stream_started();
        tracing::debug!(
            session_id = context.session_id,
            peer = %context.peer_addr,
            "Stream started"
        );

        Self {
            context,
            buffer,
            server_stats,
            stats: SessionStats::new(),
            last_seen: None,
        }
    }

    /// Wait for a newer frame and encode it as one part
    ///
    /// Returns `None` once the server shuts down.
    pub async fn next_part(&mut self) -> Option<Bytes> {
        let frame = tokio::select! {
            _ = self.context.shutdown.cancelled() => return None,
            frame = self.buffer.await_next(self.last_seen) => frame,
        };

        let part = multipart::encode_part(frame.data());
        self.stats.record_part(part.len());
        self.server_stats.record_part(part.len());
        self.last_seen = Some(frame.id());

        Some(part)
    }

    /// The stream response, with this session producing its body
    pub fn into_response(self) -> Response {
        let parts = futures_util::stream::unfold(self, |mut session| async move {
            let part = session.next_part().await?;
            Some((Ok::<_, Infallible>(part), session))
        });

        multipart::stream_response(Body::from_stream(parts))
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.server_stats.stream_ended();

        if self.context.shutdown.is_cancelled() {
            tracing::debug!(
                session_id = self.context.session_id,
                peer = %self.context.peer_addr,
                frames = self.stats.frames_sent,
                duration = ?self.stats.duration(),
                "Stream ended by shutdown"
            );
        } else {
            tracing::warn!(
                session_id = self.context.session_id,
                peer = %self.context.peer_addr,
                frames = self.stats.frames_sent,
                bytes = self.stats.bytes_sent,
                duration = ?self.stats.duration(),
                "Removed streaming client"
            );
        }
    }
}
