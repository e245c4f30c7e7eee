//! Statistics for streaming sessions and the server

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Per-session statistics
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// Multipart parts handed to the connection
    pub frames_sent: u64,
    /// Total bytes handed to the connection, part headers included
    pub bytes_sent: u64,
    /// When the session started
    pub started_at: Instant,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            frames_sent: 0,
            bytes_sent: 0,
            started_at: Instant::now(),
        }
    }

    /// Record one written part
    pub fn record_part(&mut self, bytes: usize) {
        self.frames_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    /// Time since the session started
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Server-wide counters, shared by every connection task
#[derive(Debug, Default)]
pub struct ServerStats {
    connections_total: AtomicU64,
    connections_active: AtomicU64,
    connections_rejected: AtomicU64,
    streams_active: AtomicU64,
    frames_sent: AtomicU64,
    bytes_sent: AtomicU64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn connection_opened(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_rejected(&self) {
        self.connections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn stream_started(&self) {
        self.streams_active.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn stream_ended(&self) {
        self.streams_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn record_part(&self, bytes: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> ServerStatsSnapshot {
        ServerStatsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            connections_rejected: self.connections_rejected.load(Ordering::Relaxed),
            streams_active: self.streams_active.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
        }
    }
}

/// Copy of [`ServerStats`] at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStatsSnapshot {
    /// Connections accepted since start
    pub connections_total: u64,
    /// Connections currently open
    pub connections_active: u64,
    /// Connections closed because of the connection limit
    pub connections_rejected: u64,
    /// Sessions currently inside the streaming loop
    pub streams_active: u64,
    /// Parts written across all sessions
    pub frames_sent: u64,
    /// Bytes written across all streaming sessions
    pub bytes_sent: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_record_part() {
        let mut stats = SessionStats::new();
        stats.record_part(100);
        stats.record_part(50);

        assert_eq!(stats.frames_sent, 2);
        assert_eq!(stats.bytes_sent, 150);
    }

    #[test]
    fn test_session_duration_grows() {
        let stats = SessionStats::new();
        let first = stats.duration();
        std::thread::sleep(Duration::from_millis(5));

        assert!(stats.duration() > first);
    }

    #[test]
    fn test_server_counters() {
        let stats = ServerStats::new();

        stats.connection_opened();
        stats.connection_opened();
        stats.stream_started();
        stats.record_part(10);
        stats.connection_closed();
        stats.connection_rejected();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.connections_total, 2);
        assert_eq!(snapshot.connections_active, 1);
        assert_eq!(snapshot.connections_rejected, 1);
        assert_eq!(snapshot.streams_active, 1);
        assert_eq!(snapshot.frames_sent, 1);
        assert_eq!(snapshot.bytes_sent, 10);

        stats.stream_ended();
        assert_eq!(stats.snapshot().streams_active, 0);
    }
}
