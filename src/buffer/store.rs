//! Single-slot frame buffer implementation
//!
//! The slot is a `tokio::sync::watch` channel: one value, replaced on every
//! publish, with change notification to every receiver.

use bytes::Bytes;
use tokio::sync::watch;

use super::frame::{Frame, FrameId};

/// Write side handed to a frame producer
///
/// Implemented by [`FrameBuffer`]. A producer calls `write_frame` once per
/// complete encoded JPEG image; it never blocks on readers.
pub trait FrameSink: Send + Sync {
    /// Deliver one complete encoded frame
    fn write_frame(&self, data: Bytes);
}

/// Latest-value frame buffer
///
/// Holds zero or one frame. Exactly one producer publishes; any number of
/// sessions wait for a frame newer than the one they last sent.
pub struct FrameBuffer {
    slot: watch::Sender<Option<Frame>>,
}

impl FrameBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self { slot }
    }

    /// Replace the current frame and wake every waiting session
    ///
    /// Never blocks and never fails, even with no readers. Returns the id
    /// assigned to the new frame.
    pub fn publish(&self, data: Bytes) -> FrameId {
        let mut id = FrameId::FIRST;

        self.slot.send_modify(|slot| {
            if let Some(current) = slot.as_ref() {
                id = current.id().next();
            }
            *slot = Some(Frame::new(id, data));
        });

        tracing::trace!(frame = %id, "Frame published");
        id
    }

    /// Wait for a frame newer than `last_seen`
    ///
    /// Returns immediately if the slot already holds one. Otherwise suspends
    /// until the next publish. There is no timeout: callers that need one
    /// (or need to stop on disconnect) race this future against their own
    /// and drop it.
    pub async fn await_next(&self, last_seen: Option<FrameId>) -> Frame {
        let mut rx = self.slot.subscribe();

        loop {
            {
                let slot = rx.borrow_and_update();
                if let Some(frame) = slot.as_ref() {
                    if frame.is_newer_than(last_seen) {
                        return frame.clone();
                    }
                }
            }

            if rx.changed().await.is_err() {
                // The sender is owned by `self`, which outlives this borrow.
                std::future::pending::<()>().await;
            }
        }
    }

    /// The current frame, if any has been published
    pub fn latest(&self) -> Option<Frame> {
        self.slot.borrow().clone()
    }

    /// Number of frames published so far
    pub fn published_count(&self) -> u64 {
        self.slot
            .borrow()
            .as_ref()
            .map_or(0, |frame| frame.id().get())
    }

    /// Number of sessions currently suspended in `await_next`
    pub fn waiting_count(&self) -> usize {
        self.slot.receiver_count()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for FrameBuffer {
    fn write_frame(&self, data: Bytes) {
        self.publish(data);
    }
}
