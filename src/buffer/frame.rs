//! Frame types held by the buffer

use bytes::Bytes;

/// Identity of a published frame
///
/// Ids are assigned by the buffer in publish order, so a larger id is always
/// a later frame. Two frames with identical bytes still get different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(u64);

impl FrameId {
    /// Id of the first frame ever published
    pub const FIRST: FrameId = FrameId(1);

    /// Id assigned to the frame published after this one
    pub fn next(self) -> Self {
        FrameId(self.0 + 1)
    }

    /// Raw sequence number
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One complete encoded JPEG image
///
/// The bytes are opaque: nothing here decodes or validates them. Cloning is
/// cheap because `Bytes` is reference counted.
#[derive(Debug, Clone)]
pub struct Frame {
    id: FrameId,
    data: Bytes,
}

impl Frame {
    pub(super) fn new(id: FrameId, data: Bytes) -> Self {
        Self { id, data }
    }

    /// Identity assigned when the frame was published
    pub fn id(&self) -> FrameId {
        self.id
    }

    /// Encoded frame bytes
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Byte length, sent as `Content-Length`
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether this frame comes after `last_seen` in publish order
    pub fn is_newer_than(&self, last_seen: Option<FrameId>) -> bool {
        match last_seen {
            Some(seen) => self.id > seen,
            None => true,
        }
    }
}
