//! # Frame Buffers
//!
//! Fixed-capacity byte storage tagged with the frame id of its contents.
//! Allocated once per worker; the hot path only copies between buffers.

/// Byte buffer holding one datagram and the frame id decoded from it.
#[derive(Clone, Debug)]
pub struct FrameBuffer {
    bytes: Box<[u8]>,
    len: usize,
    frame_id: Option<u32>,
}

impl FrameBuffer {
    /// Creates a zeroed buffer of `capacity` bytes with no frame.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
            frame_id: None,
        }
    }

    /// Total capacity in bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Number of valid bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no bytes are valid.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Frame id of the contents, if any frame has been stored.
    #[inline]
    #[must_use]
    pub const fn frame_id(&self) -> Option<u32> {
        self.frame_id
    }

    /// Tags the contents with a frame id.
    #[inline]
    pub fn set_frame_id(&mut self, frame_id: u32) {
        self.frame_id = Some(frame_id);
    }

    /// The valid bytes.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// The whole storage, for socket reads and serializers.
    #[inline]
    pub fn storage_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Marks the first `len` bytes as valid (clamped to capacity).
    #[inline]
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(self.bytes.len());
    }

    /// Forgets the contents and the frame id.
    pub fn clear(&mut self) {
        self.len = 0;
        self.frame_id = None;
    }

    /// Copies contents, length and frame id from `other`.
    ///
    /// Buffers of one worker share a capacity; if they do not, the common
    /// prefix is copied and the length clamped.
    pub fn copy_from(&mut self, other: &Self) {
        let n = self.bytes.len().min(other.bytes.len());
        self.bytes[..n].copy_from_slice(&other.bytes[..n]);
        self.len = other.len.min(n);
        self.frame_id = other.frame_id;
    }
}

/// The previous/current/scratch rotation used by receive workers.
///
/// `current` receives the socket read. When the frame in `current` is
/// accepted the three rotate so that `previous` always holds the last
/// accepted frame and `current` is free for the next read.
#[derive(Debug)]
pub struct FrameRotation {
    /// Last accepted frame.
    pub previous: FrameBuffer,
    /// Frame being received.
    pub current: FrameBuffer,
    scratch: FrameBuffer,
}

impl FrameRotation {
    /// Creates three buffers of `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            previous: FrameBuffer::new(capacity),
            current: FrameBuffer::new(capacity),
            scratch: FrameBuffer::new(capacity),
        }
    }

    /// Frame id of the last accepted frame.
    #[inline]
    #[must_use]
    pub const fn last_accepted(&self) -> Option<u32> {
        self.previous.frame_id()
    }

    /// Returns true if `frame_id` is newer than the last accepted frame.
    #[inline]
    #[must_use]
    pub fn is_newer(&self, frame_id: u32) -> bool {
        self.last_accepted().map_or(true, |last| frame_id > last)
    }

    /// previous ← current, current ← old previous.
    pub fn rotate(&mut self) {
        self.scratch.copy_from(&self.previous);
        self.previous.copy_from(&self.current);
        self.current.copy_from(&self.scratch);
    }
}
