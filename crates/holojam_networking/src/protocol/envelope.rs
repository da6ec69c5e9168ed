//! # Envelope Definitions
//!
//! One envelope is one UDP datagram: a frame id, the handedness of the
//! sender's coordinate system, a sender tag, and the records of every object
//! the sender is publishing for that frame.

use holojam_shared::{Quaternion, Vec3};

/// Coordinate-system handedness of the sender.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Handedness {
    /// Right-handed (what nodes and collectors use internally).
    #[default]
    Right,
    /// Left-handed (what the motion-capture tracker emits).
    Left,
}

impl Handedness {
    /// Maps the wire flag onto a handedness.
    #[inline]
    #[must_use]
    pub const fn from_left_flag(left: bool) -> Self {
        if left {
            Self::Left
        } else {
            Self::Right
        }
    }

    /// Returns true for left-handed senders.
    #[inline]
    #[must_use]
    pub const fn is_left(self) -> bool {
        matches!(self, Self::Left)
    }

    /// Converts a pose from this frame into the right-handed frame.
    ///
    /// Left-handed poses have x negated, and the quaternion's x and w
    /// negated. y, z, qy and qz pass through untouched. Right-handed poses
    /// are returned unchanged.
    #[inline]
    #[must_use]
    pub fn to_right_handed(self, position: Vec3, orientation: Quaternion) -> (Vec3, Quaternion) {
        match self {
            Self::Right => (position, orientation),
            Self::Left => (
                Vec3::new(-position.x, position.y, position.z),
                Quaternion::new(-orientation.x, orientation.y, orientation.z, -orientation.w),
            ),
        }
    }
}

/// One object record as it travels on the wire.
///
/// Values are in the sender's coordinate frame; no conversion has been
/// applied yet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WireRecord {
    /// Object label, the key consumers look it up by.
    pub label: String,
    /// Position.
    pub position: Vec3,
    /// Orientation.
    pub orientation: Quaternion,
    /// Button state bit mask.
    pub button_bits: u32,
    /// Opaque application payload.
    pub blob: Option<String>,
    /// Whether the sender currently sees the object.
    pub tracked: bool,
}

/// A complete frame from one sender.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameEnvelope {
    /// Sender's frame counter.
    pub frame_id: u32,
    /// Coordinate frame of every record in this envelope.
    pub handedness: Handedness,
    /// Free-form sender tag.
    pub source: String,
    /// Records in sender order.
    pub records: Vec<WireRecord>,
}

impl FrameEnvelope {
    /// Creates an empty envelope.
    #[must_use]
    pub fn new(frame_id: u32, handedness: Handedness, source: impl Into<String>) -> Self {
        Self {
            frame_id,
            handedness,
            source: source.into(),
            records: Vec::new(),
        }
    }

    /// Appends a record.
    pub fn push(&mut self, record: WireRecord) {
        self.records.push(record);
    }

    /// Number of records.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the envelope carries no records.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_left_handed_conversion() {
        let (p, q) = Handedness::Left.to_right_handed(
            Vec3::new(1.0, 2.0, 3.0),
            Quaternion::new(0.1, 0.2, 0.3, 0.9),
        );
        assert_eq!(p, Vec3::new(-1.0, 2.0, 3.0));
        assert_eq!(q, Quaternion::new(-0.1, 0.2, 0.3, -0.9));
    }

    #[test]
    fn test_right_handed_passthrough() {
        let position = Vec3::new(1.0, 2.0, 3.0);
        let orientation = Quaternion::new(0.1, 0.2, 0.3, 0.9);
        let (p, q) = Handedness::Right.to_right_handed(position, orientation);
        assert_eq!(p, position);
        assert_eq!(q, orientation);
    }

    #[test]
    fn test_flag_mapping() {
        assert_eq!(Handedness::from_left_flag(true), Handedness::Left);
        assert_eq!(Handedness::from_left_flag(false), Handedness::Right);
        assert!(Handedness::Left.is_left());
        assert!(!Handedness::default().is_left());
    }
}
