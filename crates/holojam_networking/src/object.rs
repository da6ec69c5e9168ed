//! # Tracked Objects
//!
//! The in-memory form of one labeled pose. Receive workers build these from
//! wire records (converting to the right-handed frame on the way in); send
//! workers turn them back into wire records unchanged.

use holojam_shared::{Quaternion, Vec3};

use crate::protocol::{Handedness, WireRecord};

/// One labeled pose in a right-handed frame.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedObject {
    /// Object label.
    pub label: String,
    /// Position.
    pub position: Vec3,
    /// Orientation.
    pub orientation: Quaternion,
    /// Button state bit mask.
    pub button_bits: u32,
    /// Opaque application payload.
    pub blob: Option<String>,
    /// Liveness flag. Cleared by staleness; the pose is kept.
    pub tracked: bool,
}

impl TrackedObject {
    /// An object with no data yet: origin, identity, untracked.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            position: Vec3::ZERO,
            orientation: Quaternion::IDENTITY,
            button_bits: 0,
            blob: None,
            tracked: false,
        }
    }

    /// Builds an object from a received record, applying the envelope's
    /// coordinate conversion exactly once.
    #[must_use]
    pub fn from_record(record: WireRecord, handedness: Handedness) -> Self {
        let (position, orientation) = handedness.to_right_handed(record.position, record.orientation);
        Self {
            label: record.label,
            position,
            orientation,
            button_bits: record.button_bits,
            blob: record.blob,
            tracked: record.tracked,
        }
    }

    /// Wire form for a right-handed envelope.
    #[must_use]
    pub fn to_record(&self) -> WireRecord {
        WireRecord {
            label: self.label.clone(),
            position: self.position,
            orientation: self.orientation,
            button_bits: self.button_bits,
            blob: self.blob.clone(),
            tracked: self.tracked,
        }
    }

    /// Copies pose, bits, blob and liveness from `other`, keeping the label.
    pub fn copy_state_from(&mut self, other: &Self) {
        self.position = other.position;
        self.orientation = other.orientation;
        self.button_bits = other.button_bits;
        self.blob.clone_from(&other.blob);
        self.tracked = other.tracked;
    }
}
