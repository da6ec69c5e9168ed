//! # Telemetry Protocol
//!
//! Binary envelope carried in every datagram.
//!
//! ## Envelope Structure
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (10 bytes + source tag)                               │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Version (1) │ Flags (1) │ Frame Id (4) │ Source (2+n) │ Count (2) │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Records (Count times)                                         │
//! │   Label (2+n) │ Position (12) │ Orientation (16) │ Bits (4)   │
//! │   Flags (1) │ [Blob (2+n)]                                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Philosophy
//!
//! - Best effort: no acks, no retransmits, the next frame repairs any loss
//! - Frame ids let receivers drop late and duplicated datagrams whole
//! - Every envelope is self-contained; there is no delta state to corrupt

mod envelope;
mod frame_buffer;
mod serialization;

pub use envelope::{FrameEnvelope, Handedness, WireRecord};
pub use frame_buffer::{FrameBuffer, FrameRotation};
pub use serialization::{decode_envelope, encode_envelope, ENVELOPE_HEADER_LEN};
