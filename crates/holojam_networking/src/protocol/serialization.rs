//! # Envelope Serialization
//!
//! Little-endian, length-prefixed encoding of [`FrameEnvelope`]s.
//!
//! ## Design
//!
//! - Encoding writes straight into a pre-allocated [`FrameBuffer`]
//! - The full encoded size is computed first, so an oversized envelope is
//!   rejected before a single byte is written
//! - Decoding never panics; every malformed input maps to a [`DecodeError`]

use holojam_shared::{Quaternion, Vec3};

use super::envelope::{FrameEnvelope, Handedness, WireRecord};
use super::frame_buffer::FrameBuffer;
use crate::error::{DecodeError, EncodeError};

/// Protocol revision written into every envelope.
pub const PROTOCOL_VERSION: u8 = 1;

/// Envelope flag: records are in a left-handed frame.
pub const FLAG_LEFT_HANDED: u8 = 1 << 0;

/// Record flag: the sender currently tracks the object.
pub const RECORD_TRACKED: u8 = 1 << 0;

/// Record flag: a blob follows the record flags.
pub const RECORD_HAS_BLOB: u8 = 1 << 1;

/// Size of an envelope with an empty source tag and no records.
///
/// version (1) + flags (1) + frame id (4) + source length (2) + record count (2)
pub const ENVELOPE_HEADER_LEN: usize = 10;

/// Size of a record with an empty label and no blob.
///
/// label length (2) + position (12) + orientation (16) + bits (4) + flags (1)
pub const RECORD_FIXED_LEN: usize = 35;

fn string_len(field: &'static str, value: &str) -> Result<usize, EncodeError> {
    if value.len() > usize::from(u16::MAX) {
        return Err(EncodeError::StringTooLong { field, len: value.len() });
    }
    Ok(2 + value.len())
}

/// Computes the encoded size of an envelope, validating its length prefixes.
pub fn encoded_len(envelope: &FrameEnvelope) -> Result<usize, EncodeError> {
    if envelope.records.len() > usize::from(u16::MAX) {
        return Err(EncodeError::TooManyRecords(envelope.records.len()));
    }

    let mut size = ENVELOPE_HEADER_LEN - 2 + string_len("source", &envelope.source)?;
    for record in &envelope.records {
        size += RECORD_FIXED_LEN - 2 + string_len("label", &record.label)?;
        if let Some(blob) = &record.blob {
            size += string_len("blob", blob)?;
        }
    }
    Ok(size)
}

/// Envelope serializer - writes into a borrowed frame buffer.
pub struct EnvelopeSerializer<'a> {
    buffer: &'a mut FrameBuffer,
    position: usize,
}

impl<'a> EnvelopeSerializer<'a> {
    /// Creates a serializer positioned at the start of `buffer`.
    pub fn new(buffer: &'a mut FrameBuffer) -> Self {
        Self { buffer, position: 0 }
    }

    /// Returns the number of bytes written.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.position
    }

    /// Returns true if no bytes have been written.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.position == 0
    }

    #[inline]
    fn put(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        let end = self.position + bytes.len();
        let capacity = self.buffer.capacity();
        if end > capacity {
            return Err(EncodeError::TooLarge { size: end, capacity });
        }
        self.buffer.storage_mut()[self.position..end].copy_from_slice(bytes);
        self.position = end;
        Ok(())
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) -> Result<(), EncodeError> {
        self.put(&[value])
    }

    /// Writes a u16 in little-endian format.
    #[inline]
    pub fn write_u16(&mut self, value: u16) -> Result<(), EncodeError> {
        self.put(&value.to_le_bytes())
    }

    /// Writes a u32 in little-endian format.
    #[inline]
    pub fn write_u32(&mut self, value: u32) -> Result<(), EncodeError> {
        self.put(&value.to_le_bytes())
    }

    /// Writes a f32 in little-endian format.
    #[inline]
    pub fn write_f32(&mut self, value: f32) -> Result<(), EncodeError> {
        self.put(&value.to_le_bytes())
    }

    /// Writes a u16 length prefix followed by the UTF-8 bytes.
    pub fn write_str(&mut self, field: &'static str, value: &str) -> Result<(), EncodeError> {
        let len = u16::try_from(value.len())
            .map_err(|_| EncodeError::StringTooLong { field, len: value.len() })?;
        self.write_u16(len)?;
        self.put(value.as_bytes())
    }

    fn write_record(&mut self, record: &WireRecord) -> Result<(), EncodeError> {
        self.write_str("label", &record.label)?;
        for c in record.position.to_array() {
            self.write_f32(c)?;
        }
        for c in record.orientation.to_array() {
            self.write_f32(c)?;
        }
        self.write_u32(record.button_bits)?;

        let mut flags = 0u8;
        if record.tracked {
            flags |= RECORD_TRACKED;
        }
        if record.blob.is_some() {
            flags |= RECORD_HAS_BLOB;
        }
        self.write_u8(flags)?;

        if let Some(blob) = &record.blob {
            self.write_str("blob", blob)?;
        }
        Ok(())
    }

    /// Serializes a complete envelope and tags the buffer with its frame id.
    ///
    /// Returns the encoded length. On error the buffer is left empty.
    pub fn serialize(mut self, envelope: &FrameEnvelope) -> Result<usize, EncodeError> {
        self.position = 0;
        self.buffer.clear();

        let size = encoded_len(envelope)?;
        let capacity = self.buffer.capacity();
        if size > capacity {
            return Err(EncodeError::TooLarge { size, capacity });
        }

        let count = u16::try_from(envelope.records.len())
            .map_err(|_| EncodeError::TooManyRecords(envelope.records.len()))?;
        let flags = if envelope.handedness.is_left() { FLAG_LEFT_HANDED } else { 0 };

        self.write_u8(PROTOCOL_VERSION)?;
        self.write_u8(flags)?;
        self.write_u32(envelope.frame_id)?;
        self.write_str("source", &envelope.source)?;
        self.write_u16(count)?;
        for record in &envelope.records {
            self.write_record(record)?;
        }

        self.buffer.set_len(self.position);
        self.buffer.set_frame_id(envelope.frame_id);
        Ok(self.position)
    }
}

/// Encodes `envelope` into `buffer`, returning the datagram length.
pub fn encode_envelope(envelope: &FrameEnvelope, buffer: &mut FrameBuffer) -> Result<usize, EncodeError> {
    EnvelopeSerializer::new(buffer).serialize(envelope)
}

/// Envelope deserializer - reads from a datagram.
pub struct EnvelopeDeserializer<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> EnvelopeDeserializer<'a> {
    /// Creates a new deserializer from a datagram.
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, position: 0 }
    }

    /// Returns the number of bytes remaining.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    #[inline]
    fn take(&mut self, needed: usize) -> Result<&'a [u8], DecodeError> {
        if needed > self.remaining() {
            return Err(DecodeError::Truncated {
                offset: self.position,
                needed,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buffer[self.position..self.position + needed];
        self.position += needed;
        Ok(slice)
    }

    #[inline]
    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take_array::<1>()?[0])
    }

    /// Reads a u16 in little-endian format.
    #[inline]
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        self.take_array().map(u16::from_le_bytes)
    }

    /// Reads a u32 in little-endian format.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        self.take_array().map(u32::from_le_bytes)
    }

    /// Reads a f32 in little-endian format.
    #[inline]
    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        self.take_array().map(f32::from_le_bytes)
    }

    /// Reads `N` consecutive little-endian f32 values.
    pub fn read_f32s<const N: usize>(&mut self) -> Result<[f32; N], DecodeError> {
        let mut values = [0.0; N];
        for value in &mut values {
            *value = self.read_f32()?;
        }
        Ok(values)
    }

    /// Reads a u16 length prefix and that many UTF-8 bytes.
    pub fn read_str(&mut self, field: &'static str) -> Result<String, DecodeError> {
        let len = usize::from(self.read_u16()?);
        let offset = self.position;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8 { field, offset })
    }

    fn read_record(&mut self) -> Result<WireRecord, DecodeError> {
        let label = self.read_str("label")?;
        let position = Vec3::from_array(self.read_f32s()?);
        let orientation = Quaternion::from_array(self.read_f32s()?);
        let button_bits = self.read_u32()?;
        let flags = self.read_u8()?;
        let blob = if flags & RECORD_HAS_BLOB != 0 {
            Some(self.read_str("blob")?)
        } else {
            None
        };

        Ok(WireRecord {
            label,
            position,
            orientation,
            button_bits,
            blob,
            tracked: flags & RECORD_TRACKED != 0,
        })
    }

    /// Deserializes a complete envelope; the datagram must be consumed exactly.
    pub fn deserialize(&mut self) -> Result<FrameEnvelope, DecodeError> {
        let version = self.read_u8()?;
        if version != PROTOCOL_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        let flags = self.read_u8()?;
        let frame_id = self.read_u32()?;
        let source = self.read_str("source")?;
        let count = usize::from(self.read_u16()?);

        // Every record needs at least RECORD_FIXED_LEN bytes; a lying count
        // must not drive a huge allocation.
        let mut records = Vec::with_capacity(count.min(self.remaining() / RECORD_FIXED_LEN));
        for _ in 0..count {
            records.push(self.read_record()?);
        }

        if self.remaining() > 0 {
            return Err(DecodeError::TrailingBytes(self.remaining()));
        }

        Ok(FrameEnvelope {
            frame_id,
            handedness: Handedness::from_left_flag(flags & FLAG_LEFT_HANDED != 0),
            source,
            records,
        })
    }
}

/// Decodes one datagram into an envelope.
pub fn decode_envelope(datagram: &[u8]) -> Result<FrameEnvelope, DecodeError> {
    EnvelopeDeserializer::new(datagram).deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(label: &str, blob: Option<&str>, tracked: bool) -> WireRecord {
        WireRecord {
            label: label.to_owned(),
            position: Vec3::new(1.5, -2.25, 3.0),
            orientation: Quaternion::new(0.1, 0.2, 0.3, 0.9),
            button_bits: 0b1010,
            blob: blob.map(str::to_owned),
            tracked,
        }
    }

    fn sample() -> FrameEnvelope {
        let mut envelope = FrameEnvelope::new(42, Handedness::Left, "tracker");
        envelope.push(record("VR1", None, true));
        envelope.push(record("VR2", Some("{\"score\":3}"), false));
        envelope.push(record("VR3", Some(""), true));
        envelope
    }

    #[test]
    fn test_serialize_deserialize_envelope() {
        let envelope = sample();
        let mut buffer = FrameBuffer::new(1024);

        let len = encode_envelope(&envelope, &mut buffer).unwrap();
        assert_eq!(len, encoded_len(&envelope).unwrap());
        assert_eq!(buffer.len(), len);
        assert_eq!(buffer.frame_id(), Some(42));

        let decoded = decode_envelope(buffer.as_slice()).unwrap();
        assert_eq!(decoded, envelope);
        // empty blob and absent blob stay distinct
        assert_eq!(decoded.records[0].blob, None);
        assert_eq!(decoded.records[2].blob.as_deref(), Some(""));
    }

    #[test]
    fn test_reencode_is_bit_exact() {
        let mut first = FrameBuffer::new(1024);
        encode_envelope(&sample(), &mut first).unwrap();

        let decoded = decode_envelope(first.as_slice()).unwrap();
        let mut second = FrameBuffer::new(1024);
        encode_envelope(&decoded, &mut second).unwrap();

        assert_eq!(first.as_slice(), second.as_slice());
    }

    #[test]
    fn test_special_floats_survive() {
        let mut envelope = FrameEnvelope::new(1, Handedness::Right, "");
        let mut r = record("odd", None, true);
        r.position = Vec3::new(f32::NAN, -0.0, f32::INFINITY);
        envelope.push(r);

        let mut buffer = FrameBuffer::new(256);
        encode_envelope(&envelope, &mut buffer).unwrap();
        let decoded = decode_envelope(buffer.as_slice()).unwrap();

        let p = decoded.records[0].position;
        assert_eq!(p.x.to_bits(), f32::NAN.to_bits());
        assert_eq!(p.y.to_bits(), (-0.0f32).to_bits());
        assert_eq!(p.z, f32::INFINITY);
    }

    #[test]
    fn test_empty_envelope_size() {
        let envelope = FrameEnvelope::new(0, Handedness::Right, "");
        let mut buffer = FrameBuffer::new(64);
        assert_eq!(encode_envelope(&envelope, &mut buffer).unwrap(), ENVELOPE_HEADER_LEN);

        let decoded = decode_envelope(buffer.as_slice()).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.handedness, Handedness::Right);
    }

    #[test]
    fn test_record_size() {
        let mut envelope = FrameEnvelope::new(0, Handedness::Right, "");
        envelope.push(record("", None, false));
        assert_eq!(encoded_len(&envelope).unwrap(), ENVELOPE_HEADER_LEN + RECORD_FIXED_LEN);
    }

    #[test]
    fn test_oversized_envelope_rejected() {
        let mut envelope = FrameEnvelope::new(0, Handedness::Right, "");
        for i in 0..100 {
            envelope.push(record(&format!("object-{i}"), None, true));
        }
        let mut buffer = FrameBuffer::new(512);

        let err = encode_envelope(&envelope, &mut buffer).unwrap_err();
        assert!(matches!(err, EncodeError::TooLarge { capacity: 512, .. }));
        assert!(buffer.is_empty());
        assert_eq!(buffer.frame_id(), None);
    }

    #[test]
    fn test_long_label_rejected() {
        let mut envelope = FrameEnvelope::new(0, Handedness::Right, "");
        envelope.push(record(&"x".repeat(70_000), None, true));
        let mut buffer = FrameBuffer::new(128);

        let err = encode_envelope(&envelope, &mut buffer).unwrap_err();
        assert_eq!(err, EncodeError::StringTooLong { field: "label", len: 70_000 });
    }

    #[test]
    fn test_truncated_datagram() {
        let mut buffer = FrameBuffer::new(1024);
        let len = encode_envelope(&sample(), &mut buffer).unwrap();

        for cut in [0, 1, 5, ENVELOPE_HEADER_LEN + 3, len - 1] {
            let err = decode_envelope(&buffer.as_slice()[..cut]).unwrap_err();
            assert!(matches!(err, DecodeError::Truncated { .. }), "cut {cut}: {err:?}");
        }
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut buffer = FrameBuffer::new(1024);
        let len = encode_envelope(&sample(), &mut buffer).unwrap();
        let mut bytes = buffer.as_slice().to_vec();
        bytes.extend_from_slice(&[0, 0]);

        assert_eq!(decode_envelope(&bytes), Err(DecodeError::TrailingBytes(2)));
        assert!(decode_envelope(&bytes[..len]).is_ok());
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut buffer = FrameBuffer::new(1024);
        encode_envelope(&sample(), &mut buffer).unwrap();
        let mut bytes = buffer.as_slice().to_vec();
        bytes[0] = 9;

        assert_eq!(decode_envelope(&bytes), Err(DecodeError::UnsupportedVersion(9)));
    }

    #[test]
    fn test_invalid_utf8_label() {
        let mut envelope = FrameEnvelope::new(3, Handedness::Right, "");
        envelope.push(record("ab", None, true));
        let mut buffer = FrameBuffer::new(256);
        encode_envelope(&envelope, &mut buffer).unwrap();

        let mut bytes = buffer.as_slice().to_vec();
        // label bytes start right after the header and the label length
        bytes[ENVELOPE_HEADER_LEN + 2] = 0xFF;

        let err = decode_envelope(&bytes).unwrap_err();
        assert_eq!(err, DecodeError::InvalidUtf8 { field: "label", offset: ENVELOPE_HEADER_LEN + 2 });
    }

    #[test]
    fn test_lying_record_count() {
        let envelope = FrameEnvelope::new(3, Handedness::Right, "");
        let mut buffer = FrameBuffer::new(64);
        encode_envelope(&envelope, &mut buffer).unwrap();

        let mut bytes = buffer.as_slice().to_vec();
        let count_at = ENVELOPE_HEADER_LEN - 2;
        bytes[count_at..count_at + 2].copy_from_slice(&u16::MAX.to_le_bytes());

        assert!(matches!(decode_envelope(&bytes), Err(DecodeError::Truncated { .. })));
    }
}
