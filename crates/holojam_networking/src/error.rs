//! # Telemetry Error Types
//!
//! Every failure the transport can observe. None of these ever reach the
//! consumer's tick loop as a panic: workers log them and carry on, or stop
//! themselves when the failure is fatal to their socket.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// A datagram that could not be turned into an envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The datagram ended before a field was complete.
    #[error("truncated datagram: needed {needed} bytes at offset {offset}, {remaining} left")]
    Truncated {
        /// Offset of the incomplete field.
        offset: usize,
        /// Bytes the field needs.
        needed: usize,
        /// Bytes left in the datagram.
        remaining: usize,
    },

    /// The version byte names a protocol revision this build does not speak.
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    /// A label, source tag or blob is not valid UTF-8.
    #[error("invalid UTF-8 in {field} at offset {offset}")]
    InvalidUtf8 {
        /// Which string field was malformed.
        field: &'static str,
        /// Offset of the string payload.
        offset: usize,
    },

    /// Bytes remain after the last record.
    #[error("{0} trailing bytes after the last record")]
    TrailingBytes(usize),

    /// The datagram is larger than the receive buffer.
    #[error("oversize datagram: {len} bytes, capacity {capacity}")]
    Oversize {
        /// Bytes received, or `capacity + 1` when the socket cut it short.
        len: usize,
        /// Capacity of the receive buffer.
        capacity: usize,
    },
}

/// An envelope that cannot be written into a frame buffer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The encoded envelope does not fit the buffer capacity.
    #[error("envelope too large: {size} bytes, capacity {capacity}")]
    TooLarge {
        /// Bytes the envelope needs.
        size: usize,
        /// Capacity of the target buffer.
        capacity: usize,
    },

    /// A string field exceeds the u16 length prefix.
    #[error("{field} too long: {len} bytes (max 65535)")]
    StringTooLong {
        /// Which string field overflowed.
        field: &'static str,
        /// Its length in bytes.
        len: usize,
    },

    /// More records than the u16 count prefix can describe.
    #[error("too many records: {0} (max 65535)")]
    TooManyRecords(usize),
}

/// Invalid or unreadable node configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config {path}: {source}")]
    Read {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The values parse but contradict each other.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Umbrella error for the transport.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// A worker could not set up its socket.
    #[error("cannot bind {channel} socket on {addr}: {source}")]
    Bind {
        /// Channel name used in logs.
        channel: String,
        /// Address that failed to bind.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A worker thread could not be spawned.
    #[error("cannot spawn {channel} worker thread: {source}")]
    Spawn {
        /// Channel name used in logs.
        channel: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Datagram decode failure.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Envelope encode failure.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for transport operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
