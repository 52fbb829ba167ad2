//! Error types for CARI frame parsing and encoding

use thiserror::Error;

/// Structural errors in a CARI frame
///
/// A frame that fails to decode is never answered; the device drops it and
/// the client is expected to retry after its own timeout.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Buffer is shorter than the 3-byte header
    #[error("truncated frame: {len} bytes, header needs 3")]
    Truncated { len: usize },

    /// Declared length disagrees with the number of bytes received
    #[error("length mismatch: header declares {declared} bytes, received {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// Encoded frame would not fit the 16-bit length field
    #[error("frame too long: {len} bytes exceeds the 16-bit length field")]
    TooLong { len: usize },
}

/// Errors converting raw protocol bytes into enumerations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Command id outside the command enumeration
    #[error("unknown command: 0x{0:02X}")]
    UnknownCommand(u8),

    /// Status byte outside the status enumeration
    #[error("unknown status code: {0}")]
    UnknownStatus(u8),

    /// Subdevice parameter id outside the parameter enumeration
    #[error("unknown subdevice parameter: {0}")]
    UnknownParam(u8),
}
