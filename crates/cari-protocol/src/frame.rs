//! CARI frame codec
//!
//! # Frame Format
//! ```text
//! [cmd] [len_lo] [len_hi] [payload...]
//! ```
//!
//! - `cmd`: command id (see [`CommandId`])
//! - `len`: total frame length including the 3-byte header, little-endian
//! - `payload`: command-specific bytes; address-qualified frames start the
//!   payload with a 1-byte target address
//!
//! A frame is only valid when the declared length equals the number of bytes
//! actually received. Anything else is treated as malformed and dropped.

use crate::command::{is_query_id, CommandId, Status};
use crate::error::FrameError;
use crate::faults::DeviceFaults;
use crate::EncodeFrame;

/// Header length: command id plus 16-bit length
pub const HEADER_LEN: usize = 3;
/// Header length of an address-qualified frame
pub const ADDRESSED_HEADER_LEN: usize = HEADER_LEN + 1;
/// Length of a PING reply
pub const PONG_LEN: usize = HEADER_LEN + 4;
/// Largest frame the length field can describe
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// A decoded CARI frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw command id (kept raw so unknown ids can be echoed back)
    pub command: u8,
    /// Everything after the header
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame
    pub fn new(command: impl Into<u8>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            command: command.into(),
            payload: payload.into(),
        }
    }

    /// Decode a complete frame from the bytes of one received message
    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        let declared = declared_length(buf).ok_or(FrameError::Truncated { len: buf.len() })?;

        if declared != buf.len() {
            tracing::trace!(
                "CARI frame 0x{:02X} declares {} bytes, got {}",
                buf[0],
                declared,
                buf.len()
            );
            return Err(FrameError::LengthMismatch {
                declared,
                actual: buf.len(),
            });
        }

        Ok(Self {
            command: buf[0],
            payload: buf[HEADER_LEN..].to_vec(),
        })
    }

    /// The command, if its id is part of the command enumeration
    pub fn command_id(&self) -> Option<CommandId> {
        CommandId::try_from(self.command).ok()
    }

    /// Returns true for query ("get") commands
    pub fn is_query(&self) -> bool {
        is_query_id(self.command)
    }

    /// First payload byte, which address-qualified commands use as target
    pub fn address(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    /// Total length this frame occupies on the wire
    pub fn wire_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }
}

impl EncodeFrame for Frame {
    fn encode(&self) -> Result<Vec<u8>, FrameError> {
        encode(self.command, &self.payload)
    }
}

/// Read the declared total length from a frame header
///
/// Returns `None` if the buffer does not hold a full header.
pub fn declared_length(buf: &[u8]) -> Option<usize> {
    if buf.len() < HEADER_LEN {
        return None;
    }
    Some(u16::from_le_bytes([buf[1], buf[2]]) as usize)
}

/// Encode a frame without an address byte: declared length is `3 + payload`
pub fn encode(command: u8, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let len = HEADER_LEN + payload.len();
    let mut frame = header(command, len)?;
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Encode an address-qualified frame: declared length is `4 + payload`
pub fn encode_addressed(command: u8, address: u8, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let len = ADDRESSED_HEADER_LEN + payload.len();
    let mut frame = header(command, len)?;
    frame.push(address);
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Encode the fixed 7-byte PING reply carrying the fault bitmask
pub fn encode_pong(faults: DeviceFaults) -> Vec<u8> {
    let mut frame = Vec::with_capacity(PONG_LEN);
    frame.push(CommandId::Ping.as_u8());
    frame.extend_from_slice(&(PONG_LEN as u16).to_le_bytes());
    frame.extend_from_slice(&faults.to_wire().to_le_bytes());
    frame
}

fn header(command: u8, len: usize) -> Result<Vec<u8>, FrameError> {
    let declared = u16::try_from(len).map_err(|_| FrameError::TooLong { len })?;
    let mut frame = Vec::with_capacity(len);
    frame.push(command);
    frame.extend_from_slice(&declared.to_le_bytes());
    Ok(frame)
}

/// An outgoing reply, tagged by framing convention
///
/// Each variant fixes its own header layout, so the declared length always
/// matches the payload shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// PING reply with the device fault bitmask
    Pong { faults: DeviceFaults },
    /// Plain query reply: `[cmd, len, payload...]`
    Query { command: u8, payload: Vec<u8> },
    /// Address-qualified reply: `[cmd, len, address, payload...]`
    AddressedQuery {
        command: u8,
        address: u8,
        payload: Vec<u8>,
    },
    /// Plain status reply: `[cmd, len, status]`
    Status { command: u8, status: Status },
}

impl Reply {
    /// Status reply for a command
    pub fn status(command: u8, status: Status) -> Self {
        Self::Status { command, status }
    }

    /// Command id the reply answers
    pub fn command(&self) -> u8 {
        match self {
            Self::Pong { .. } => CommandId::Ping.as_u8(),
            Self::Query { command, .. }
            | Self::AddressedQuery { command, .. }
            | Self::Status { command, .. } => *command,
        }
    }
}

impl EncodeFrame for Reply {
    fn encode(&self) -> Result<Vec<u8>, FrameError> {
        match self {
            Self::Pong { faults } => Ok(encode_pong(*faults)),
            Self::Query { command, payload } => encode(*command, payload),
            Self::AddressedQuery {
                command,
                address,
                payload,
            } => encode_addressed(*command, *address, payload),
            Self::Status { command, status } => encode(*command, &[status.as_u8()]),
        }
    }
}
