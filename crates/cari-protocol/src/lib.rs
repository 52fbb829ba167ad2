//! CARI Protocol Library
//!
//! This crate provides framing and encoding for CARI, the binary
//! command/response protocol spoken by radio front-end devices over a
//! message-oriented control channel.
//!
//! # Architecture
//!
//! - [`command`]: command ids, status codes and subdevice parameter ids
//! - [`frame`]: frame decoding, plain and address-qualified encoding, and the
//!   [`Reply`] enum that ties each reply to its framing convention
//! - [`faults`]: the device fault bitmask carried by PING replies
//! - [`version`]: the one-byte protocol version register
//!
//! Command ids `>= 0x80` are queries; everything below is a set/exec
//! operation.
//!
//! # Example
//!
//! ```rust
//! use cari_protocol::{CommandId, EncodeFrame, Frame, Reply, Status};
//!
//! // Decode a GET_IDENT request
//! let frame = Frame::decode(&[0x80, 0x03, 0x00]).unwrap();
//! assert_eq!(frame.command_id(), Some(CommandId::GetIdent));
//!
//! // Answer an unknown command
//! let reply = Reply::status(0x50, Status::Unsupported);
//! assert_eq!(reply.encode().unwrap(), vec![0x50, 0x04, 0x00, 0x02]);
//! ```

pub mod command;
pub mod error;
pub mod faults;
pub mod frame;
pub mod version;

pub use command::{is_query_id, CommandCategory, CommandId, Status, SubdeviceParam};
pub use error::{FrameError, ParseError};
pub use faults::DeviceFaults;
pub use frame::{encode_pong, Frame, Reply};
pub use version::ProtocolVersion;

/// Trait for values that can be encoded to a CARI frame
pub trait EncodeFrame {
    /// Encode to wire bytes
    fn encode(&self) -> Result<Vec<u8>, FrameError>;
}
