//! CARI command, status and parameter enumerations
//!
//! Command ids split the protocol in two halves: ids with the high bit set
//! (`0x80..`) are queries, everything below is a set/exec operation.

use crate::error::ParseError;

/// Boundary between set/exec commands and queries
pub const QUERY_BIT: u8 = 0x80;

/// CARI command identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CommandId {
    /// Liveness check, answered with the device fault bitmask
    Ping = 0x00,
    /// Write a device register
    SetRegister = 0x01,
    /// Write a subdevice parameter
    SubdevSetParam = 0x02,
    /// Execute a subdevice action
    SubdevExec = 0x03,
    /// Connect a subdevice
    SubdevConnect = 0x04,
    /// Start the baseband stream of a subdevice
    SubdevStartBasebandStream = 0x05,
    /// Start the device supervision stream
    DeviceStartSupervisionStream = 0x06,
    /// Read the identity string
    GetIdent = 0x80,
    /// Read a device register
    GetRegister = 0x81,
    /// Read the capability list of a subdevice
    SubdevGetCaps = 0x82,
    /// Read a subdevice parameter
    SubdevGetParam = 0x83,
    /// Read the list of supervised quantities
    DeviceGetSupervisionList = 0x84,
}

/// How a command addresses its target, which also fixes its reply framing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCategory {
    /// PING: always answered with the 7-byte fault mask reply
    Liveness,
    /// Query without a target address
    Query,
    /// Query whose payload starts with a 1-byte subdevice address
    AddressedQuery,
    /// Set or exec operation
    Exec,
}

impl CommandId {
    /// Every command in the enumeration, in wire order
    pub const ALL: [CommandId; 12] = [
        Self::Ping,
        Self::SetRegister,
        Self::SubdevSetParam,
        Self::SubdevExec,
        Self::SubdevConnect,
        Self::SubdevStartBasebandStream,
        Self::DeviceStartSupervisionStream,
        Self::GetIdent,
        Self::GetRegister,
        Self::SubdevGetCaps,
        Self::SubdevGetParam,
        Self::DeviceGetSupervisionList,
    ];

    /// Raw wire value
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns true for "get" commands (id >= 0x80)
    pub fn is_query(self) -> bool {
        is_query_id(self.as_u8())
    }

    /// Returns the command category used to pick the reply framing
    ///
    /// `GetRegister` carries a register address, but registers belong to the
    /// device itself so its reply uses plain framing.
    pub fn category(self) -> CommandCategory {
        match self {
            Self::Ping => CommandCategory::Liveness,
            Self::SubdevGetCaps | Self::SubdevGetParam => CommandCategory::AddressedQuery,
            cmd if cmd.is_query() => CommandCategory::Query,
            _ => CommandCategory::Exec,
        }
    }

    /// Payload bytes a request needs before it can be handled
    ///
    /// Addressed queries need their address byte, `SUBDEV_GET_PARAM` also a
    /// parameter id. `GET_REGISTER` without an address reads register 0.
    pub fn min_payload_len(self) -> usize {
        match self {
            Self::SubdevGetCaps => 1,
            Self::SubdevGetParam => 2,
            _ => 0,
        }
    }

    /// Human-readable command name
    pub fn name(self) -> &'static str {
        match self {
            Self::Ping => "PING",
            Self::SetRegister => "SET_REGISTER",
            Self::SubdevSetParam => "SUBDEV_SET_PARAM",
            Self::SubdevExec => "SUBDEV_EXEC",
            Self::SubdevConnect => "SUBDEV_CONNECT",
            Self::SubdevStartBasebandStream => "SUBDEV_START_BASEBAND_STREAM",
            Self::DeviceStartSupervisionStream => "DEVICE_START_SUPERVISION_STREAM",
            Self::GetIdent => "GET_IDENT",
            Self::GetRegister => "GET_REGISTER",
            Self::SubdevGetCaps => "SUBDEV_GET_CAPS",
            Self::SubdevGetParam => "SUBDEV_GET_PARAM",
            Self::DeviceGetSupervisionList => "DEVICE_GET_SUPERVISION_LIST",
        }
    }
}

/// Returns true if a raw command id falls in the query half of the id space
pub fn is_query_id(id: u8) -> bool {
    id & QUERY_BIT != 0
}

impl TryFrom<u8> for CommandId {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Ping),
            0x01 => Ok(Self::SetRegister),
            0x02 => Ok(Self::SubdevSetParam),
            0x03 => Ok(Self::SubdevExec),
            0x04 => Ok(Self::SubdevConnect),
            0x05 => Ok(Self::SubdevStartBasebandStream),
            0x06 => Ok(Self::DeviceStartSupervisionStream),
            0x80 => Ok(Self::GetIdent),
            0x81 => Ok(Self::GetRegister),
            0x82 => Ok(Self::SubdevGetCaps),
            0x83 => Ok(Self::SubdevGetParam),
            0x84 => Ok(Self::DeviceGetSupervisionList),
            _ => Err(ParseError::UnknownCommand(value)),
        }
    }
}

impl From<CommandId> for u8 {
    fn from(cmd: CommandId) -> Self {
        cmd.as_u8()
    }
}

/// Status codes carried in reply payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Status {
    Ok = 0,
    Malformed = 1,
    Unsupported = 2,
    BindFailed = 3,
    ConnectionFailed = 4,
    OutOfRange = 5,
}

impl Status {
    /// Raw wire value
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Status {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Ok),
            1 => Ok(Self::Malformed),
            2 => Ok(Self::Unsupported),
            3 => Ok(Self::BindFailed),
            4 => Ok(Self::ConnectionFailed),
            5 => Ok(Self::OutOfRange),
            _ => Err(ParseError::UnknownStatus(value)),
        }
    }
}

/// Subdevice parameters readable with `SUBDEV_GET_PARAM`
///
/// Frequencies travel as little-endian `u64`, everything else as
/// little-endian `f32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum SubdeviceParam {
    /// Receive frequency (Hz)
    RxFrequency = 0,
    /// Transmit frequency (Hz)
    TxFrequency = 1,
    /// LNA gain (dB)
    LnaGain = 2,
    /// Output power (dBm)
    OutputPower = 3,
    /// Channel width (Hz)
    ChannelWidth = 4,
    /// Sample rate (Hz)
    SampleRate = 5,
    /// Frequency correction (ppm)
    FrequencyCorrection = 6,
}

impl SubdeviceParam {
    /// Raw wire value
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for SubdeviceParam {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::RxFrequency),
            1 => Ok(Self::TxFrequency),
            2 => Ok(Self::LnaGain),
            3 => Ok(Self::OutputPower),
            4 => Ok(Self::ChannelWidth),
            5 => Ok(Self::SampleRate),
            6 => Ok(Self::FrequencyCorrection),
            _ => Err(ParseError::UnknownParam(value)),
        }
    }
}
