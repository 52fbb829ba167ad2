//! Protocol version packed into one byte (major in the high nibble)

use std::fmt;

/// CARI protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "u8", into = "u8"))]
pub struct ProtocolVersion {
    major: u8,
    minor: u8,
}

impl ProtocolVersion {
    /// CARI v1.1
    pub const V1_1: ProtocolVersion = ProtocolVersion { major: 1, minor: 1 };

    /// Create a version, keeping only the low 4 bits of each part
    pub const fn new(major: u8, minor: u8) -> Self {
        Self {
            major: major & 0x0F,
            minor: minor & 0x0F,
        }
    }

    /// Unpack a version register byte
    pub const fn from_byte(byte: u8) -> Self {
        Self::new(byte >> 4, byte & 0x0F)
    }

    /// Pack into the version register byte
    pub const fn to_byte(self) -> u8 {
        (self.major << 4) | self.minor
    }

    pub const fn major(self) -> u8 {
        self.major
    }

    pub const fn minor(self) -> u8 {
        self.minor
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::V1_1
    }
}

impl From<u8> for ProtocolVersion {
    fn from(byte: u8) -> Self {
        Self::from_byte(byte)
    }
}

impl From<ProtocolVersion> for u8 {
    fn from(version: ProtocolVersion) -> Self {
        version.to_byte()
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
