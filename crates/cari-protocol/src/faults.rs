//! Device-level fault bitmask reported in PING replies

use bitflags::bitflags;

bitflags! {
    /// Device fault flags (32 bits on the wire, little-endian)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[cfg_attr(feature = "serde", serde(transparent))]
    pub struct DeviceFaults: u32 {
        /// PLL failed to lock
        const PLL_LOCK = 1 << 0;
        /// Communication with a subdevice failed
        const SUBDEV_COMM = 1 << 1;
        /// Device temperature out of range
        const OVERHEAT = 1 << 2;
        /// Frequency reference lost
        const FREQ_REF = 1 << 3;
    }
}

impl DeviceFaults {
    /// Create flags from the raw wire value, keeping unknown bits
    #[must_use]
    pub const fn from_wire(bits: u32) -> Self {
        Self::from_bits_retain(bits)
    }

    /// Raw wire value
    #[must_use]
    pub const fn to_wire(self) -> u32 {
        self.bits()
    }
}

impl Default for DeviceFaults {
    fn default() -> Self {
        Self::empty()
    }
}
