//! Emulated device and subdevice model
//!
//! A [`Device`] is an immutable description built once from a
//! [`DeviceConfig`]. The [`DeviceModel`] hands out shared snapshots of it;
//! writes replace the whole snapshot so a reader never sees a half-updated
//! subdevice.

use std::fmt;
use std::sync::Arc;

use cari_protocol::{ProtocolVersion, SubdeviceParam};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{DeviceConfig, SubdeviceConfig};

/// Maximum entries in a capability list
pub const MAX_CAPABILITIES: usize = 16;
/// Maximum identity string length in bytes (the wire format reserves one more
/// byte for a terminator)
pub const MAX_IDENTITY_LEN: usize = 127;
/// Subdevices are addressed with one byte
pub const MAX_SUBDEVICES: usize = 256;

/// Errors building or updating the device model
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Identity string does not fit the identity register
    #[error("identity is {len} bytes, limit is {MAX_IDENTITY_LEN}")]
    IdentityTooLong { len: usize },

    /// More capabilities than a capability list can hold
    #[error("capability list holds at most {MAX_CAPABILITIES} entries")]
    CapacityExceeded,

    /// More subdevices than one address byte can reach
    #[error("{count} subdevices configured, limit is {MAX_SUBDEVICES}")]
    TooManySubdevices { count: usize },

    /// Subdevice index does not exist
    #[error("subdevice {index} out of range")]
    OutOfRange { index: usize },
}

/// Device-level capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum DeviceCapability {
    /// Data streams can be compressed
    Compression = 0,
    /// Supervision channel available
    Supervision = 1,
}

/// Subdevice capabilities: signal paths, control loops, (de)modulators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum SubdeviceCapability {
    IqMod = 0,
    Rx = 1,
    Tx = 2,
    Duplex = 3,
    Agc = 4,
    Afc = 5,
    FreqRef = 6,
    AmDemod = 7,
    FmDemod = 8,
    PmDemod = 9,
    SsbDemod = 10,
    AmMod = 11,
    FmMod = 12,
    PmMod = 13,
    SsbMod = 14,
    /// Subdevice accepts a reset action
    Reset = 15,
}

/// A capability flag with a one-byte wire value
pub trait Capability: Copy + PartialEq + fmt::Debug {
    fn to_wire(self) -> u8;
}

impl Capability for DeviceCapability {
    fn to_wire(self) -> u8 {
        self as u8
    }
}

impl Capability for SubdeviceCapability {
    fn to_wire(self) -> u8 {
        self as u8
    }
}

/// Ordered capability list that never holds more than [`MAX_CAPABILITIES`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityList<T> {
    items: Vec<T>,
}

impl<T: Capability> CapabilityList<T> {
    /// Create an empty list
    pub fn new() -> Self {
        Self {
            items: Vec::with_capacity(MAX_CAPABILITIES),
        }
    }

    /// Append a capability, failing once the list is full
    pub fn push(&mut self, cap: T) -> Result<(), ModelError> {
        if self.items.len() >= MAX_CAPABILITIES {
            return Err(ModelError::CapacityExceeded);
        }
        self.items.push(cap);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, cap: T) -> bool {
        self.items.contains(&cap)
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.items.iter().copied()
    }

    /// Wire bytes, one per capability, in list order
    pub fn to_wire(&self) -> Vec<u8> {
        self.items.iter().map(|c| c.to_wire()).collect()
    }
}

impl<T: Capability> Default for CapabilityList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Capability> TryFrom<&[T]> for CapabilityList<T> {
    type Error = ModelError;

    fn try_from(caps: &[T]) -> Result<Self, Self::Error> {
        let mut list = Self::new();
        for &cap in caps {
            list.push(cap)?;
        }
        Ok(list)
    }
}

impl<T: Capability> fmt::Display for CapabilityList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex: Vec<String> = self.iter().map(|c| format!("{:02X}", c.to_wire())).collect();
        write!(f, "{}", hex.join(" "))
    }
}

/// One independently tunable signal path
#[derive(Debug, Clone, PartialEq)]
pub struct Subdevice {
    /// Receive frequency in Hz (0 = no receive path)
    pub rx_frequency_hz: u64,
    /// Transmit frequency in Hz (0 = no transmit path)
    pub tx_frequency_hz: u64,
    /// LNA gain in dB
    pub lna_gain_db: f32,
    /// Output power in dBm
    pub output_power_dbm: f32,
    /// Channel width in Hz
    pub channel_width_hz: f32,
    /// Sample rate in Hz
    pub sample_rate_hz: f32,
    /// Frequency correction in ppm
    pub frequency_correction_ppm: f32,
    capabilities: CapabilityList<SubdeviceCapability>,
}

impl Subdevice {
    /// Build a subdevice from configuration
    pub fn from_config(config: &SubdeviceConfig) -> Result<Self, ModelError> {
        Ok(Self {
            rx_frequency_hz: config.rx_frequency_hz,
            tx_frequency_hz: config.tx_frequency_hz,
            lna_gain_db: config.lna_gain_db,
            output_power_dbm: config.output_power_dbm,
            channel_width_hz: config.channel_width_hz,
            sample_rate_hz: config.sample_rate_hz,
            frequency_correction_ppm: config.frequency_correction_ppm,
            capabilities: CapabilityList::try_from(config.capabilities.as_slice())?,
        })
    }

    pub fn capabilities(&self) -> &CapabilityList<SubdeviceCapability> {
        &self.capabilities
    }

    /// Little-endian wire encoding of one parameter
    pub fn param_bytes(&self, param: SubdeviceParam) -> Vec<u8> {
        match param {
            SubdeviceParam::RxFrequency => self.rx_frequency_hz.to_le_bytes().to_vec(),
            SubdeviceParam::TxFrequency => self.tx_frequency_hz.to_le_bytes().to_vec(),
            SubdeviceParam::LnaGain => self.lna_gain_db.to_le_bytes().to_vec(),
            SubdeviceParam::OutputPower => self.output_power_dbm.to_le_bytes().to_vec(),
            SubdeviceParam::ChannelWidth => self.channel_width_hz.to_le_bytes().to_vec(),
            SubdeviceParam::SampleRate => self.sample_rate_hz.to_le_bytes().to_vec(),
            SubdeviceParam::FrequencyCorrection => {
                self.frequency_correction_ppm.to_le_bytes().to_vec()
            }
        }
    }
}

/// Static description of the emulated device
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    identity: String,
    version: ProtocolVersion,
    capabilities: CapabilityList<DeviceCapability>,
    subdevices: Vec<Subdevice>,
}

impl Device {
    /// Build and validate a device from configuration
    pub fn from_config(config: &DeviceConfig) -> Result<Self, ModelError> {
        if config.identity.len() > MAX_IDENTITY_LEN {
            return Err(ModelError::IdentityTooLong {
                len: config.identity.len(),
            });
        }
        if config.subdevices.len() > MAX_SUBDEVICES {
            return Err(ModelError::TooManySubdevices {
                count: config.subdevices.len(),
            });
        }

        let subdevices = config
            .subdevices
            .iter()
            .map(Subdevice::from_config)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            identity: config.identity.clone(),
            version: config.version,
            capabilities: CapabilityList::try_from(config.capabilities.as_slice())?,
            subdevices,
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn capabilities(&self) -> &CapabilityList<DeviceCapability> {
        &self.capabilities
    }

    pub fn subdevice_count(&self) -> usize {
        self.subdevices.len()
    }

    pub fn subdevice(&self, index: usize) -> Option<&Subdevice> {
        self.subdevices.get(index)
    }

    pub fn subdevices(&self) -> &[Subdevice] {
        &self.subdevices
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.identity)?;
        writeln!(f, "CARI version: {}", self.version)?;
        writeln!(f, "CARI capabilities: {}", self.capabilities)?;
        for (i, sub) in self.subdevices.iter().enumerate() {
            writeln!(f, "Subdevice {i}")?;
            writeln!(f, "  Capabilities: {}", sub.capabilities)?;
            writeln!(f, "  RX frequency: {} Hz", sub.rx_frequency_hz)?;
            writeln!(f, "  TX frequency: {} Hz", sub.tx_frequency_hz)?;
            writeln!(f, "  LNA gain: {:.2} dB", sub.lna_gain_db)?;
            writeln!(f, "  Power: {:.2} dBm", sub.output_power_dbm)?;
            writeln!(f, "  Channel width: {:.0} Hz", sub.channel_width_hz)?;
            writeln!(f, "  Sample rate: {:.0} Hz", sub.sample_rate_hz)?;
            write!(
                f,
                "  Frequency correction: {:.2} ppm",
                sub.frequency_correction_ppm
            )?;
            if i + 1 < self.subdevices.len() {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

/// Owner of the current device snapshot
///
/// Readers take an `Arc<Device>` for the duration of one dispatch cycle.
/// Writers build a modified copy and swap it in, so every snapshot stays
/// internally consistent. Sharing the model across threads needs a mutex or
/// `RwLock` around this type; the snapshot swap itself stays the same.
#[derive(Debug, Clone)]
pub struct DeviceModel {
    current: Arc<Device>,
}

impl DeviceModel {
    pub fn new(device: Device) -> Self {
        Self {
            current: Arc::new(device),
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<Device> {
        Arc::clone(&self.current)
    }

    /// Borrow the current snapshot
    pub fn device(&self) -> &Device {
        &self.current
    }

    /// Replace one subdevice, publishing a new snapshot
    ///
    /// Snapshots taken earlier keep the old subdevice.
    pub fn replace_subdevice(&mut self, index: usize, subdevice: Subdevice) -> Result<(), ModelError> {
        if index >= self.current.subdevices.len() {
            return Err(ModelError::OutOfRange { index });
        }

        let mut next = Device::clone(&self.current);
        next.subdevices[index] = subdevice;
        self.current = Arc::new(next);
        Ok(())
    }
}
