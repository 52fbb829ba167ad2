//! Serializable configuration for the emulated device and its channels
//!
//! Defaults reproduce the stock dummy device: one FM transmitter and one FM
//! receiver on the 70 cm band, control channel on port 17001.

use std::time::Duration;

use cari_protocol::ProtocolVersion;
use serde::{Deserialize, Serialize};

use crate::control_loop::MIN_POLL_INTERVAL;
use crate::device::{DeviceCapability, SubdeviceCapability};

/// Identity reported by GET_IDENT on the stock device
pub const DEFAULT_IDENTITY: &str = "CARI dummy device, Woj SP5WWP";

/// Configuration for one subdevice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubdeviceConfig {
    /// Receive frequency in Hz (0 = not applicable)
    pub rx_frequency_hz: u64,
    /// Transmit frequency in Hz (0 = not applicable)
    pub tx_frequency_hz: u64,
    pub lna_gain_db: f32,
    pub output_power_dbm: f32,
    pub channel_width_hz: f32,
    pub sample_rate_hz: f32,
    pub frequency_correction_ppm: f32,
    pub capabilities: Vec<SubdeviceCapability>,
}

impl Default for SubdeviceConfig {
    fn default() -> Self {
        Self {
            rx_frequency_hz: 0,
            tx_frequency_hz: 0,
            lna_gain_db: 0.0,
            output_power_dbm: 30.0,
            channel_width_hz: 12_500.0,
            sample_rate_hz: 125_000.0,
            frequency_correction_ppm: 0.0,
            capabilities: Vec::new(),
        }
    }
}

/// Configuration for the whole device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Identity string (at most 127 bytes)
    pub identity: String,
    /// Protocol version register value
    pub version: ProtocolVersion,
    /// Device-level capabilities
    pub capabilities: Vec<DeviceCapability>,
    /// Subdevices in address order
    pub subdevices: Vec<SubdeviceConfig>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        use SubdeviceCapability::{Afc, Agc, FmDemod, FmMod, Rx, Tx};

        Self {
            identity: DEFAULT_IDENTITY.to_string(),
            version: ProtocolVersion::V1_1,
            capabilities: vec![DeviceCapability::Supervision],
            subdevices: vec![
                SubdeviceConfig {
                    tx_frequency_hz: 438_812_500,
                    capabilities: vec![Tx, FmMod, FmDemod, Afc, Agc],
                    ..Default::default()
                },
                SubdeviceConfig {
                    rx_frequency_hz: 431_212_500,
                    capabilities: vec![Rx, FmMod, FmDemod, Afc, Agc],
                    ..Default::default()
                },
            ],
        }
    }
}

/// UDP ports for the four device channels (0 = ephemeral)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Interface to bind on
    pub bind_host: String,
    /// Request/reply control channel
    pub control_port: u16,
    /// Publish-only downlink data channel
    pub downlink_port: u16,
    /// Subscribe-only uplink data channel
    pub uplink_port: u16,
    /// Publish-only supervision channel
    pub supervision_port: u16,
    /// Receive timeout of one control loop iteration, in milliseconds
    pub poll_interval_ms: u64,
}

impl ChannelConfig {
    /// Receive timeout of one iteration, never shorter than [`MIN_POLL_INTERVAL`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms).max(MIN_POLL_INTERVAL)
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            control_port: 17001,
            downlink_port: 17002,
            uplink_port: 17003,
            supervision_port: 17004,
            poll_interval_ms: 100,
        }
    }
}
