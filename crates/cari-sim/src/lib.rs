//! CARI Device Emulation Library
//!
//! This crate emulates a CARI radio front-end so client software can be
//! exercised without hardware. It includes:
//!
//! - **Device model**: identity, version, capabilities and subdevices, held as
//!   immutable snapshots
//! - **Dispatcher**: turns one request frame into one reply frame
//! - **Channels**: the message-oriented control channel (UDP or in-memory)
//!   and the data channels with their bind status
//! - **Control loop**: the task that polls the control channel and answers
//!
//! # Example
//!
//! ```rust
//! use cari_sim::{Device, DeviceConfig, Dispatcher};
//!
//! let device = Device::from_config(&DeviceConfig::default()).unwrap();
//! let dispatcher = Dispatcher::new();
//!
//! // GET_REGISTER, address 0: protocol version
//! let reply = dispatcher.handle(&device, &[0x81, 0x04, 0x00, 0x00]).unwrap();
//! assert_eq!(reply, vec![0x81, 0x04, 0x00, 0x11]);
//!
//! // Length field says 9 bytes but 3 arrived: dropped
//! assert!(dispatcher.handle(&device, &[0x80, 0x09, 0x00]).is_err());
//! ```

pub mod channel;
pub mod config;
pub mod control_loop;
pub mod device;
pub mod dispatcher;

pub use channel::{
    memory_channel, ChannelError, ChannelKind, ChannelStatus, ControlChannel, DeviceChannels,
    MemoryClient, MemoryControlChannel, UdpControlChannel,
};
pub use config::{ChannelConfig, DeviceConfig, SubdeviceConfig};
pub use control_loop::{
    ControlEvent, ControlLoop, LoopCommand, LoopStats, PollOutcome, MIN_POLL_INTERVAL,
};
pub use device::{
    CapabilityList, Device, DeviceCapability, DeviceModel, ModelError, Subdevice,
    SubdeviceCapability,
};
pub use dispatcher::Dispatcher;
