//! CARI command dispatcher
//!
//! Maps one decoded request frame to exactly one reply. Every well-formed
//! request is answered, including unknown commands (`UNSUPPORTED`) and bad
//! addresses (`OUT_OF_RANGE`). Only frames that fail to decode go unanswered.
//!
//! # Reply layouts
//! ```text
//! PING               00 07 00 [faults u32 LE]
//! GET_IDENT          80 len   [identity...]
//! GET_REGISTER       81 04 00 [version]          or  81 04 00 [OUT_OF_RANGE]
//! SET_REGISTER       01 04 00 [OK]
//! SUBDEV_GET_CAPS    82 len   [addr] [OK] [caps...]
//! SUBDEV_GET_PARAM   83 len   [addr] [OK] [param] [value LE...]
//! anything else      id 04 00 [UNSUPPORTED]
//! ```

use cari_protocol::{
    CommandCategory, CommandId, DeviceFaults, EncodeFrame, Frame, FrameError, Reply, Status,
    SubdeviceParam,
};
use tracing::{debug, warn};

use crate::device::Device;

/// Register 0 holds the protocol version
const VERSION_REGISTER: u8 = 0x00;

/// Stateless request handler
///
/// The only state is the fault bitmask reported by PING, which the emulator
/// leaves empty.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    faults: DeviceFaults,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fault bitmask reported in PING replies
    pub fn faults(&self) -> DeviceFaults {
        self.faults
    }

    pub fn set_faults(&mut self, faults: DeviceFaults) {
        self.faults = faults;
    }

    /// Decode a raw request, dispatch it and encode the reply
    ///
    /// An `Err` means the request is dropped without a reply.
    pub fn handle(&self, device: &Device, request: &[u8]) -> Result<Vec<u8>, FrameError> {
        let frame = Frame::decode(request).inspect_err(|e| {
            warn!("Dropping malformed CARI frame {:02X?}: {}", request, e);
        })?;

        let reply = self.dispatch(device, &frame);
        reply.encode().inspect_err(|e| {
            warn!("Failed to encode reply to 0x{:02X}: {}", frame.command, e);
        })
    }

    /// Produce the reply for a decoded request
    pub fn dispatch(&self, device: &Device, frame: &Frame) -> Reply {
        let Some(command) = frame.command_id() else {
            debug!(
                "Unrecognized {} 0x{:02X}",
                if frame.is_query() { "query" } else { "command" },
                frame.command
            );
            return Reply::status(frame.command, Status::Unsupported);
        };

        debug!(
            "Dispatching {} (0x{:02X}) with {} payload bytes",
            command.name(),
            frame.command,
            frame.payload.len()
        );

        if frame.payload.len() < command.min_payload_len() {
            debug!(
                "{} needs {} payload bytes",
                command.name(),
                command.min_payload_len()
            );
            return Reply::status(frame.command, Status::Malformed);
        }

        let outcome = match command {
            CommandId::Ping => Outcome::Status(Status::Ok),
            CommandId::GetIdent => Outcome::Data(device.identity().as_bytes().to_vec()),
            CommandId::GetRegister => get_register(device, frame),
            CommandId::SetRegister => Outcome::Status(Status::Ok),
            CommandId::SubdevGetCaps => subdev_get_caps(device, frame),
            CommandId::SubdevGetParam => subdev_get_param(device, frame),
            CommandId::SubdevSetParam
            | CommandId::SubdevExec
            | CommandId::SubdevConnect
            | CommandId::SubdevStartBasebandStream
            | CommandId::DeviceStartSupervisionStream
            | CommandId::DeviceGetSupervisionList => {
                debug!("{} is not implemented by this device", command.name());
                Outcome::Status(Status::Unsupported)
            }
        };

        self.frame_reply(command, frame, outcome)
    }

    /// Wrap a handler outcome in the framing of the command's category
    fn frame_reply(&self, command: CommandId, frame: &Frame, outcome: Outcome) -> Reply {
        match command.category() {
            CommandCategory::Liveness => Reply::Pong {
                faults: self.faults,
            },
            CommandCategory::Query | CommandCategory::Exec => match outcome {
                Outcome::Data(payload) => Reply::Query {
                    command: frame.command,
                    payload,
                },
                Outcome::Status(status) => Reply::status(frame.command, status),
            },
            CommandCategory::AddressedQuery => {
                let Some(address) = frame.address() else {
                    return Reply::status(frame.command, Status::Malformed);
                };
                let payload = match outcome {
                    Outcome::Data(data) => {
                        let mut payload = vec![Status::Ok.as_u8()];
                        payload.extend(data);
                        payload
                    }
                    Outcome::Status(status) => vec![status.as_u8()],
                };
                Reply::AddressedQuery {
                    command: frame.command,
                    address,
                    payload,
                }
            }
        }
    }
}

/// Handler result, framed afterwards by [`Dispatcher::frame_reply`]
enum Outcome {
    /// Successful query data
    Data(Vec<u8>),
    /// Status code only
    Status(Status),
}

fn get_register(device: &Device, frame: &Frame) -> Outcome {
    // A request without an address byte reads register 0
    let address = frame.address().unwrap_or(VERSION_REGISTER);

    if address == VERSION_REGISTER {
        Outcome::Data(vec![device.version().to_byte()])
    } else {
        debug!("Register 0x{:02X} out of range", address);
        Outcome::Status(Status::OutOfRange)
    }
}

fn subdev_get_caps(device: &Device, frame: &Frame) -> Outcome {
    let index = frame.address().unwrap_or_default() as usize;

    match device.subdevice(index) {
        Some(sub) => Outcome::Data(sub.capabilities().to_wire()),
        None => {
            debug!("Subdevice {} out of range", index);
            Outcome::Status(Status::OutOfRange)
        }
    }
}

fn subdev_get_param(device: &Device, frame: &Frame) -> Outcome {
    let (Some(&address), Some(&param_id)) = (frame.payload.first(), frame.payload.get(1)) else {
        return Outcome::Status(Status::Malformed);
    };

    let param = SubdeviceParam::try_from(param_id);
    match (device.subdevice(address as usize), param) {
        (Some(sub), Ok(param)) => {
            let mut data = vec![param_id];
            data.extend(sub.param_bytes(param));
            Outcome::Data(data)
        }
        (sub, param) => {
            debug!(
                "Parameter {} of subdevice {} out of range (subdevice present: {}, {:?})",
                param_id,
                address,
                sub.is_some(),
                param.err()
            );
            Outcome::Status(Status::OutOfRange)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;

    fn device() -> Device {
        Device::from_config(&DeviceConfig::default()).unwrap()
    }

    fn handle(request: &[u8]) -> Option<Vec<u8>> {
        Dispatcher::new().handle(&device(), request).ok()
    }

    #[test]
    fn test_ping() {
        assert_eq!(
            handle(&[0x00, 0x03, 0x00]),
            Some(vec![0x00, 0x07, 0x00, 0x00, 0x00, 0x00, 0x00])
        );
    }

    #[test]
    fn test_ping_reports_faults() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.set_faults(DeviceFaults::OVERHEAT);
        assert_eq!(dispatcher.faults(), DeviceFaults::OVERHEAT);

        let reply = dispatcher.handle(&device(), &[0x00, 0x03, 0x00]).unwrap();
        assert_eq!(reply, vec![0x00, 0x07, 0x00, 0x04, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_ping_with_inconsistent_length_is_dropped() {
        // Declares 7 bytes but only 3 arrive
        assert_eq!(handle(&[0x00, 0x07, 0x00]), None);
    }

    #[test]
    fn test_get_ident() {
        let reply = handle(&[0x80, 0x03, 0x00]).unwrap();
        let ident = b"CARI dummy device, Woj SP5WWP";

        assert_eq!(reply[0], 0x80);
        assert_eq!(
            u16::from_le_bytes([reply[1], reply[2]]) as usize,
            3 + ident.len()
        );
        assert_eq!(&reply[3..], ident);
    }

    #[test]
    fn test_get_ident_is_idempotent() {
        let dispatcher = Dispatcher::new();
        let device = device();
        let first = dispatcher.handle(&device, &[0x80, 0x03, 0x00]).unwrap();
        let second = dispatcher.handle(&device, &[0x80, 0x03, 0x00]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_get_register_version() {
        assert_eq!(
            handle(&[0x81, 0x04, 0x00, 0x00]),
            Some(vec![0x81, 0x04, 0x00, 0x11])
        );
    }

    #[test]
    fn test_get_register_without_address_reads_version() {
        assert_eq!(
            handle(&[0x81, 0x03, 0x00]),
            Some(vec![0x81, 0x04, 0x00, 0x11])
        );
    }

    #[test]
    fn test_get_register_out_of_range() {
        assert_eq!(
            handle(&[0x81, 0x04, 0x00, 0x01]),
            Some(vec![0x81, 0x04, 0x00, 0x05])
        );
    }

    #[test]
    fn test_set_register_ok() {
        assert_eq!(
            handle(&[0x01, 0x05, 0x00, 0x01, 0x42]),
            Some(vec![0x01, 0x04, 0x00, 0x00])
        );
    }

    #[test]
    fn test_unrecognized_command() {
        assert_eq!(
            handle(&[0x50, 0x03, 0x00]),
            Some(vec![0x50, 0x04, 0x00, 0x02])
        );
    }

    #[test]
    fn test_unimplemented_commands_unsupported() {
        for cmd in [0x02u8, 0x03, 0x04, 0x05, 0x06, 0x84] {
            assert_eq!(
                handle(&[cmd, 0x04, 0x00, 0x00]),
                Some(vec![cmd, 0x04, 0x00, 0x02]),
                "command 0x{:02X}",
                cmd
            );
        }
    }

    #[test]
    fn test_subdev_get_caps() {
        assert_eq!(
            handle(&[0x82, 0x04, 0x00, 0x01]),
            Some(vec![0x82, 0x0A, 0x00, 0x01, 0x00, 1, 12, 8, 5, 4])
        );
    }

    #[test]
    fn test_subdev_get_caps_out_of_range() {
        assert_eq!(
            handle(&[0x82, 0x04, 0x00, 0x07]),
            Some(vec![0x82, 0x05, 0x00, 0x07, 0x05])
        );
    }

    #[test]
    fn test_subdev_get_caps_missing_address() {
        assert_eq!(
            handle(&[0x82, 0x03, 0x00]),
            Some(vec![0x82, 0x04, 0x00, 0x01])
        );
    }

    #[test]
    fn test_subdev_get_param_frequency() {
        let reply = handle(&[0x83, 0x05, 0x00, 0x01, 0x00]).unwrap();
        let mut expected = vec![0x83, 0x0E, 0x00, 0x01, 0x00, 0x00];
        expected.extend(431_212_500u64.to_le_bytes());
        assert_eq!(reply, expected);
    }

    #[test]
    fn test_subdev_get_param_float() {
        let reply = handle(&[0x83, 0x05, 0x00, 0x00, 0x04]).unwrap();
        let mut expected = vec![0x83, 0x0A, 0x00, 0x00, 0x00, 0x04];
        expected.extend(12_500.0f32.to_le_bytes());
        assert_eq!(reply, expected);
    }

    #[test]
    fn test_subdev_get_param_out_of_range() {
        // Unknown parameter
        assert_eq!(
            handle(&[0x83, 0x05, 0x00, 0x00, 0x09]),
            Some(vec![0x83, 0x05, 0x00, 0x00, 0x05])
        );
        // Unknown subdevice
        assert_eq!(
            handle(&[0x83, 0x05, 0x00, 0x02, 0x00]),
            Some(vec![0x83, 0x05, 0x00, 0x02, 0x05])
        );
    }

    #[test]
    fn test_subdev_get_param_missing_param() {
        assert_eq!(
            handle(&[0x83, 0x04, 0x00, 0x00]),
            Some(vec![0x83, 0x04, 0x00, 0x01])
        );
    }

    #[test]
    fn test_reply_framing_follows_category() {
        let dispatcher = Dispatcher::new();
        let device = device();

        for cmd in CommandId::ALL {
            // Address 0, parameter 0: enough payload for every command
            let frame = Frame::new(cmd, vec![0x00, 0x00]);
            let reply = dispatcher.dispatch(&device, &frame);
            assert_eq!(reply.command(), cmd.as_u8());

            let framing_matches = match cmd.category() {
                CommandCategory::Liveness => matches!(reply, Reply::Pong { .. }),
                CommandCategory::AddressedQuery => {
                    matches!(reply, Reply::AddressedQuery { address: 0, .. })
                }
                CommandCategory::Query | CommandCategory::Exec => {
                    matches!(reply, Reply::Query { .. } | Reply::Status { .. })
                }
            };
            assert!(framing_matches, "{} answered with {:?}", cmd.name(), reply);
        }
    }

    #[test]
    fn test_addressed_error_keeps_address_framing() {
        let frame = Frame::new(CommandId::SubdevGetCaps, vec![0x09]);
        assert_eq!(
            Dispatcher::new().dispatch(&device(), &frame),
            Reply::AddressedQuery {
                command: 0x82,
                address: 0x09,
                payload: vec![Status::OutOfRange.as_u8()],
            }
        );
    }

    #[test]
    fn test_short_addressed_request_is_plain_malformed() {
        for cmd in [CommandId::SubdevGetCaps, CommandId::SubdevGetParam] {
            let frame = Frame::new(cmd, Vec::new());
            assert_eq!(
                Dispatcher::new().dispatch(&device(), &frame),
                Reply::status(cmd.as_u8(), Status::Malformed)
            );
        }
    }

    #[test]
    fn test_truncated_request_dropped() {
        assert_eq!(handle(&[0x80]), None);
        assert_eq!(handle(&[]), None);
    }
}
