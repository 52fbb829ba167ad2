//! Property tests for the CARI frame codec
//!
//! These check the two structural guarantees of the wire format:
//! - a frame whose declared length matches its size decodes and re-encodes
//!   byte-for-byte
//! - any disagreement between declared and actual length is rejected

use cari_protocol::frame::{declared_length, encode, encode_addressed, HEADER_LEN};
use cari_protocol::{EncodeFrame, Frame, FrameError};
use proptest::prelude::*;

// Strategy for well-formed frames: any command id, payload up to 512 bytes
fn valid_frame() -> impl Strategy<Value = Vec<u8>> {
    (any::<u8>(), prop::collection::vec(any::<u8>(), 0..512)).prop_map(|(cmd, payload)| {
        let len = (HEADER_LEN + payload.len()) as u16;
        let mut bytes = vec![cmd];
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend(payload);
        bytes
    })
}

proptest! {
    #[test]
    fn valid_frames_roundtrip(bytes in valid_frame()) {
        let frame = Frame::decode(&bytes).unwrap();
        prop_assert_eq!(frame.command, bytes[0]);
        prop_assert_eq!(&frame.payload[..], &bytes[HEADER_LEN..]);
        prop_assert_eq!(frame.encode().unwrap(), bytes);
    }

    #[test]
    fn mismatched_length_is_malformed(
        cmd in any::<u8>(),
        payload in prop::collection::vec(any::<u8>(), 0..64),
        declared in any::<u16>(),
    ) {
        let actual = HEADER_LEN + payload.len();
        prop_assume!(declared as usize != actual);

        let mut bytes = vec![cmd];
        bytes.extend_from_slice(&declared.to_le_bytes());
        bytes.extend(payload);

        let is_length_mismatch = matches!(
            Frame::decode(&bytes),
            Err(FrameError::LengthMismatch { .. })
        );
        prop_assert!(is_length_mismatch);
    }

    #[test]
    fn short_buffers_are_truncated(bytes in prop::collection::vec(any::<u8>(), 0..HEADER_LEN)) {
        prop_assert_eq!(
            Frame::decode(&bytes),
            Err(FrameError::Truncated { len: bytes.len() })
        );
    }

    #[test]
    fn encoded_length_field_matches_size(
        cmd in any::<u8>(),
        address in any::<u8>(),
        payload in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        let plain = encode(cmd, &payload).unwrap();
        prop_assert_eq!(declared_length(&plain), Some(plain.len()));
        prop_assert_eq!(plain.len(), HEADER_LEN + payload.len());

        let addressed = encode_addressed(cmd, address, &payload).unwrap();
        prop_assert_eq!(declared_length(&addressed), Some(addressed.len()));
        prop_assert_eq!(addressed.len(), HEADER_LEN + 1 + payload.len());
        prop_assert_eq!(addressed[HEADER_LEN], address);
    }
}
