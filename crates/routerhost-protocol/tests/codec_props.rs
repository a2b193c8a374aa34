//! Property tests for the frame codec.

use proptest::prelude::*;
use routerhost_core::ProtocolVersion;
use routerhost_protocol::{Codec, Opcode};

fn version(extended: bool) -> ProtocolVersion {
    if extended {
        ProtocolVersion::Extended
    } else {
        ProtocolVersion::Compact
    }
}

proptest! {
    /// XOR over a whole frame is zero, because the last byte is the XOR
    /// of everything before it.
    #[test]
    fn motion_frames_checksum_to_zero(
        id in any::<u16>(),
        x in 0.0f32..600.0,
        y in 0.0f32..600.0,
        z in 0.0f32..120.0,
        feed in 0.0f32..50.0,
        extended in any::<bool>(),
    ) {
        let codec = Codec::new(version(extended));
        let frame = codec.motion(Opcode::Move, id, x, y, z, feed);
        prop_assert_eq!(frame.as_bytes().iter().fold(0u8, |acc, b| acc ^ b), 0);
        prop_assert_eq!(frame.len(), codec.frame_size());
    }

    #[test]
    fn echo_frames_checksum_and_hold_size(
        id in any::<u16>(),
        text in ".{0,64}",
        extended in any::<bool>(),
    ) {
        let codec = Codec::new(version(extended));
        let frame = codec.echo(id, text.as_bytes());
        prop_assert_eq!(frame.as_bytes().iter().fold(0u8, |acc, b| acc ^ b), 0);
        prop_assert_eq!(frame.len(), codec.frame_size());
    }

    /// The id field round-trips: whole in the extended layout, low byte
    /// in the compact one.
    #[test]
    fn id_round_trips_per_layout(id in any::<u16>(), extended in any::<bool>()) {
        let codec = Codec::new(version(extended));
        let frame = codec.empty(Opcode::Nop, id);
        if extended {
            prop_assert_eq!(frame.id(), id);
        } else {
            prop_assert_eq!(frame.id(), id & 0xFF);
        }
        prop_assert_eq!(frame.id_low(), (id & 0xFF) as u8);
    }
}
