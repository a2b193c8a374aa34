//! Binary command protocol
//!
//! Frames sent to the router are fixed-size byte records:
//! `[opcode:1][id:1..2][payload:0..N][checksum:1]` where the checksum is
//! the XOR of every preceding byte. Multi-byte fields are big-endian on
//! the wire regardless of host byte order; on the host side each byte is
//! set explicitly so the layout is identical on any machine.

pub mod command;

pub use command::{Codec, Command, MAX_FRAME_SIZE};

/// Control bytes the device sends to frame its side of the conversation.
pub mod wire {
    /// Acknowledge; followed by the id of the acknowledged command.
    pub const ACK: u8 = b'a';
    /// Retransmit request; the confirmation byte follows.
    pub const RETRANSMIT: u8 = b't';
    /// Confirmation byte expected after [`RETRANSMIT`].
    pub const RETRANSMIT_CONFIRM: u8 = b'x';
    /// Response header; followed by an id byte, a length byte, and payload.
    pub const RESPONSE: u8 = b'r';
    /// Device-initiated motion halt.
    pub const ABORT: u8 = b'A';
    /// Clears a previously raised halt.
    pub const ABORT_CLEAR: u8 = b'C';
    /// Byte the host writes repeatedly while waiting for the device to
    /// answer the opening handshake.
    pub const HANDSHAKE: u8 = 1;
}

/// Operation kind carried in the first byte of every frame.
///
/// Values are dictated by the firmware and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// No operation.
    Nop = 0,
    /// Absolute linear move (x, y, z, feed).
    Move = 1,
    /// Home one or more axes; payload is an axis bitmask (X=1, Y=2, Z=4).
    Home = 2,
    /// Enable or disable the stepper drivers; payload 1 = on, 0 = off.
    Steppers = 3,
    /// Switch the spindle on or off; payload 1 = on, 0 = off.
    Spindle = 4,
    /// Dwell for a duration in milliseconds.
    Wait = 5,
    /// Pause until the operator presses the resume button.
    Pause = 6,
    /// Beep with a frequency (Hz) and duration (ms).
    Beep = 7,
    /// Redefine the current position without motion.
    SetPosition = 8,
    /// Query the current position.
    GetPosition = 9,
    /// Query the endstop switch states.
    GetEndstops = 10,
    /// Query the measured spindle speed.
    GetSpindleSpeed = 11,
    /// Relative linear move (dx, dy, dz, feed).
    RelMove = 12,
    /// Echo raw payload bytes back from the device.
    Echo = 16,
    /// Emergency stop.
    Estop = 255,
}

impl Opcode {
    /// Decode an opcode byte, e.g. when attributing a response to a frame
    /// found in the sent history.
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Nop,
            1 => Self::Move,
            2 => Self::Home,
            3 => Self::Steppers,
            4 => Self::Spindle,
            5 => Self::Wait,
            6 => Self::Pause,
            7 => Self::Beep,
            8 => Self::SetPosition,
            9 => Self::GetPosition,
            10 => Self::GetEndstops,
            11 => Self::GetSpindleSpeed,
            12 => Self::RelMove,
            16 => Self::Echo,
            255 => Self::Estop,
            _ => return None,
        })
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Nop => "NOP",
            Self::Move => "MOVE",
            Self::Home => "HOME",
            Self::Steppers => "STEPPERS",
            Self::Spindle => "SPINDLE",
            Self::Wait => "WAIT",
            Self::Pause => "PAUSE",
            Self::Beep => "BEEP",
            Self::SetPosition => "SET_POSITION",
            Self::GetPosition => "GET_POSITION",
            Self::GetEndstops => "GET_ENDSTOPS",
            Self::GetSpindleSpeed => "GET_SPINDLE_SPEED",
            Self::RelMove => "RELMOVE",
            Self::Echo => "ECHO",
            Self::Estop => "ESTOP",
        };
        write!(f, "{}", name)
    }
}
