//! # RouterHost Protocol
//!
//! The wire protocol stack for RouterHost:
//! - `protocol` - the binary command codec: fixed-size frames with
//!   big-endian fields and an XOR checksum, parameterized by protocol
//!   version.
//! - `gcode` - the line-oriented translator that turns a G-code program
//!   into an ordered command sequence plus diagnostics.
//! - `session` - the connection lifecycle and stop-and-wait session
//!   engine, including the receive-side state machine, sent history, and
//!   response decoding.
//! - `transport` - the serial transport trait, its `serialport`-backed
//!   implementation, and a scripted mock for tests.

pub mod gcode;
pub mod protocol;
pub mod session;
pub mod transport;

pub use gcode::{Diagnostic, Severity, TranslateOutput, Translator};
pub use protocol::{Codec, Command, Opcode, MAX_FRAME_SIZE};
pub use session::{
    ConnectionState, DeviceResponse, ReceiveEvent, Receiver, SentHistory, Session, SessionConfig,
};
pub use transport::{
    list_ports, ConnectionParams, MockTransport, SerialPortInfo, SerialTransport, Transport,
};
