//! Receive-side protocol state machine
//!
//! Classifies the byte stream coming back from the router. The device
//! frames its side of the conversation with single control bytes: an
//! ack ('a') is followed by the acknowledged command id; a retransmit
//! request ('t') is followed by an 'x' confirmation; a response ('r')
//! carries an id byte, a length byte, and that many payload bytes; 'A'
//! halts all dispatch until an explicit 'C' clears it.
//!
//! The machine is deliberately self-healing: an unexpected byte in the
//! idle state is reported and ignored, so a corrupted stream cannot
//! wedge the session.

use crate::protocol::wire;

/// Protocol state of the receive loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolState {
    /// Waiting for a control byte.
    #[default]
    Idle,
    /// Control byte seen, waiting for the acknowledged id.
    Ack,
    /// Reading a response header or payload.
    Response,
    /// Waiting for the retransmit confirmation byte.
    Retransmit,
    /// Motion halted by the device; only the clear byte is honored.
    Abort,
}

/// Phase of a multi-byte response read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponsePhase {
    Id,
    Len,
    Payload,
}

/// What one inbound byte amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveEvent {
    /// A command was acknowledged; the session may dispatch the next one.
    Ack {
        /// Id echoed by the device (low byte of the command id).
        id: u8,
    },
    /// The device asked for the last frame again.
    RetransmitRequest,
    /// A complete response arrived.
    Response {
        /// Id of the command this responds to.
        id: u8,
        /// Raw payload, exactly the declared length.
        data: Vec<u8>,
    },
    /// The device halted motion; dispatch must stop until cleared.
    AbortRaised,
    /// The halt condition was cleared; dispatch may resume.
    AbortCleared,
    /// A malformed exchange; the machine resynchronized to idle.
    ProtocolError(String),
    /// A byte that fits no exchange; logged and ignored.
    UnexpectedByte(u8),
}

/// The receive-side state machine.
///
/// Feed it one byte at a time; most bytes advance an exchange silently
/// and return `None`, the final byte of an exchange returns the event.
#[derive(Debug, Default)]
pub struct Receiver {
    state: ProtocolState,
    phase: ResponsePhaseState,
}

#[derive(Debug)]
struct ResponsePhaseState {
    phase: ResponsePhase,
    id: u8,
    expected: usize,
    data: Vec<u8>,
}

impl Default for ResponsePhaseState {
    fn default() -> Self {
        Self {
            phase: ResponsePhase::Id,
            id: 0,
            expected: 0,
            data: Vec::new(),
        }
    }
}

impl Receiver {
    /// New receiver in the idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current protocol state.
    pub fn state(&self) -> ProtocolState {
        self.state
    }

    /// True while a device-initiated halt is latched. All dispatch must
    /// be suspended until the clear byte arrives.
    pub fn is_aborted(&self) -> bool {
        self.state == ProtocolState::Abort
    }

    /// Drop any partial exchange and return to idle. Used when the
    /// transport drops mid-conversation.
    pub fn reset(&mut self) {
        self.state = ProtocolState::Idle;
        self.phase = ResponsePhaseState::default();
    }

    /// Process one inbound byte.
    pub fn on_byte(&mut self, byte: u8) -> Option<ReceiveEvent> {
        match self.state {
            ProtocolState::Idle => match byte {
                wire::ACK => {
                    self.state = ProtocolState::Ack;
                    None
                }
                wire::RETRANSMIT => {
                    self.state = ProtocolState::Retransmit;
                    None
                }
                wire::RESPONSE => {
                    self.state = ProtocolState::Response;
                    self.phase = ResponsePhaseState::default();
                    None
                }
                wire::ABORT => {
                    self.state = ProtocolState::Abort;
                    Some(ReceiveEvent::AbortRaised)
                }
                other => Some(ReceiveEvent::UnexpectedByte(other)),
            },

            ProtocolState::Ack => {
                self.state = ProtocolState::Idle;
                Some(ReceiveEvent::Ack { id: byte })
            }

            ProtocolState::Response => self.on_response_byte(byte),

            ProtocolState::Retransmit => {
                self.state = ProtocolState::Idle;
                if byte == wire::RETRANSMIT_CONFIRM {
                    Some(ReceiveEvent::RetransmitRequest)
                } else {
                    Some(ReceiveEvent::ProtocolError(format!(
                        "Expecting 'x' after 't' for retransmit, got {:#04x}",
                        byte
                    )))
                }
            }

            // The only way out of a halt is the device's clear byte.
            ProtocolState::Abort => {
                if byte == wire::ABORT_CLEAR {
                    self.state = ProtocolState::Idle;
                    Some(ReceiveEvent::AbortCleared)
                } else {
                    None
                }
            }
        }
    }

    fn on_response_byte(&mut self, byte: u8) -> Option<ReceiveEvent> {
        match self.phase.phase {
            ResponsePhase::Id => {
                self.phase.id = byte;
                self.phase.phase = ResponsePhase::Len;
                None
            }
            ResponsePhase::Len => {
                self.phase.expected = byte as usize;
                self.phase.phase = ResponsePhase::Payload;
                self.finish_if_complete()
            }
            ResponsePhase::Payload => {
                self.phase.data.push(byte);
                self.finish_if_complete()
            }
        }
    }

    fn finish_if_complete(&mut self) -> Option<ReceiveEvent> {
        if self.phase.data.len() < self.phase.expected {
            return None;
        }
        self.state = ProtocolState::Idle;
        let finished = std::mem::take(&mut self.phase);
        Some(ReceiveEvent::Response {
            id: finished.id,
            data: finished.data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_sequence() {
        let mut rx = Receiver::new();
        assert_eq!(rx.on_byte(b'a'), None);
        assert_eq!(rx.on_byte(7), Some(ReceiveEvent::Ack { id: 7 }));
        assert_eq!(rx.state(), ProtocolState::Idle);
    }

    #[test]
    fn test_response_sequence() {
        let mut rx = Receiver::new();
        assert_eq!(rx.on_byte(b'r'), None);
        assert_eq!(rx.on_byte(3), None); // id
        assert_eq!(rx.on_byte(2), None); // length
        assert_eq!(rx.on_byte(0xAA), None);
        assert_eq!(
            rx.on_byte(0xBB),
            Some(ReceiveEvent::Response {
                id: 3,
                data: vec![0xAA, 0xBB],
            })
        );
        assert_eq!(rx.state(), ProtocolState::Idle);
    }

    #[test]
    fn test_zero_length_response() {
        let mut rx = Receiver::new();
        rx.on_byte(b'r');
        rx.on_byte(9);
        assert_eq!(
            rx.on_byte(0),
            Some(ReceiveEvent::Response {
                id: 9,
                data: vec![],
            })
        );
    }

    #[test]
    fn test_retransmit_confirmation() {
        let mut rx = Receiver::new();
        assert_eq!(rx.on_byte(b't'), None);
        assert_eq!(rx.on_byte(b'x'), Some(ReceiveEvent::RetransmitRequest));
        assert_eq!(rx.state(), ProtocolState::Idle);
    }

    #[test]
    fn test_malformed_retransmit_resyncs_to_idle() {
        let mut rx = Receiver::new();
        rx.on_byte(b't');
        let event = rx.on_byte(b'q');
        assert!(matches!(event, Some(ReceiveEvent::ProtocolError(_))));
        assert_eq!(rx.state(), ProtocolState::Idle);
        // The machine still recognizes a well-formed ack afterwards.
        rx.on_byte(b'a');
        assert_eq!(rx.on_byte(1), Some(ReceiveEvent::Ack { id: 1 }));
    }

    #[test]
    fn test_abort_latch() {
        let mut rx = Receiver::new();
        assert_eq!(rx.on_byte(b'A'), Some(ReceiveEvent::AbortRaised));
        assert!(rx.is_aborted());

        // Anything other than the clear byte leaves the halt latched,
        // including bytes that would otherwise start exchanges.
        for b in [b'a', b'r', b't', b'x', b'A', 0u8, 0xFF] {
            assert_eq!(rx.on_byte(b), None);
            assert!(rx.is_aborted());
        }

        assert_eq!(rx.on_byte(b'C'), Some(ReceiveEvent::AbortCleared));
        assert!(!rx.is_aborted());
        assert_eq!(rx.state(), ProtocolState::Idle);
    }

    #[test]
    fn test_unexpected_byte_is_ignored_in_idle() {
        let mut rx = Receiver::new();
        assert_eq!(rx.on_byte(b'Z'), Some(ReceiveEvent::UnexpectedByte(b'Z')));
        assert_eq!(rx.state(), ProtocolState::Idle);
        // Self-healing: the next ack still parses.
        rx.on_byte(b'a');
        assert_eq!(rx.on_byte(4), Some(ReceiveEvent::Ack { id: 4 }));
    }

    #[test]
    fn test_reset_drops_partial_exchange() {
        let mut rx = Receiver::new();
        rx.on_byte(b'r');
        rx.on_byte(1);
        rx.on_byte(4);
        rx.on_byte(0x01);
        rx.reset();
        assert_eq!(rx.state(), ProtocolState::Idle);
        rx.on_byte(b'a');
        assert_eq!(rx.on_byte(2), Some(ReceiveEvent::Ack { id: 2 }));
    }
}
