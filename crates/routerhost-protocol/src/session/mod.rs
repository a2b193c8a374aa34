//! Session engine
//!
//! Owns the connection lifecycle and the stop-and-wait protocol that
//! carries command frames to the router. A single background task owns
//! the transport and every protocol-state transition; foreground callers
//! only enqueue requests and read state. The receive side is a small
//! state machine that classifies inbound bytes into acknowledgments,
//! retransmit requests, decoded responses, and abort signals.

pub mod engine;
pub mod history;
pub mod receiver;
pub mod response;

pub use engine::{ConnectionState, Session, SessionConfig};
pub use history::{SentHistory, SENT_HISTORY_CAPACITY};
pub use receiver::{ProtocolState, ReceiveEvent, Receiver};
pub use response::DeviceResponse;
