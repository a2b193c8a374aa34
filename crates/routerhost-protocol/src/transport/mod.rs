//! Serial transport
//!
//! The session engine talks to the router through the `Transport` trait:
//! open, close, write, and a non-blocking single-byte read. The real
//! implementation sits on the `serialport` crate; `MockTransport`
//! provides a scripted stand-in for tests and dry runs.

pub mod serial;

pub use serial::{list_ports, SerialPortInfo, SerialTransport};

use parking_lot::Mutex;
use routerhost_core::{Result, TransportError};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

/// Parameters for opening the serial link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Serial device path (e.g., "/dev/ttyUSB0", "COM3").
    pub port: String,
    /// Baud rate; must match the firmware setting.
    pub baud_rate: u32,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
        }
    }
}

/// Byte-level transport to the router.
///
/// All calls happen on the session's background loop; implementations do
/// not need internal locking beyond what their underlying handle requires,
/// but must be `Send` so the loop can own them.
pub trait Transport: Send {
    /// Open the transport. Opening an already-open transport is an error.
    fn open(&mut self, params: &ConnectionParams) -> Result<()>;

    /// Close the transport. Closing a closed transport is a no-op.
    fn close(&mut self);

    /// True while the transport is open.
    fn is_open(&self) -> bool;

    /// Write raw bytes, returning how many were written.
    fn write(&mut self, bytes: &[u8]) -> Result<usize>;

    /// Non-blocking read of a single byte. `Ok(None)` means no data is
    /// currently available.
    fn read_byte(&mut self) -> Result<Option<u8>>;
}

#[derive(Debug, Default)]
struct MockState {
    open: bool,
    fail_open: bool,
    fail_io: bool,
    incoming: VecDeque<u8>,
    written: Vec<u8>,
    open_count: u32,
}

/// Scripted in-memory transport for tests.
///
/// Clones share state, so a test can hold one handle while the session
/// loop owns another: push inbound bytes with [`push_incoming`] and
/// observe outbound traffic with [`written`].
///
/// [`push_incoming`]: MockTransport::push_incoming
/// [`written`]: MockTransport::written
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// New closed mock with empty buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `open` calls fail.
    pub fn fail_open(&self, fail: bool) {
        self.state.lock().fail_open = fail;
    }

    /// Make subsequent reads and writes fail, as if the cable were
    /// pulled.
    pub fn fail_io(&self, fail: bool) {
        self.state.lock().fail_io = fail;
    }

    /// Queue bytes for the session to read.
    pub fn push_incoming(&self, bytes: &[u8]) {
        self.state.lock().incoming.extend(bytes);
    }

    /// Everything written so far.
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    /// Drain and return everything written so far.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.state.lock().written)
    }

    /// How many times `open` has succeeded.
    pub fn open_count(&self) -> u32 {
        self.state.lock().open_count
    }

    /// Whether the mock is currently open.
    pub fn currently_open(&self) -> bool {
        self.state.lock().open
    }
}

impl Transport for MockTransport {
    fn open(&mut self, params: &ConnectionParams) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_open {
            return Err(TransportError::FailedToOpen {
                port: params.port.clone(),
                reason: "scripted open failure".to_string(),
            }
            .into());
        }
        state.open = true;
        state.open_count += 1;
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().open = false;
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(TransportError::NotOpen.into());
        }
        if state.fail_io {
            return Err(TransportError::IoError {
                reason: "scripted write failure".to_string(),
            }
            .into());
        }
        state.written.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(TransportError::NotOpen.into());
        }
        if state.fail_io {
            return Err(TransportError::IoError {
                reason: "scripted read failure".to_string(),
            }
            .into());
        }
        Ok(state.incoming.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_round_trip() {
        let mock = MockTransport::new();
        let mut session_side = mock.clone();

        assert!(session_side.read_byte().is_err());
        session_side.open(&ConnectionParams::default()).unwrap();

        mock.push_incoming(b"ar");
        assert_eq!(session_side.read_byte().unwrap(), Some(b'a'));
        assert_eq!(session_side.read_byte().unwrap(), Some(b'r'));
        assert_eq!(session_side.read_byte().unwrap(), None);

        session_side.write(&[1, 2, 3]).unwrap();
        assert_eq!(mock.written(), vec![1, 2, 3]);
        assert_eq!(mock.open_count(), 1);
    }

    #[test]
    fn test_mock_scripted_failures() {
        let mock = MockTransport::new();
        let mut session_side = mock.clone();

        mock.fail_open(true);
        assert!(session_side.open(&ConnectionParams::default()).is_err());
        assert!(!mock.currently_open());

        mock.fail_open(false);
        session_side.open(&ConnectionParams::default()).unwrap();
        mock.fail_io(true);
        assert!(session_side.write(&[0]).is_err());
        assert!(session_side.read_byte().is_err());
    }
}
