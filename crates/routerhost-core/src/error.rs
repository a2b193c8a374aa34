//! Error handling for RouterHost
//!
//! Provides error types for all layers of the application:
//! - Transport errors (serial port related)
//! - Session errors (connection lifecycle and dispatch)
//! - G-Code errors (program loading)
//!
//! All error types use `thiserror` for ergonomic error handling. Parse
//! diagnostics are deliberately *not* errors: the translator accumulates
//! them as values and the caller decides whether to transmit.

use thiserror::Error;

/// Transport error type
///
/// Represents failures of the serial link itself: opening the device,
/// reading, and writing. The session loop maps any of these to a
/// disconnect while preserving the loaded job.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Failed to open port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// The transport is not open
    #[error("Transport is not open")]
    NotOpen,

    /// Write failed partway through a frame
    #[error("Short write: wrote {written} of {expected} bytes")]
    ShortWrite {
        /// Bytes actually written.
        written: usize,
        /// Bytes that should have been written.
        expected: usize,
    },

    /// I/O error
    #[error("I/O error: {reason}")]
    IoError {
        /// The reason for the I/O error.
        reason: String,
    },

    /// Generic transport error
    #[error("Transport error: {message}")]
    Other {
        /// The error message.
        message: String,
    },
}

/// Session error type
///
/// Represents rejected requests against the session engine. These are
/// always surfaced synchronously to the foreground caller; the background
/// protocol loop never raises them.
#[derive(Error, Debug, Clone)]
pub enum SessionError {
    /// Session is not connected
    #[error("Not connected to the router")]
    NotConnected,

    /// Session is already connected (or a connect is pending)
    #[error("Already connected")]
    AlreadyConnected,

    /// Request refused because a job is running
    #[error("Refused while a job is running: {request}")]
    BusyRunning {
        /// The request that was refused.
        request: String,
    },

    /// Run requested with no job loaded
    #[error("No commands loaded")]
    NothingLoaded,

    /// The background loop was started twice
    #[error("Session loop already started")]
    AlreadyStarted,

    /// Generic session error
    #[error("Session error: {message}")]
    Other {
        /// The error message.
        message: String,
    },
}

/// G-Code error type
///
/// Represents hard failures around program handling. Line-scoped parse
/// problems are `Diagnostic` values in the translator, not errors; this
/// type covers the cases where a whole program must be rejected.
#[derive(Error, Debug, Clone)]
pub enum GcodeError {
    /// The translated program contained errors and must not be sent
    #[error("Program rejected: {error_count} error(s) during translation")]
    ProgramRejected {
        /// Number of error-severity diagnostics accumulated.
        error_count: usize,
    },

    /// Program file could not be read
    #[error("Failed to read program {path}: {reason}")]
    FileError {
        /// The path of the program file.
        path: String,
        /// The reason the file could not be read.
        reason: String,
    },

    /// Generic G-Code error
    #[error("G-Code error: {message}")]
    Other {
        /// The error message.
        message: String,
    },
}

/// Main error type for RouterHost
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Session error
    #[error(transparent)]
    Session(#[from] SessionError),

    /// G-Code error
    #[error(transparent)]
    Gcode(#[from] GcodeError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a transport error
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Check if this is a session error
    pub fn is_session_error(&self) -> bool {
        matches!(self, Error::Session(_))
    }

    /// Check if this request was refused because a job is running
    pub fn is_busy(&self) -> bool {
        matches!(self, Error::Session(SessionError::BusyRunning { .. }))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::from(SessionError::BusyRunning {
            request: "disconnect".to_string(),
        });
        assert_eq!(e.to_string(), "Refused while a job is running: disconnect");
        assert!(e.is_busy());
        assert!(e.is_session_error());
    }

    #[test]
    fn test_transport_error_conversion() {
        let e: Error = TransportError::NotOpen.into();
        assert!(e.is_transport_error());
        assert!(!e.is_busy());
    }
}
