//! # RouterHost Core
//!
//! Core types, errors, and utilities for RouterHost.
//! Provides the error taxonomy shared by all layers, the host configuration
//! model, and the console sink used to surface human-readable notices from
//! the session loop.

pub mod config;
pub mod console;
pub mod error;

pub use config::{HostConfig, ProtocolVersion};
pub use console::{ConsoleSink, MemoryConsole, NullConsole, TracingConsole};
pub use error::{Error, GcodeError, Result, SessionError, TransportError};
