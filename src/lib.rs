//! # RouterHost
//!
//! A serial host for small CNC routers. It translates a G-code program
//! into a sequence of fixed-size binary command frames and streams them
//! to the router firmware over a serial link with stop-and-wait flow
//! control.
//!
//! ## Architecture
//!
//! RouterHost is organized as a workspace:
//!
//! 1. **routerhost-core** - Configuration, error taxonomy, console sink
//! 2. **routerhost-protocol** - Command codec, G-code translator,
//!    session engine, serial transport
//! 3. **routerhost** - Main binary: the interactive console
//!
//! ## Features
//!
//! - **Binary command protocol**: compact (11-byte) and extended
//!   (20-byte) frame layouts with XOR checksums
//! - **G-code translation**: line-oriented subset (G1/G2/G4/G28/G92,
//!   M0-M300) with per-line diagnostics and modal coordinate state
//! - **Reliable streaming**: one frame in flight, ack-driven dispatch,
//!   device-requested retransmission, motion-halt latching
//! - **Cross-Platform**: Linux, Windows, macOS support

pub use routerhost_core::{
    ConsoleSink, Error, GcodeError, HostConfig, MemoryConsole, NullConsole, ProtocolVersion,
    Result, SessionError, TracingConsole, TransportError,
};

pub use routerhost_protocol::{
    list_ports, Codec, Command, ConnectionParams, ConnectionState, DeviceResponse, Diagnostic,
    MockTransport, Opcode, Receiver, SentHistory, SerialTransport, Session, SessionConfig,
    Severity, TranslateOutput, Translator, Transport,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}
