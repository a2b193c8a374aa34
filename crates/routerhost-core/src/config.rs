//! Host configuration
//!
//! Runtime configuration for the serial link, the wire protocol version,
//! and the handful of machine constants (spindle speed range, beep
//! defaults, jog feed rates) the translator and session need. Loadable
//! from a JSON file; defaults match the firmware the host was built
//! against.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Wire protocol version.
///
/// Two historical frame layouts exist. They differ only in frame size,
/// id width, and numeric encoding; one codec is parameterized by this
/// value rather than duplicating logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    /// 11-byte frames, 1-byte command id, fixed-point 0.01 mm coordinates.
    #[default]
    Compact,
    /// 20-byte frames, 2-byte command id, raw IEEE-754 coordinates.
    Extended,
}

/// RouterHost configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Serial device path (e.g., "/dev/ttyUSB0", "COM3").
    pub port: String,

    /// Baud rate; must match the firmware setting.
    pub baud_rate: u32,

    /// Wire protocol version spoken by the firmware.
    pub protocol: ProtocolVersion,

    /// Lower end of the spindle speed range in rpm.
    pub spindle_speed_min: u32,

    /// Upper end of the spindle speed range in rpm.
    pub spindle_speed_max: u32,

    /// Default beep duration in milliseconds (M300 without P).
    pub default_beep_len_ms: u32,

    /// Default beep frequency in Hz (M300 without S).
    pub default_beep_freq_hz: u32,

    /// Highest beep frequency the firmware supports; higher requests are
    /// clamped with a warning.
    pub max_beep_freq_hz: u32,

    /// Jog feed rates in mm/sec (slow, medium, fast).
    pub feed_rates: [f32; 3],

    /// Sleep between transport checks while disconnected, in milliseconds.
    pub backoff_interval_ms: u64,

    /// Sleep between non-blocking read attempts while connected, in
    /// milliseconds.
    pub poll_interval_ms: u64,

    /// Cadence of the handshake byte while waiting for the firmware to
    /// answer, in milliseconds.
    pub handshake_interval_ms: u64,

    /// Whether to echo acknowledgments on the console.
    pub log_acks: bool,

    /// Whether to echo handshake pings on the console.
    pub log_pings: bool,

    /// Whether to echo every sent frame on the console.
    pub log_sends: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            protocol: ProtocolVersion::Compact,
            spindle_speed_min: 0,
            spindle_speed_max: 12000,
            default_beep_len_ms: 400,
            default_beep_freq_hz: 800,
            max_beep_freq_hz: 15000,
            feed_rates: [0.5, 4.0, 20.0],
            backoff_interval_ms: 250,
            poll_interval_ms: 1,
            handshake_interval_ms: 1000,
            log_acks: true,
            log_pings: true,
            log_sends: true,
        }
    }
}

impl HostConfig {
    /// Load configuration from a JSON file.
    ///
    /// Missing fields fall back to their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Save configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, text).map_err(|e| {
            Error::Config(format!("failed to write {}: {}", path.display(), e))
        })
    }
}
