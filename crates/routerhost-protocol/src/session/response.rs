//! Response decoding
//!
//! A response payload has no type information of its own; it is
//! interpreted according to the opcode of the command that provoked it,
//! looked up in the sent history by id. If the id is no longer in
//! history the payload is treated as echo text, which is always safe to
//! display.

use crate::protocol::Opcode;

/// A decoded device response.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceResponse {
    /// Current position in millimeters.
    Position {
        /// X coordinate in mm.
        x: f32,
        /// Y coordinate in mm.
        y: f32,
        /// Z coordinate in mm.
        z: f32,
    },
    /// Endstop switch states.
    Endstops {
        /// X endstop triggered.
        x: bool,
        /// Y endstop triggered.
        y: bool,
        /// Z endstop triggered.
        z: bool,
    },
    /// Measured spindle speed.
    SpindleSpeed {
        /// Speed in rpm, mapped onto the configured range.
        rpm: u32,
    },
    /// Raw text, either from an echo command or from a response whose id
    /// was not found in history.
    Echo {
        /// Payload interpreted as text.
        text: String,
    },
}

impl std::fmt::Display for DeviceResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Position { x, y, z } => write!(f, "X: {:.2}   Y: {:.2}   Z: {:.2}", x, y, z),
            Self::Endstops { x, y, z } => write!(
                f,
                "Endstops: X: {}  Y: {}  Z: {}",
                *x as u8, *y as u8, *z as u8
            ),
            Self::SpindleSpeed { rpm } => write!(f, "Spindle speed: {} rpm", rpm),
            Self::Echo { text } => write!(f, "ECHO: {}", text),
        }
    }
}

/// Big-endian 16-bit field at index `idx` of the payload. Missing bytes
/// read as zero, mirroring the zeroed receive buffer of the firmware's
/// original host.
fn get16(data: &[u8], idx: usize) -> u16 {
    let hi = data.get(idx * 2).copied().unwrap_or(0);
    let lo = data.get(idx * 2 + 1).copied().unwrap_or(0);
    u16::from_be_bytes([hi, lo])
}

/// Decode a response payload according to the opcode that provoked it.
///
/// `opcode` is `None` when the response id was not found in the sent
/// history; such payloads fall back to echo text rather than raising an
/// error.
pub fn decode(
    opcode: Option<Opcode>,
    data: &[u8],
    spindle_speed_min: u32,
    spindle_speed_max: u32,
) -> DeviceResponse {
    match opcode {
        Some(Opcode::GetPosition) => DeviceResponse::Position {
            x: get16(data, 0) as f32 * 0.01,
            y: get16(data, 1) as f32 * 0.01,
            z: get16(data, 2) as f32 * 0.01,
        },
        Some(Opcode::GetEndstops) => {
            let r0 = data.first().copied().unwrap_or(0);
            DeviceResponse::Endstops {
                x: r0 & 1 != 0,
                y: r0 & 2 != 0,
                z: r0 & 4 != 0,
            }
        }
        Some(Opcode::GetSpindleSpeed) => {
            // The device reports a raw 10-bit reading in the second
            // 16-bit field; map it linearly onto the configured range.
            let raw = get16(data, 1) as f32;
            let span = (spindle_speed_max - spindle_speed_min) as f32;
            DeviceResponse::SpindleSpeed {
                rpm: (spindle_speed_min as f32 + (raw / 1024.0) * span) as u32,
            }
        }
        _ => DeviceResponse::Echo {
            text: String::from_utf8_lossy(data).into_owned(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_decoding_scales_to_mm() {
        let data = [0x03, 0xE8, 0x00, 0x64, 0x00, 0x02]; // 1000, 100, 2
        let r = decode(Some(Opcode::GetPosition), &data, 0, 12000);
        assert_eq!(
            r,
            DeviceResponse::Position {
                x: 10.0,
                y: 1.0,
                z: 0.02,
            }
        );
        assert_eq!(r.to_string(), "X: 10.00   Y: 1.00   Z: 0.02");
    }

    #[test]
    fn test_endstop_decoding_uses_low_three_bits() {
        let r = decode(Some(Opcode::GetEndstops), &[0b0000_0101], 0, 12000);
        assert_eq!(
            r,
            DeviceResponse::Endstops {
                x: true,
                y: false,
                z: true,
            }
        );
    }

    #[test]
    fn test_spindle_speed_maps_onto_configured_range() {
        // Raw reading 512 of 1024 over [0, 12000] is 6000 rpm. The value
        // sits in the second field.
        let data = [0x00, 0x00, 0x02, 0x00];
        let r = decode(Some(Opcode::GetSpindleSpeed), &data, 0, 12000);
        assert_eq!(r, DeviceResponse::SpindleSpeed { rpm: 6000 });

        let r = decode(Some(Opcode::GetSpindleSpeed), &data, 3000, 5000);
        assert_eq!(r, DeviceResponse::SpindleSpeed { rpm: 4000 });
    }

    #[test]
    fn test_unknown_id_falls_back_to_echo() {
        let r = decode(None, b"hello", 0, 12000);
        assert_eq!(
            r,
            DeviceResponse::Echo {
                text: "hello".to_string(),
            }
        );
        assert_eq!(r.to_string(), "ECHO: hello");
    }

    #[test]
    fn test_echo_opcode_decodes_as_text() {
        let r = decode(Some(Opcode::Echo), b"hi", 0, 12000);
        assert_eq!(
            r,
            DeviceResponse::Echo {
                text: "hi".to_string(),
            }
        );
    }

    #[test]
    fn test_short_payload_reads_zero() {
        let r = decode(Some(Opcode::GetPosition), &[0x00, 0x64], 0, 12000);
        assert_eq!(
            r,
            DeviceResponse::Position {
                x: 1.0,
                y: 0.0,
                z: 0.0,
            }
        );
    }
}
