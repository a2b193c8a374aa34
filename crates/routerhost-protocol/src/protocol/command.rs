//! Command frame construction
//!
//! A command is a fixed-size byte record. The first byte is the opcode,
//! then the command id (one byte in the compact layout, two big-endian
//! bytes in the extended layout), then the payload region, and finally a
//! checksum byte equal to the XOR of every preceding byte.
//!
//! Constructors never fail: out-of-range numeric inputs are silently
//! saturated or truncated. That is the legacy wire contract, and callers
//! that need validation (the translator) perform it before building the
//! frame. The checksum is stamped as the final step of every constructor,
//! so a `Command` is never observed half-built.

use super::Opcode;
use routerhost_core::ProtocolVersion;

/// Size of the largest frame layout (extended: opcode + 2-byte id +
/// four floats + checksum).
pub const MAX_FRAME_SIZE: usize = 20;

/// Per-version frame geometry.
#[derive(Debug, Clone, Copy)]
struct Layout {
    frame_size: usize,
    id_width: usize,
}

impl Layout {
    fn of(version: ProtocolVersion) -> Self {
        match version {
            ProtocolVersion::Compact => Layout {
                frame_size: 11,
                id_width: 1,
            },
            ProtocolVersion::Extended => Layout {
                frame_size: 20,
                id_width: 2,
            },
        }
    }

    /// First payload byte: right after opcode and id.
    fn payload_offset(&self) -> usize {
        1 + self.id_width
    }

    /// Payload bytes available before the trailing checksum.
    fn payload_capacity(&self) -> usize {
        self.frame_size - self.payload_offset() - 1
    }
}

/// One fixed-size binary command frame.
///
/// Immutable once built; obtain instances through [`Codec`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Command {
    bytes: [u8; MAX_FRAME_SIZE],
    len: usize,
    version: ProtocolVersion,
}

impl Command {
    /// The raw frame bytes, exactly as written to the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Frame length in bytes; constant for a given protocol version.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Frames are never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Protocol version this frame was built for.
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// The raw opcode byte.
    pub fn opcode_byte(&self) -> u8 {
        self.bytes[0]
    }

    /// The opcode, if it is a known operation.
    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::from_u8(self.bytes[0])
    }

    /// The command id. One byte wide in the compact layout, two in the
    /// extended layout.
    pub fn id(&self) -> u16 {
        match Layout::of(self.version).id_width {
            1 => self.bytes[1] as u16,
            _ => u16::from_be_bytes([self.bytes[1], self.bytes[2]]),
        }
    }

    /// Low byte of the command id, which is what the device echoes back
    /// in acks and response headers.
    pub fn id_low(&self) -> u8 {
        self.bytes[Layout::of(self.version).payload_offset() - 1]
    }

    /// Decimal dump of the frame bytes, for console display.
    pub fn dump(&self) -> String {
        self.as_bytes()
            .iter()
            .map(|b| b.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Command[{}]", self.dump())
    }
}

/// Builds command frames for one protocol version.
///
/// One constructor exists per payload shape the protocol actually uses.
/// Each constructor writes its fields big-endian and recomputes the
/// checksum as its final step.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    version: ProtocolVersion,
    layout: Layout,
}

impl Codec {
    /// Create a codec for the given protocol version.
    pub fn new(version: ProtocolVersion) -> Self {
        Self {
            version,
            layout: Layout::of(version),
        }
    }

    /// The protocol version this codec builds frames for.
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Frame size in bytes; every frame this codec builds has this size.
    pub fn frame_size(&self) -> usize {
        self.layout.frame_size
    }

    /// Payload bytes available in one frame.
    pub fn payload_capacity(&self) -> usize {
        self.layout.payload_capacity()
    }

    /// Zeroed frame with opcode and id set. Ids wider than the id field
    /// wrap to the field width (the low byte, for the compact layout).
    fn blank(&self, op: Opcode, id: u16) -> Command {
        let mut c = Command {
            bytes: [0u8; MAX_FRAME_SIZE],
            len: self.layout.frame_size,
            version: self.version,
        };
        c.bytes[0] = op as u8;
        match self.layout.id_width {
            1 => c.bytes[1] = id as u8,
            _ => {
                let id = id.to_be_bytes();
                c.bytes[1] = id[0];
                c.bytes[2] = id[1];
            }
        }
        c
    }

    /// Stamp the checksum over bytes `[0, size-2]` into the last byte.
    /// Must be the final step of every constructor.
    fn seal(&self, mut c: Command) -> Command {
        let mut cs = 0u8;
        for b in &c.bytes[..c.len - 1] {
            cs ^= b;
        }
        c.bytes[c.len - 1] = cs;
        c
    }

    fn put_u16(&self, c: &mut Command, field: usize, value: u16) {
        let off = self.layout.payload_offset() + field * 2;
        let be = value.to_be_bytes();
        c.bytes[off] = be[0];
        c.bytes[off + 1] = be[1];
    }

    fn put_f32(&self, c: &mut Command, field: usize, value: f32) {
        let off = self.layout.payload_offset() + field * 4;
        c.bytes[off..off + 4].copy_from_slice(&value.to_be_bytes());
    }

    /// Fixed-point encoding used by the compact layout: 0.01 mm units,
    /// saturating at the u16 range.
    fn fixed(value: f32) -> u16 {
        (value * 100.0).round() as u16
    }

    /// Command with no payload: opcode, id, and checksum only.
    pub fn empty(&self, op: Opcode, id: u16) -> Command {
        self.seal(self.blank(op, id))
    }

    /// Command with one byte of payload.
    pub fn with_byte(&self, op: Opcode, id: u16, b: u8) -> Command {
        let mut c = self.blank(op, id);
        c.bytes[self.layout.payload_offset()] = b;
        self.seal(c)
    }

    /// Command with one 16-bit field.
    pub fn with_u16(&self, op: Opcode, id: u16, x: u16) -> Command {
        let mut c = self.blank(op, id);
        self.put_u16(&mut c, 0, x);
        self.seal(c)
    }

    /// Command with two 16-bit fields.
    pub fn with_u16_pair(&self, op: Opcode, id: u16, x: u16, y: u16) -> Command {
        let mut c = self.blank(op, id);
        self.put_u16(&mut c, 0, x);
        self.put_u16(&mut c, 1, y);
        self.seal(c)
    }

    /// Command with one fixed-point 16-bit field computed from a
    /// floating-point value (0.01 mm resolution).
    pub fn with_fixed_u16(&self, op: Opcode, id: u16, v: f32) -> Command {
        self.with_u16(op, id, Self::fixed(v))
    }

    /// Command with one 32-bit float field (extended layout).
    pub fn with_f32(&self, op: Opcode, id: u16, x: f32) -> Command {
        let mut c = self.blank(op, id);
        self.put_f32(&mut c, 0, x);
        self.seal(c)
    }

    /// Command with three 32-bit float fields followed by one byte
    /// (extended layout).
    pub fn with_f32x3_byte(&self, op: Opcode, id: u16, x: f32, y: f32, z: f32, b: u8) -> Command {
        let mut c = self.blank(op, id);
        self.put_f32(&mut c, 0, x);
        self.put_f32(&mut c, 1, y);
        self.put_f32(&mut c, 2, z);
        c.bytes[self.layout.payload_offset() + 12] = b;
        self.seal(c)
    }

    /// Command with four 32-bit float fields (extended layout).
    pub fn with_f32x4(&self, op: Opcode, id: u16, x: f32, y: f32, z: f32, f: f32) -> Command {
        let mut c = self.blank(op, id);
        self.put_f32(&mut c, 0, x);
        self.put_f32(&mut c, 1, y);
        self.put_f32(&mut c, 2, z);
        self.put_f32(&mut c, 3, f);
        self.seal(c)
    }

    /// Motion command carrying a coordinate triple and a feed rate.
    ///
    /// The compact layout packs four fixed-point 16-bit fields, which
    /// nearly halves the bytes on the wire at 0.01 mm resolution; the
    /// extended layout sends the floats raw.
    pub fn motion(&self, op: Opcode, id: u16, x: f32, y: f32, z: f32, feed: f32) -> Command {
        match self.version {
            ProtocolVersion::Compact => {
                let mut c = self.blank(op, id);
                self.put_u16(&mut c, 0, Self::fixed(x));
                self.put_u16(&mut c, 1, Self::fixed(y));
                self.put_u16(&mut c, 2, Self::fixed(z));
                self.put_u16(&mut c, 3, Self::fixed(feed));
                self.seal(c)
            }
            ProtocolVersion::Extended => self.with_f32x4(op, id, x, y, z, feed),
        }
    }

    /// Redefine the current position without motion.
    pub fn set_position(&self, id: u16, x: f32, y: f32, z: f32) -> Command {
        match self.version {
            ProtocolVersion::Compact => self.motion(Opcode::SetPosition, id, x, y, z, 0.0),
            // Axis mask 7: all three coordinates are being set.
            ProtocolVersion::Extended => {
                self.with_f32x3_byte(Opcode::SetPosition, id, x, y, z, 0x07)
            }
        }
    }

    /// Echo command: copies raw text bytes into the payload, truncated to
    /// the frame's payload capacity.
    pub fn echo(&self, id: u16, text: &[u8]) -> Command {
        let mut c = self.blank(Opcode::Echo, id);
        let off = self.layout.payload_offset();
        let n = text.len().min(self.layout.payload_capacity());
        c.bytes[off..off + n].copy_from_slice(&text[..n]);
        self.seal(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xor_all(c: &Command) -> u8 {
        c.as_bytes().iter().fold(0u8, |acc, b| acc ^ b)
    }

    #[test]
    fn test_checksum_invariant() {
        let codec = Codec::new(ProtocolVersion::Compact);
        let frames = [
            codec.empty(Opcode::Estop, 3),
            codec.with_byte(Opcode::Home, 4, 7),
            codec.with_u16(Opcode::Wait, 5, 5000),
            codec.with_u16_pair(Opcode::Beep, 6, 800, 400),
            codec.motion(Opcode::Move, 7, 10.0, 5.5, 0.25, 4.0),
            codec.echo(8, b"hello"),
        ];
        for frame in frames {
            assert_eq!(xor_all(&frame), 0, "frame {:?}", frame);
        }
    }

    #[test]
    fn test_checksum_invariant_extended() {
        let codec = Codec::new(ProtocolVersion::Extended);
        let frames = [
            codec.with_f32(Opcode::Wait, 300, 1.5),
            codec.with_f32x4(Opcode::Move, 301, 1.0, 2.0, 3.0, 4.0),
            codec.set_position(302, 0.0, 0.0, 12.5),
        ];
        for frame in frames {
            assert_eq!(xor_all(&frame), 0, "frame {:?}", frame);
        }
    }

    #[test]
    fn test_frame_size_is_constant_per_version() {
        let compact = Codec::new(ProtocolVersion::Compact);
        assert_eq!(compact.frame_size(), 11);
        assert_eq!(compact.empty(Opcode::Nop, 0).len(), 11);
        assert_eq!(compact.echo(1, b"abcdefghijkl").len(), 11);
        assert_eq!(compact.motion(Opcode::Move, 2, 1.0, 2.0, 3.0, 4.0).len(), 11);

        let extended = Codec::new(ProtocolVersion::Extended);
        assert_eq!(extended.frame_size(), 20);
        assert_eq!(extended.empty(Opcode::Nop, 0).len(), 20);
        assert_eq!(extended.with_byte(Opcode::Home, 1, 7).len(), 20);
    }

    #[test]
    fn test_big_endian_packing() {
        let codec = Codec::new(ProtocolVersion::Compact);
        let c = codec.with_u16(Opcode::Wait, 9, 0x1234);
        assert_eq!(c.as_bytes()[2], 0x12);
        assert_eq!(c.as_bytes()[3], 0x34);

        let codec = Codec::new(ProtocolVersion::Extended);
        let c = codec.with_f32(Opcode::Wait, 0x0102, 1.0);
        assert_eq!(c.as_bytes()[1], 0x01);
        assert_eq!(c.as_bytes()[2], 0x02);
        // 1.0f32 == 0x3F800000 big-endian.
        assert_eq!(&c.as_bytes()[3..7], &[0x3F, 0x80, 0x00, 0x00]);
    }

    #[test]
    fn test_fixed_point_encoding() {
        let codec = Codec::new(ProtocolVersion::Compact);
        let c = codec.motion(Opcode::Move, 0, 10.0, 0.015, 655.36, 4.0);
        let field = |i: usize| u16::from_be_bytes([c.as_bytes()[2 + i * 2], c.as_bytes()[3 + i * 2]]);
        assert_eq!(field(0), 1000);
        // round() rather than truncation: 0.015 mm -> 2 counts.
        assert_eq!(field(1), 2);
        // Saturates at the top of the representable range.
        assert_eq!(field(2), u16::MAX);
        assert_eq!(field(3), 400);
    }

    #[test]
    fn test_compact_id_wraps_to_low_byte() {
        let codec = Codec::new(ProtocolVersion::Compact);
        let c = codec.empty(Opcode::Nop, 0x1FE);
        assert_eq!(c.as_bytes()[1], 0xFE);
        assert_eq!(c.id(), 0xFE);
        assert_eq!(c.id_low(), 0xFE);

        let codec = Codec::new(ProtocolVersion::Extended);
        let c = codec.empty(Opcode::Nop, 0x1FE);
        assert_eq!(c.id(), 0x1FE);
        assert_eq!(c.id_low(), 0xFE);
    }

    #[test]
    fn test_echo_truncates_to_capacity() {
        let codec = Codec::new(ProtocolVersion::Compact);
        let c = codec.echo(0, b"this line is much longer than eight bytes");
        assert_eq!(c.len(), 11);
        assert_eq!(&c.as_bytes()[2..10], b"this lin");
    }

    #[test]
    fn test_known_frame_bytes() {
        // HOME id=2 mask=4 in the compact layout, byte for byte.
        let codec = Codec::new(ProtocolVersion::Compact);
        let c = codec.with_byte(Opcode::Home, 2, 4);
        let cs = 2u8 ^ 2 ^ 4;
        assert_eq!(
            c.as_bytes(),
            &[2, 2, 4, 0, 0, 0, 0, 0, 0, 0, cs]
        );
    }
}
