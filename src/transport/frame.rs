//! Frame encoding and decoding for the stop-and-wait transport.
//!
//! Every segment exchanged between transports is a [`Frame`]: a fixed
//! 16-byte header followed by the payload. The integrity code is a CRC-32
//! over the whole encoded frame with the checksum field zeroed.

use thiserror::Error;

use crate::core::{ACK_FILLER_LEN, MAX_MESSAGE_SIZE, NetAddr};

/// Size constants for the frame header.
pub mod sizes {
    /// Header size (kind + seq + length + checksum + source + destination).
    pub const HEADER_SIZE: usize = 1 + 1 + 2 + 4 + 4 + 4;

    pub(crate) const OFF_KIND: usize = 0;
    pub(crate) const OFF_SEQ: usize = 1;
    pub(crate) const OFF_LENGTH: usize = 2;
    pub(crate) const OFF_CHECKSUM: usize = 4;
    pub(crate) const OFF_SOURCE: usize = 8;
    pub(crate) const OFF_DESTINATION: usize = 12;
}

/// Largest payload a frame may carry.
pub const MAX_PAYLOAD: usize = MAX_MESSAGE_SIZE;

/// Frame kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    /// Application data.
    Data = 0,
    /// Acknowledgment.
    Ack = 1,
}

impl FrameKind {
    /// Parse frame kind from a byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Data),
            1 => Some(Self::Ack),
            _ => None,
        }
    }

    /// Convert to its byte representation.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// One-bit sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Seq {
    /// Sequence 0.
    #[default]
    Zero,
    /// Sequence 1.
    One,
}

impl Seq {
    /// The other sequence number.
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Zero => Self::One,
            Self::One => Self::Zero,
        }
    }

    /// Toggle in place.
    pub fn toggle(&mut self) {
        *self = self.toggled();
    }

    /// Parse from a byte (only 0 and 1 are valid).
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Zero),
            1 => Some(Self::One),
            _ => None,
        }
    }

    /// Convert to its byte representation.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Zero => 0,
            Self::One => 1,
        }
    }
}

/// Fixed-size frame header.
///
/// Wire format (16 bytes, little-endian):
/// ```text
/// +------+-----+-----------+-------------+-------------+-------------+
/// | Kind | Seq | Length    | Checksum    | Source      | Destination |
/// | 1 B  | 1 B | 2 B (LE)  | 4 B (LE)    | 4 B (LE)    | 4 B (LE)    |
/// +------+-----+-----------+-------------+-------------+-------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// DATA or ACK.
    pub kind: FrameKind,
    /// Alternating-bit sequence number.
    pub seq: Seq,
    /// Payload length in bytes.
    pub length: u16,
    /// CRC-32 of the frame with this field zeroed.
    pub checksum: u32,
    /// Sending node.
    pub source: NetAddr,
    /// Receiving node.
    pub destination: NetAddr,
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The header.
    pub header: FrameHeader,
    /// Payload bytes (filler for ACK frames).
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a DATA frame.
    pub fn data(seq: Seq, source: NetAddr, destination: NetAddr, payload: Vec<u8>) -> Self {
        Self::new(FrameKind::Data, seq, source, destination, payload)
    }

    /// Create an ACK frame carrying the fixed filler payload.
    pub fn ack(seq: Seq, source: NetAddr, destination: NetAddr) -> Self {
        Self::new(FrameKind::Ack, seq, source, destination, vec![0u8; ACK_FILLER_LEN])
    }

    fn new(
        kind: FrameKind,
        seq: Seq,
        source: NetAddr,
        destination: NetAddr,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            header: FrameHeader {
                kind,
                seq,
                length: payload.len().min(u16::MAX as usize) as u16,
                checksum: 0,
                source,
                destination,
            },
            payload,
        }
    }

    /// Serialize into a new buffer.
    ///
    /// `length` and `checksum` are computed from the payload; values already
    /// stored in the header are ignored.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        if self.payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                len: self.payload.len(),
                max: MAX_PAYLOAD,
            });
        }

        let mut buf = vec![0u8; sizes::HEADER_SIZE + self.payload.len()];
        buf[sizes::OFF_KIND] = self.header.kind.as_byte();
        buf[sizes::OFF_SEQ] = self.header.seq.as_byte();
        buf[sizes::OFF_LENGTH..sizes::OFF_LENGTH + 2]
            .copy_from_slice(&(self.payload.len() as u16).to_le_bytes());
        buf[sizes::OFF_SOURCE..sizes::OFF_SOURCE + 4]
            .copy_from_slice(&self.header.source.to_le_bytes());
        buf[sizes::OFF_DESTINATION..sizes::OFF_DESTINATION + 4]
            .copy_from_slice(&self.header.destination.to_le_bytes());
        buf[sizes::HEADER_SIZE..].copy_from_slice(&self.payload);

        // Checksum field is still zero here.
        let checksum = integrity_code(&buf);
        buf[sizes::OFF_CHECKSUM..sizes::OFF_CHECKSUM + 4].copy_from_slice(&checksum.to_le_bytes());

        Ok(buf)
    }

    /// Parse and verify a frame.
    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < sizes::HEADER_SIZE {
            return Err(FrameError::TooShort {
                expected: sizes::HEADER_SIZE,
                actual: buf.len(),
            });
        }

        let checksum = u32::from_le_bytes(read4(buf, sizes::OFF_CHECKSUM));
        let mut scratch = buf.to_vec();
        scratch[sizes::OFF_CHECKSUM..sizes::OFF_CHECKSUM + 4].fill(0);
        let computed = integrity_code(&scratch);
        if computed != checksum {
            return Err(FrameError::ChecksumMismatch {
                expected: checksum,
                actual: computed,
            });
        }

        let kind = FrameKind::from_byte(buf[sizes::OFF_KIND])
            .ok_or(FrameError::InvalidKind(buf[sizes::OFF_KIND]))?;
        let seq = Seq::from_byte(buf[sizes::OFF_SEQ])
            .ok_or(FrameError::InvalidSequence(buf[sizes::OFF_SEQ]))?;
        let length = u16::from_le_bytes([buf[sizes::OFF_LENGTH], buf[sizes::OFF_LENGTH + 1]]);
        let payload = &buf[sizes::HEADER_SIZE..];
        if payload.len() != length as usize {
            return Err(FrameError::LengthMismatch {
                expected: length as usize,
                actual: payload.len(),
            });
        }

        Ok(Self {
            header: FrameHeader {
                kind,
                seq,
                length,
                checksum,
                source: NetAddr::from_le_bytes(read4(buf, sizes::OFF_SOURCE)),
                destination: NetAddr::from_le_bytes(read4(buf, sizes::OFF_DESTINATION)),
            },
            payload: payload.to_vec(),
        })
    }

    /// Frame kind.
    pub fn kind(&self) -> FrameKind {
        self.header.kind
    }

    /// Sequence number.
    pub fn seq(&self) -> Seq {
        self.header.seq
    }
}

fn read4(buf: &[u8], offset: usize) -> [u8; 4] {
    [buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]]
}

/// CRC-32 over `data`. The caller zeroes the checksum field first.
fn integrity_code(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Errors that can occur during frame parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Frame is shorter than the header.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum expected size.
        expected: usize,
        /// Actual size received.
        actual: usize,
    },

    /// Integrity code does not match.
    #[error("bad checksum: frame carries 0x{expected:08x}, computed 0x{actual:08x}")]
    ChecksumMismatch {
        /// Code carried by the frame.
        expected: u32,
        /// Code recomputed by the receiver.
        actual: u32,
    },

    /// Unknown frame kind.
    #[error("invalid frame kind: 0x{0:02x}")]
    InvalidKind(u8),

    /// Sequence number outside {0, 1}.
    #[error("invalid sequence number: {0}")]
    InvalidSequence(u8),

    /// Length field disagrees with the buffer.
    #[error("payload length mismatch: header says {expected}, but {actual} bytes available")]
    LengthMismatch {
        /// Length from the header.
        expected: usize,
        /// Bytes actually present.
        actual: usize,
    },

    /// Payload exceeds [`MAX_PAYLOAD`].
    #[error("payload too large: {len} bytes (max {max})")]
    PayloadTooLarge {
        /// Offending length.
        len: usize,
        /// Upper bound.
        max: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: NetAddr = NetAddr(10);
    const B: NetAddr = NetAddr(20);

    #[test]
    fn test_seq_toggle() {
        assert_eq!(Seq::Zero.toggled(), Seq::One);
        assert_eq!(Seq::One.toggled(), Seq::Zero);

        let mut seq = Seq::default();
        seq.toggle();
        seq.toggle();
        assert_eq!(seq, Seq::Zero);

        assert_eq!(Seq::from_byte(2), None);
    }

    #[test]
    fn test_frame_kind_bytes() {
        assert_eq!(FrameKind::from_byte(FrameKind::Data.as_byte()), Some(FrameKind::Data));
        assert_eq!(FrameKind::from_byte(FrameKind::Ack.as_byte()), Some(FrameKind::Ack));
        assert_eq!(FrameKind::from_byte(7), None);
    }

    #[test]
    fn test_data_frame_decodes() {
        let bytes = Frame::data(Seq::One, A, B, b"hello".to_vec()).encode().unwrap();
        assert_eq!(bytes.len(), sizes::HEADER_SIZE + 5);

        let frame = Frame::decode(&bytes).unwrap();
        assert_eq!(frame.kind(), FrameKind::Data);
        assert_eq!(frame.seq(), Seq::One);
        assert_eq!(frame.header.source, A);
        assert_eq!(frame.header.destination, B);
        assert_eq!(frame.header.length, 5);
        assert_eq!(frame.payload, b"hello");
    }

    #[test]
    fn test_ack_frame_carries_filler() {
        let frame = Frame::ack(Seq::Zero, B, A);
        assert_eq!(frame.payload.len(), ACK_FILLER_LEN);

        let decoded = Frame::decode(&frame.encode().unwrap()).unwrap();
        assert_eq!(decoded.kind(), FrameKind::Ack);
        assert_eq!(decoded.seq(), Seq::Zero);
    }

    #[test]
    fn test_wire_layout() {
        let bytes = Frame::data(Seq::One, NetAddr(0x0403_0201), NetAddr(0x0807_0605), vec![0xaa])
            .encode()
            .unwrap();
        assert_eq!(hex::encode(&bytes[..4]), "00010100");
        assert_eq!(hex::encode(&bytes[8..16]), "0102030405060708");
        assert_eq!(bytes[16], 0xaa);
    }

    #[test]
    fn test_checksum_covers_zeroed_field() {
        let bytes = Frame::data(Seq::Zero, A, B, b"abc".to_vec()).encode().unwrap();
        let mut zeroed = bytes.clone();
        zeroed[sizes::OFF_CHECKSUM..sizes::OFF_CHECKSUM + 4].fill(0);
        let stored = u32::from_le_bytes(read4(&bytes, sizes::OFF_CHECKSUM));
        assert_eq!(crc32fast::hash(&zeroed), stored);
    }

    #[test]
    fn test_every_single_bit_flip_is_rejected() {
        let bytes = Frame::data(Seq::Zero, A, B, b"integrity".to_vec()).encode().unwrap();
        for byte in 0..bytes.len() {
            if (sizes::OFF_CHECKSUM..sizes::OFF_CHECKSUM + 4).contains(&byte) {
                continue;
            }
            for bit in 0..8 {
                let mut corrupted = bytes.clone();
                corrupted[byte] ^= 1 << bit;
                assert!(
                    Frame::decode(&corrupted).is_err(),
                    "flip of byte {byte} bit {bit} went undetected"
                );
            }
        }
    }

    #[test]
    fn test_decode_too_short() {
        assert!(matches!(
            Frame::decode(&[0u8; 4]),
            Err(FrameError::TooShort { expected: 16, actual: 4 })
        ));
    }

    #[test]
    fn test_decode_truncated_payload() {
        let mut bytes = Frame::data(Seq::Zero, A, B, b"data".to_vec()).encode().unwrap();
        bytes.pop();
        assert!(Frame::decode(&bytes).is_err());
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let frame = Frame::data(Seq::Zero, A, B, vec![0u8; MAX_PAYLOAD + 1]);
        assert!(matches!(
            frame.encode(),
            Err(FrameError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_empty_payload() {
        let bytes = Frame::data(Seq::Zero, A, B, Vec::new()).encode().unwrap();
        let frame = Frame::decode(&bytes).unwrap();
        assert!(frame.payload.is_empty());
        assert_eq!(frame.header.length, 0);
    }
}
