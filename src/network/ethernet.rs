//! Ethernet-style link framing.
//!
//! ```text
//! +----------------+----------------+-----------+------------------+
//! | destination(6) | source(6)      | type(2)   | payload + pad    |
//! +----------------+----------------+-----------+------------------+
//! ```
//!
//! The type field is big-endian. Frames are zero-padded to
//! [`MIN_LINK_FRAME_SIZE`] bytes; upper layers strip the padding using their
//! own length fields.

use super::error::{NetworkError, NetworkResult};
use crate::core::{ETHERTYPE_ARP, ETHERTYPE_IP, MIN_LINK_FRAME_SIZE, MacAddr};

/// Link header size.
pub const HEADER_LEN: usize = 6 + 6 + 2;

/// Payload type carried by a link frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EtherType {
    /// IPv4-style packet.
    Ip,
    /// Address resolution.
    Arp,
}

impl EtherType {
    /// Parse from the wire value.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            ETHERTYPE_IP => Some(Self::Ip),
            ETHERTYPE_ARP => Some(Self::Arp),
            _ => None,
        }
    }

    /// Wire value.
    pub fn as_u16(self) -> u16 {
        match self {
            Self::Ip => ETHERTYPE_IP,
            Self::Arp => ETHERTYPE_ARP,
        }
    }
}

/// A link frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetFrame {
    /// Destination station.
    pub destination: MacAddr,
    /// Sending station.
    pub source: MacAddr,
    /// Payload type.
    pub ether_type: EtherType,
    /// Payload, including any padding when decoded.
    pub payload: Vec<u8>,
}

impl EthernetFrame {
    /// Create a new frame.
    pub fn new(destination: MacAddr, source: MacAddr, ether_type: EtherType, payload: Vec<u8>) -> Self {
        Self {
            destination,
            source,
            ether_type,
            payload,
        }
    }

    /// Encode, padding to the minimum frame size.
    pub fn encode(&self) -> Vec<u8> {
        let len = (HEADER_LEN + self.payload.len()).max(MIN_LINK_FRAME_SIZE);
        let mut buf = Vec::with_capacity(len);
        buf.extend_from_slice(self.destination.as_bytes());
        buf.extend_from_slice(self.source.as_bytes());
        buf.extend_from_slice(&self.ether_type.as_u16().to_be_bytes());
        buf.extend_from_slice(&self.payload);
        buf.resize(len, 0);
        buf
    }

    /// Decode a frame read from the segment.
    pub fn decode(buf: &[u8]) -> NetworkResult<Self> {
        if buf.len() < HEADER_LEN {
            return Err(NetworkError::TooShort {
                layer: "link frame",
                expected: HEADER_LEN,
                actual: buf.len(),
            });
        }

        let destination = MacAddr::new(read_mac(&buf[0..6]));
        let source = MacAddr::new(read_mac(&buf[6..12]));
        let raw_type = u16::from_be_bytes([buf[12], buf[13]]);
        let ether_type = EtherType::from_u16(raw_type).ok_or(NetworkError::UnknownEtherType(raw_type))?;

        Ok(Self {
            destination,
            source,
            ether_type,
            payload: buf[HEADER_LEN..].to_vec(),
        })
    }

    /// Whether a station with address `local` should accept this frame.
    pub fn accepts(&self, local: MacAddr) -> bool {
        self.destination == local || self.destination.is_broadcast()
    }
}

fn read_mac(bytes: &[u8]) -> [u8; 6] {
    let mut mac = [0u8; 6];
    mac.copy_from_slice(bytes);
    mac
}
