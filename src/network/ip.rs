//! IPv4-style packet encapsulation.
//!
//! A deliberately small header (12 bytes, little-endian):
//!
//! ```text
//! +---------+----------+--------------+-----------+----------------+
//! | hlen(1) | proto(1) | total_len(2) | source(4) | destination(4) |
//! +---------+----------+--------------+-----------+----------------+
//! ```
//!
//! [`IpLayer`] is the packet delivery service the transport talks to: it
//! resolves the destination through the ARP cache and emits a link frame,
//! or broadcasts a resolution request and drops the packet.

use tracing::{debug, trace};

use super::arp::ArpCache;
use super::error::{NetworkError, NetworkResult};
use super::ethernet::{EtherType, EthernetFrame};
use crate::core::{Link, MacAddr, NetAddr, PROTO_STOP_AND_WAIT, SendStatus};

/// Packet header size.
pub const HEADER_LEN: usize = 1 + 1 + 2 + 4 + 4;

/// Largest payload a packet can carry.
pub const MAX_PACKET_PAYLOAD: usize = u16::MAX as usize - HEADER_LEN;

/// Upper-layer protocol tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// The stop-and-wait transport.
    StopAndWait,
    /// Anything else; dropped by the node.
    Other(u8),
}

impl Protocol {
    /// Parse from the wire value.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            PROTO_STOP_AND_WAIT => Self::StopAndWait,
            other => Self::Other(other),
        }
    }

    /// Wire value.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::StopAndWait => PROTO_STOP_AND_WAIT,
            Self::Other(byte) => byte,
        }
    }
}

/// A network packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpPacket {
    /// Upper-layer protocol.
    pub protocol: Protocol,
    /// Originating node.
    pub source: NetAddr,
    /// Destination node.
    pub destination: NetAddr,
    /// Upper-layer segment.
    pub payload: Vec<u8>,
}

impl IpPacket {
    /// Encode to wire format.
    pub fn encode(&self) -> NetworkResult<Vec<u8>> {
        if self.payload.len() > MAX_PACKET_PAYLOAD {
            return Err(NetworkError::PacketTooLarge {
                len: self.payload.len(),
                max: MAX_PACKET_PAYLOAD,
            });
        }
        let total = HEADER_LEN + self.payload.len();

        let mut buf = Vec::with_capacity(total);
        buf.push(HEADER_LEN as u8);
        buf.push(self.protocol.as_byte());
        buf.extend_from_slice(&(total as u16).to_le_bytes());
        buf.extend_from_slice(&self.source.to_le_bytes());
        buf.extend_from_slice(&self.destination.to_le_bytes());
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }

    /// Decode from wire format, trimming link padding past `total_len`.
    pub fn decode(buf: &[u8]) -> NetworkResult<Self> {
        if buf.len() < HEADER_LEN {
            return Err(NetworkError::TooShort {
                layer: "packet",
                expected: HEADER_LEN,
                actual: buf.len(),
            });
        }
        if buf[0] as usize != HEADER_LEN {
            return Err(NetworkError::InvalidHeaderLength(buf[0]));
        }

        let total = u16::from_le_bytes([buf[2], buf[3]]) as usize;
        if total < HEADER_LEN || total > buf.len() {
            return Err(NetworkError::TotalLengthMismatch {
                declared: total,
                available: buf.len(),
            });
        }

        Ok(Self {
            protocol: Protocol::from_byte(buf[1]),
            source: NetAddr::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            destination: NetAddr::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            payload: buf[HEADER_LEN..total].to_vec(),
        })
    }
}

/// Packet delivery service for one node.
#[derive(Debug, Clone, Copy)]
pub struct IpLayer {
    local_addr: NetAddr,
    local_mac: MacAddr,
}

impl IpLayer {
    /// Create the service for a node.
    pub fn new(local_addr: NetAddr, local_mac: MacAddr) -> Self {
        Self {
            local_addr,
            local_mac,
        }
    }

    /// This node's network address.
    pub fn local_addr(&self) -> NetAddr {
        self.local_addr
    }

    /// This node's delivery address.
    pub fn local_mac(&self) -> MacAddr {
        self.local_mac
    }

    /// Encapsulate `payload` and send it toward `destination`.
    ///
    /// If the destination's delivery address is unknown, a resolution
    /// request is broadcast instead and the packet is dropped.
    pub fn send<L>(
        &self,
        arp: &ArpCache,
        link: &mut L,
        destination: NetAddr,
        protocol: Protocol,
        payload: &[u8],
    ) -> NetworkResult<SendStatus>
    where
        L: Link + ?Sized,
    {
        let packet = IpPacket {
            protocol,
            source: self.local_addr,
            destination,
            payload: payload.to_vec(),
        }
        .encode()?;

        let Some(mac) = arp.lookup(destination) else {
            debug!(destination = %destination, "no ARP entry, broadcasting request");
            let request = ArpCache::request(destination, self.local_addr, self.local_mac);
            self.send_arp(link, MacAddr::BROADCAST, request.encode());
            return Ok(SendStatus::Unresolved);
        };

        trace!(destination = %destination, mac = %mac, len = packet.len(), "packet sent");
        let frame = EthernetFrame::new(mac, self.local_mac, EtherType::Ip, packet);
        link.transmit(frame.encode());
        Ok(SendStatus::Sent)
    }

    /// Write an ARP packet to `destination`.
    pub fn send_arp<L>(&self, link: &mut L, destination: MacAddr, packet: Vec<u8>)
    where
        L: Link + ?Sized,
    {
        let frame = EthernetFrame::new(destination, self.local_mac, EtherType::Arp, packet);
        link.transmit(frame.encode());
    }

    /// Parse a received packet, dropping it unless addressed to this node.
    pub fn accept(&self, buf: &[u8]) -> NetworkResult<IpPacket> {
        let packet = IpPacket::decode(buf)?;
        if packet.destination != self.local_addr {
            return Err(NetworkError::Misaddressed(packet.destination));
        }
        Ok(packet)
    }
}
