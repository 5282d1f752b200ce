//! Address resolution: network address to delivery address.
//!
//! Packets follow the familiar Ethernet/IPv4 ARP layout (28 bytes,
//! big-endian). Every request and reply teaches the receiver the sender's
//! mapping; a request for the local address is answered with a reply sent
//! straight back to the requester.

use std::collections::HashMap;

use tracing::{debug, trace};

use super::error::{NetworkError, NetworkResult};
use crate::core::{ETHERTYPE_IP, MacAddr, NetAddr};

/// Encoded packet size.
pub const PACKET_LEN: usize = 28;

const HTYPE_ETHERNET: u16 = 1;
const HLEN: u8 = 6;
const PLEN: u8 = 4;

/// ARP operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArpOp {
    /// Who has `target_ip`?
    Request,
    /// `sender_ip` is at `sender_mac`.
    Reply,
}

impl ArpOp {
    fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::Request),
            2 => Some(Self::Reply),
            _ => None,
        }
    }

    fn as_u16(self) -> u16 {
        match self {
            Self::Request => 1,
            Self::Reply => 2,
        }
    }
}

/// An address resolution packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpPacket {
    /// Operation.
    pub op: ArpOp,
    /// Sender delivery address.
    pub sender_mac: MacAddr,
    /// Sender network address.
    pub sender_ip: NetAddr,
    /// Target delivery address (broadcast in requests).
    pub target_mac: MacAddr,
    /// Target network address.
    pub target_ip: NetAddr,
}

impl ArpPacket {
    /// Encode to wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(PACKET_LEN);
        buf.extend_from_slice(&HTYPE_ETHERNET.to_be_bytes());
        buf.extend_from_slice(&ETHERTYPE_IP.to_be_bytes());
        buf.push(HLEN);
        buf.push(PLEN);
        buf.extend_from_slice(&self.op.as_u16().to_be_bytes());
        buf.extend_from_slice(self.sender_mac.as_bytes());
        buf.extend_from_slice(&self.sender_ip.0.to_be_bytes());
        buf.extend_from_slice(self.target_mac.as_bytes());
        buf.extend_from_slice(&self.target_ip.0.to_be_bytes());
        buf
    }

    /// Decode from wire format. Trailing link padding is ignored.
    pub fn decode(buf: &[u8]) -> NetworkResult<Self> {
        if buf.len() < PACKET_LEN {
            return Err(NetworkError::TooShort {
                layer: "ARP packet",
                expected: PACKET_LEN,
                actual: buf.len(),
            });
        }

        let htype = u16::from_be_bytes([buf[0], buf[1]]);
        let ptype = u16::from_be_bytes([buf[2], buf[3]]);
        if htype != HTYPE_ETHERNET || ptype != ETHERTYPE_IP || buf[4] != HLEN || buf[5] != PLEN {
            return Err(NetworkError::UnsupportedArp { htype, ptype });
        }

        let raw_op = u16::from_be_bytes([buf[6], buf[7]]);
        let op = ArpOp::from_u16(raw_op).ok_or(NetworkError::InvalidArpOpcode(raw_op))?;

        Ok(Self {
            op,
            sender_mac: read_mac(&buf[8..14]),
            sender_ip: read_ip(&buf[14..18]),
            target_mac: read_mac(&buf[18..24]),
            target_ip: read_ip(&buf[24..28]),
        })
    }
}

fn read_mac(bytes: &[u8]) -> MacAddr {
    let mut mac = [0u8; 6];
    mac.copy_from_slice(bytes);
    MacAddr::new(mac)
}

fn read_ip(bytes: &[u8]) -> NetAddr {
    NetAddr(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Learned network-to-delivery address mappings.
#[derive(Debug, Default)]
pub struct ArpCache {
    entries: HashMap<NetAddr, MacAddr>,
}

impl ArpCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `ip`, if known.
    pub fn lookup(&self, ip: NetAddr) -> Option<MacAddr> {
        self.entries.get(&ip).copied()
    }

    /// Insert or update a mapping.
    pub fn learn(&mut self, ip: NetAddr, mac: MacAddr) {
        if self.entries.insert(ip, mac) != Some(mac) {
            debug!(ip = %ip, mac = %mac, "ARP mapping learned");
        }
    }

    /// Build a broadcast request for `target`.
    pub fn request(target: NetAddr, local_ip: NetAddr, local_mac: MacAddr) -> ArpPacket {
        ArpPacket {
            op: ArpOp::Request,
            sender_mac: local_mac,
            sender_ip: local_ip,
            target_mac: MacAddr::BROADCAST,
            target_ip: target,
        }
    }

    /// Process a received packet.
    ///
    /// Learns the sender's mapping and returns the reply to send when the
    /// packet is a request for `local_ip`.
    pub fn handle(&mut self, packet: &ArpPacket, local_ip: NetAddr, local_mac: MacAddr) -> Option<ArpPacket> {
        if packet.sender_mac.is_broadcast() {
            trace!(ip = %packet.sender_ip, "ARP packet with broadcast sender ignored");
            return None;
        }
        self.learn(packet.sender_ip, packet.sender_mac);

        if packet.op != ArpOp::Request || packet.target_ip != local_ip {
            return None;
        }

        debug!(requester = %packet.sender_ip, "ARP request for us, replying");
        Some(ArpPacket {
            op: ArpOp::Reply,
            sender_mac: local_mac,
            sender_ip: local_ip,
            target_mac: packet.sender_mac,
            target_ip: packet.sender_ip,
        })
    }

    /// Number of known mappings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing has been learned.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every mapping.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
