//! Per-peer sequencing state.
//!
//! One [`PeerRecord`] exists for every remote node this transport has sent
//! to or received from. Records are created lazily and live until the node
//! reboots.

use std::collections::HashMap;

use super::frame::Seq;
use crate::core::{NetAddr, TimerId};

/// The single unacknowledged frame to a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outstanding {
    /// Message body, kept for retransmission.
    pub payload: Vec<u8>,
    /// Retransmission timer currently armed for it.
    pub timer: TimerId,
    /// Number of transmissions so far (1 = first send).
    pub transmissions: u32,
}

/// Sequencing and retransmission bookkeeping for one remote peer.
///
/// The sender side (`ack_expected`, `next_frame_to_send`) and the receiver
/// side (`frame_expected`) are independent one-bit counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    /// Remote peer address.
    pub peer: NetAddr,
    /// Sequence number the peer must acknowledge next.
    pub ack_expected: Seq,
    /// Sequence number stamped on the next newly admitted message.
    pub next_frame_to_send: Seq,
    /// Sequence number expected next from the peer's sends.
    pub frame_expected: Seq,
    /// In-flight frame, if any. Set exactly while a timer is armed.
    pub outstanding: Option<Outstanding>,
}

impl PeerRecord {
    /// Fresh record: all counters at zero, nothing in flight.
    pub fn new(peer: NetAddr) -> Self {
        Self {
            peer,
            ack_expected: Seq::Zero,
            next_frame_to_send: Seq::Zero,
            frame_expected: Seq::Zero,
            outstanding: None,
        }
    }

    /// Check whether a frame to this peer awaits acknowledgment.
    pub fn has_outstanding(&self) -> bool {
        self.outstanding.is_some()
    }

    /// Timer armed for the outstanding frame.
    pub fn timer(&self) -> Option<TimerId> {
        self.outstanding.as_ref().map(|o| o.timer)
    }
}

/// Peer connection table keyed by network address.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: HashMap<NetAddr, PeerRecord>,
}

impl PeerTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the record for `peer`, creating a fresh one if none exists.
    pub fn lookup_or_create(&mut self, peer: NetAddr) -> &mut PeerRecord {
        self.peers
            .entry(peer)
            .or_insert_with(|| PeerRecord::new(peer))
    }

    /// Get the record for `peer` without creating it.
    pub fn get(&self, peer: NetAddr) -> Option<&PeerRecord> {
        self.peers.get(&peer)
    }

    /// Mutable access without creating.
    pub fn get_mut(&mut self, peer: NetAddr) -> Option<&mut PeerRecord> {
        self.peers.get_mut(&peer)
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Check if no peer has been seen.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Iterate over all records.
    pub fn iter(&self) -> impl Iterator<Item = &PeerRecord> {
        self.peers.values()
    }

    /// Forget every peer. Only used when the node reboots.
    pub fn clear(&mut self) {
        self.peers.clear();
    }
}
