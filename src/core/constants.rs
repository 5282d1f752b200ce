//! Protocol constants.
//!
//! Values shared by every node on a segment. Changing any of the wire
//! constants breaks interoperability with existing nodes.

use std::time::Duration;

// =============================================================================
// TRANSPORT
// =============================================================================

/// Fixed retransmission timeout (no backoff, no retry limit).
pub const DEFAULT_RETRANSMIT_TIMEOUT: Duration = Duration::from_secs(1);

/// Shortest retransmission timeout an engine will arm.
pub const MIN_RETRANSMIT_TIMEOUT: Duration = Duration::from_millis(1);

/// Largest application message accepted by the transport.
pub const MAX_MESSAGE_SIZE: usize = 8192;

/// Length of the filler payload carried by ACK frames.
pub const ACK_FILLER_LEN: usize = 32;

// =============================================================================
// NETWORK
// =============================================================================

/// Protocol tag reserved for the stop-and-wait transport.
pub const PROTO_STOP_AND_WAIT: u8 = 254;

/// EtherType for IPv4 payloads.
pub const ETHERTYPE_IP: u16 = 0x0800;

/// EtherType for ARP payloads.
pub const ETHERTYPE_ARP: u16 = 0x0806;

/// Link frames shorter than this are zero-padded before transmission.
pub const MIN_LINK_FRAME_SIZE: usize = 64;
