//! Network collaborator error types.

use thiserror::Error;

use crate::core::NetAddr;

/// Errors from link framing, packet encapsulation and address resolution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// Buffer shorter than the fixed header of `layer`.
    #[error("{layer} too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Which header was being parsed.
        layer: &'static str,
        /// Minimum size.
        expected: usize,
        /// Received size.
        actual: usize,
    },

    /// Link frame carries an EtherType nobody handles.
    #[error("unknown EtherType: {0:#06x}")]
    UnknownEtherType(u16),

    /// Packet header length field is not the fixed header size.
    #[error("invalid header length: {0}")]
    InvalidHeaderLength(u8),

    /// Declared total length disagrees with the received buffer.
    #[error("total length mismatch: declared {declared}, available {available}")]
    TotalLengthMismatch {
        /// Value of the total length field.
        declared: usize,
        /// Bytes actually received.
        available: usize,
    },

    /// Packet addressed to another node.
    #[error("packet addressed to {0}")]
    Misaddressed(NetAddr),

    /// ARP packet for a hardware/protocol pair other than Ethernet/IPv4.
    #[error("unsupported ARP format: htype {htype}, ptype {ptype:#06x}")]
    UnsupportedArp {
        /// Hardware type.
        htype: u16,
        /// Protocol type.
        ptype: u16,
    },

    /// ARP opcode other than request or reply.
    #[error("invalid ARP opcode: {0}")]
    InvalidArpOpcode(u16),

    /// Payload does not fit the packet's length field.
    #[error("packet too large: {len} bytes (max {max})")]
    PacketTooLarge {
        /// Attempted size.
        len: usize,
        /// Maximum allowed.
        max: usize,
    },
}

impl NetworkError {
    /// Check if the packet should be dropped without further action.
    ///
    /// Everything received off the segment that fails to parse is dropped.
    /// Only errors raised on the send path are reported to the caller.
    pub fn is_silent_drop(&self) -> bool {
        !matches!(self, NetworkError::PacketTooLarge { .. })
    }
}

/// Result type for network operations.
pub type NetworkResult<T> = Result<T, NetworkError>;
